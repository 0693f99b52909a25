//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A codec turns message structs into the opaque byte frames handed to the
//! transport, and turns inbound bytes back into [`ClientMessage`]s. The
//! registries only ever talk to the [`Codec`] trait, so a compact binary
//! codec can replace [`JsonCodec`] without touching room or voice code.
//!
//! [`ClientMessage`]: crate::ClientMessage

use serde::{Serialize, de::DeserializeOwned};

use crate::{Envelope, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes `message` as an envelope payload and then encodes the
    /// envelope itself, producing one ready-to-send frame.
    fn encode_frame<T: Serialize>(
        &self,
        mut envelope: Envelope,
        message: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        envelope.payload = self.encode(message)?;
        self.encode(&envelope)
    }

    /// Reverses [`encode_frame`](Self::encode_frame): decodes the envelope
    /// and then its payload as `T`.
    fn decode_frame<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<(Envelope, T), ProtocolError> {
        let envelope: Envelope = self.decode(data)?;
        let message = self.decode(&envelope.payload)?;
        Ok((envelope, message))
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Human-readable and easy to inspect while developing clients. Behind the
/// `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use huddle_protocol::{Channel, Codec, Envelope, JsonCodec, MessageType};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(1, 5000, Channel::Reliable, MessageType::RoomList);
///
/// let bytes = codec.encode_frame(envelope, &vec!["lobby"]).unwrap();
/// let (decoded, rooms): (Envelope, Vec<String>) = codec.decode_frame(&bytes).unwrap();
///
/// assert_eq!(decoded.message_type, MessageType::RoomList);
/// assert_eq!(rooms, vec!["lobby".to_string()]);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Channel, MessageType, PlayerId, PlayerJoinedRoomMessage, RoomId};

    #[test]
    fn test_encode_frame_nests_payload_inside_envelope() {
        let codec = JsonCodec;
        let msg = PlayerJoinedRoomMessage {
            player_id: PlayerId::new("alice"),
            player_name: "Alice".into(),
            room_id: RoomId(9),
        };
        let envelope = Envelope::new(3, 120, Channel::Reliable, MessageType::PlayerJoinedRoom);

        let bytes = codec.encode_frame(envelope, &msg).unwrap();
        let (env, decoded): (Envelope, PlayerJoinedRoomMessage) =
            codec.decode_frame(&bytes).unwrap();

        assert_eq!(env.seq, 3);
        assert_eq!(env.message_type, MessageType::PlayerJoinedRoom);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_frame_with_wrong_payload_type_fails() {
        let codec = JsonCodec;
        let envelope = Envelope::new(1, 0, Channel::Reliable, MessageType::RoomList);
        let bytes = codec.encode_frame(envelope, &"just a string").unwrap();

        let result: Result<(Envelope, PlayerJoinedRoomMessage), _> =
            codec.decode_frame(&bytes);

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
