//! Wire protocol for Huddle.
//!
//! This crate defines what the session layer says to clients and what it
//! hears back:
//!
//! - **Types** ([`Envelope`], [`MessageType`], [`Channel`], ids and
//!   lifecycle states): the framing every outbound frame shares.
//! - **Messages** ([`PlayerJoinedRoomMessage`], [`AudioPacket`],
//!   [`AudioBroadcast`], [`ClientMessage`], ...): the bodies.
//! - **Math** ([`Vec3`], [`Transform`]): positions used by gameplay and
//!   positional audio.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Room / Voice
//! ```

mod codec;
mod error;
mod math;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use math::{Transform, Vec3};
pub use messages::{
    AudioBroadcast, AudioCodec, AudioPacket, ClientMessage, ErrorMessage,
    PlayerInfo, PlayerJoinedRoomMessage, PlayerLeftRoomMessage,
    PlayerReadyMessage, RoomInfo, RoomListMessage, RoomSettingMessage,
    RoomStateChangedMessage, VoiceActivityMessage,
};
pub use types::{
    Channel, Envelope, MessageType, PlayerId, PlayerState, RoomId, RoomState,
    ServerClock,
};
