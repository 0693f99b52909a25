//! Error types for the voice layer.

use huddle_protocol::RoomId;

/// Errors raised by voice configuration and audio decoding.
///
/// Audio errors never reach a client: the pipeline turns them into a
/// dropped packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("empty audio payload")]
    EmptyPayload,

    /// A 16-bit payload with a dangling byte.
    #[error("{0} bytes is not a whole number of 16-bit samples")]
    TruncatedSample(usize),

    #[error("invalid voice config: {0}")]
    InvalidConfig(String),

    #[error("no voice channel for room {0}")]
    ChannelNotFound(RoomId),
}
