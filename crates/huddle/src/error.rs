//! Unified error type for the Huddle server.

use huddle_protocol::ProtocolError;
use huddle_room::RoomError;
use huddle_session::SessionError;
use huddle_transport::TransportError;
use huddle_voice::VoiceError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `huddle` crate, you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` variants let
/// `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    /// A voice request reached a server running without voice.
    #[error("voice is disabled on this server")]
    VoiceDisabled,

    #[error("invalid server config: {0}")]
    InvalidConfig(String),
}

impl HuddleError {
    /// Status code carried in the `Error` reply to a client.
    pub fn code(&self) -> u16 {
        match self {
            Self::Room(e) => e.code(),
            Self::Session(SessionError::NotFound(_)) => 404,
            Self::Session(SessionError::AlreadyConnected(_)) => 409,
            Self::Protocol(_)
            | Self::Voice(_)
            | Self::Session(SessionError::InvalidIdentity(_))
            | Self::InvalidConfig(_) => 400,
            Self::Transport(_) | Self::VoiceDisabled => 503,
        }
    }
}
