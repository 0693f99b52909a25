//! Error types for the session layer.

use huddle_protocol::PlayerId;

/// Errors that can occur while registering or looking up players.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No player is registered under this id.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// A player with this id is already registered. The connection
    /// handler must remove the old entry (full disconnect cleanup)
    /// before the id can be reused.
    #[error("player {0} already has an active session")]
    AlreadyConnected(PlayerId),

    /// The handshake produced an unusable identity (empty id or name).
    #[error("invalid player identity: {0}")]
    InvalidIdentity(String),
}
