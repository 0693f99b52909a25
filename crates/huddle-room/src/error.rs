//! Error types for the room layer.

use huddle_protocol::{PlayerId, RoomId, RoomState};

/// Errors that can occur during room operations.
///
/// The first group are not-found lookups; the rest are rejected
/// operations (invalid state). Neither is fatal: callers log and report.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (or is being destroyed).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No connected player has this id.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// The room is full.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is already a member of a room (this one or another).
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not a member of this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    #[error("player {0} is not in a room")]
    NoRoom(PlayerId),

    #[error("wrong password for room {0}")]
    WrongPassword(RoomId),

    #[error("game in room {0} already started")]
    AlreadyStarted(RoomId),

    #[error("game in room {0} has not started")]
    NotStarted(RoomId),

    #[error("game in room {room} is {state}, not paused")]
    NotPaused { room: RoomId, state: RoomState },

    #[error("room {room} has {have} players, needs {need}")]
    NotEnoughPlayers { room: RoomId, have: usize, need: usize },

    /// A freshly generated id was already taken. Retrying is safe.
    #[error("room id {0} collided, retry")]
    IdCollision(RoomId),

    /// The lobby's room limit is reached.
    #[error("room limit of {0} reached")]
    TooManyRooms(usize),

    #[error("invalid room config: {0}")]
    InvalidConfig(String),
}

impl RoomError {
    /// HTTP-style status for the client error reply.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::PlayerNotFound(_) | Self::NoRoom(_) => 404,
            Self::WrongPassword(_) => 403,
            Self::InvalidConfig(_) => 400,
            Self::IdCollision(_) | Self::TooManyRooms(_) => 503,
            _ => 409,
        }
    }
}

/// The voice subsystem couldn't provision or tear down a channel.
///
/// Always downgraded to a warning by the lobby; the room operation that
/// triggered it still succeeds.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("voice subsystem unavailable: {0}")]
    Unavailable(String),

    #[error("no voice channel for room {0}")]
    MissingChannel(RoomId),
}
