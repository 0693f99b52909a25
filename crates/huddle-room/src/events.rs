use huddle_protocol::{PlayerId, RoomId, RoomState};

/// Lobby lifecycle notifications for in-process observers.
///
/// Published on a `tokio::sync::broadcast` channel after the change has
/// committed, in commit order per room. Subscribe with
/// [`Lobby::subscribe`](crate::Lobby::subscribe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    RoomCreated { room_id: RoomId },
    RoomDestroyed { room_id: RoomId },
    PlayerJoined { player_id: PlayerId, room_id: RoomId },
    PlayerLeft { player_id: PlayerId, room_id: RoomId },
    RoomStateChanged { room_id: RoomId, from: RoomState, to: RoomState },
}

impl LobbyEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::RoomCreated { room_id }
            | Self::RoomDestroyed { room_id }
            | Self::PlayerJoined { room_id, .. }
            | Self::PlayerLeft { room_id, .. }
            | Self::RoomStateChanged { room_id, .. } => *room_id,
        }
    }
}
