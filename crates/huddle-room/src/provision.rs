//! The optional voice capability a [`Lobby`](crate::Lobby) can hold.

use huddle_protocol::{PlayerId, RoomId};

use crate::ProvisionError;

/// Pairs rooms with voice channels.
///
/// The lobby holds this as `Option<Arc<dyn VoiceProvisioner>>`: a server
/// without voice simply has none. Failures never roll back the room
/// operation that triggered them; the lobby logs them and carries on.
pub trait VoiceProvisioner: Send + Sync + 'static {
    /// Called right after a room is created.
    fn provision(&self, room_id: RoomId) -> Result<(), ProvisionError>;

    /// Called after a room is destroyed and its members are gone.
    fn teardown(&self, room_id: RoomId) -> Result<(), ProvisionError>;

    /// Called as a player leaves a room, before the remaining members
    /// hear about it. Returns `true` if the player was talking there; the
    /// lobby then tells those members it stopped.
    fn player_left(&self, player_id: &PlayerId, room_id: RoomId) -> bool;

    /// Called while a player disconnects, after it left its room.
    fn release_player(&self, player_id: &PlayerId);
}
