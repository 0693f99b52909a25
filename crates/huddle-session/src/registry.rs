//! The player registry: every connected player, keyed by id.
//!
//! # Concurrency note
//!
//! Unlike a single-owner manager, this registry is shared by every
//! connection task, so it sits on a `DashMap`. Each entry is guarded by
//! its shard lock: [`update`](PlayerRegistry::update) runs its closure with
//! exclusive access to one player. Callers that also hold a room lock must
//! always take the room lock first, then the player entry, never the
//! reverse.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_protocol::{PlayerId, Vec3};
use huddle_transport::Outbound;

use crate::{Player, SessionError};

/// Owns all connected [`Player`]s.
///
/// ```text
/// create() ──→ [registered] ──→ update()/get() ... ──→ remove()
/// ```
///
/// Removing a player here does not detach it from its room; the lobby's
/// `remove_player` does the full disconnect cleanup and calls
/// [`remove`](Self::remove) last.
#[derive(Default)]
pub struct PlayerRegistry {
    players: DashMap<PlayerId, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new player after a successful handshake.
    ///
    /// # Errors
    /// - [`SessionError::InvalidIdentity`] if the id or name is blank.
    /// - [`SessionError::AlreadyConnected`] if the id is taken.
    pub fn create(
        &self,
        id: PlayerId,
        name: impl Into<String>,
        outbound: Arc<dyn Outbound>,
    ) -> Result<Player, SessionError> {
        let name = name.into();
        if id.as_str().trim().is_empty() {
            return Err(SessionError::InvalidIdentity("empty player id".into()));
        }
        if name.trim().is_empty() {
            return Err(SessionError::InvalidIdentity(format!(
                "empty name for player {id}"
            )));
        }

        match self.players.entry(id.clone()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyConnected(id)),
            Entry::Vacant(slot) => {
                let player = Player::new(id, name, outbound);
                let snapshot = player.clone();
                slot.insert(player);
                tracing::info!(player_id = %snapshot.id, name = %snapshot.name, "player registered");
                Ok(snapshot)
            }
        }
    }

    /// Removes a player, returning the final snapshot.
    pub fn remove(&self, id: &PlayerId) -> Option<Player> {
        let removed = self.players.remove(id).map(|(_, player)| player);
        if removed.is_some() {
            tracing::info!(player_id = %id, "player unregistered");
        }
        removed
    }

    /// Returns a snapshot of the player.
    pub fn get(&self, id: &PlayerId) -> Option<Player> {
        self.players.get(id).map(|p| p.clone())
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Runs `f` with exclusive access to one player.
    ///
    /// Returns `None` if the player isn't registered. `f` must not call
    /// back into the registry.
    pub fn update<R>(&self, id: &PlayerId, f: impl FnOnce(&mut Player) -> R) -> Option<R> {
        self.players.get_mut(id).map(|mut p| f(p.value_mut()))
    }

    /// The player's transport handle, for sending outside any lock.
    pub fn outbound(&self, id: &PlayerId) -> Option<Arc<dyn Outbound>> {
        self.players.get(id).map(|p| Arc::clone(p.outbound()))
    }

    pub fn position(&self, id: &PlayerId) -> Option<Vec3> {
        self.players.get(id).map(|p| p.transform.position)
    }

    /// Snapshots of every registered player.
    pub fn all(&self) -> Vec<Player> {
        self.players.iter().map(|p| p.value().clone()).collect()
    }

    /// Ids of players whose transport has gone away.
    pub fn disconnected(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| !p.is_connected())
            .map(|p| p.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use huddle_protocol::{RoomId, Transform};
    use huddle_transport::{ChannelOutbound, ConnectionId, OutboundFrame};
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn outbound(n: u64) -> (Arc<dyn Outbound>, UnboundedReceiver<OutboundFrame>) {
        let (out, rx) = ChannelOutbound::pair(ConnectionId::new(n));
        (Arc::new(out), rx)
    }

    // =====================================================================
    // create()
    // =====================================================================

    #[test]
    fn test_create_new_player_returns_snapshot() {
        let registry = PlayerRegistry::new();
        let (out, _rx) = outbound(1);

        let player = registry.create(pid("a"), "Alice", out).expect("should succeed");

        assert_eq!(player.id, pid("a"));
        assert_eq!(player.name, "Alice");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_duplicate_id_returns_already_connected() {
        let registry = PlayerRegistry::new();
        let (out1, _rx1) = outbound(1);
        let (out2, _rx2) = outbound(2);
        registry.create(pid("a"), "Alice", out1).unwrap();

        let result = registry.create(pid("a"), "Impostor", out2);

        assert!(matches!(result, Err(SessionError::AlreadyConnected(p)) if p == pid("a")));
        assert_eq!(registry.get(&pid("a")).unwrap().name, "Alice");
    }

    #[test]
    fn test_create_blank_identity_is_rejected() {
        let registry = PlayerRegistry::new();
        let (out, _rx) = outbound(1);

        let result = registry.create(pid("  "), "Alice", Arc::clone(&out));
        assert!(matches!(result, Err(SessionError::InvalidIdentity(_))));

        let result = registry.create(pid("a"), "", out);
        assert!(matches!(result, Err(SessionError::InvalidIdentity(_))));
        assert!(registry.is_empty());
    }

    // =====================================================================
    // update() / get()
    // =====================================================================

    #[test]
    fn test_update_mutates_in_place() {
        let registry = PlayerRegistry::new();
        let (out, _rx) = outbound(1);
        registry.create(pid("a"), "Alice", out).unwrap();

        let applied = registry.update(&pid("a"), |p| {
            p.enter_room(RoomId(3), false);
            p.update_transform(Transform::at(Vec3::new(1.0, 2.0, 3.0)))
        });

        assert_eq!(applied, Some(true));
        let snapshot = registry.get(&pid("a")).unwrap();
        assert_eq!(snapshot.current_room, Some(RoomId(3)));
        assert_eq!(registry.position(&pid("a")), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_update_unknown_player_returns_none() {
        let registry = PlayerRegistry::new();
        assert!(registry.update(&pid("ghost"), |p| p.touch()).is_none());
        assert!(registry.get(&pid("ghost")).is_none());
        assert!(registry.outbound(&pid("ghost")).is_none());
    }

    #[test]
    fn test_snapshot_does_not_alias_registry_entry() {
        let registry = PlayerRegistry::new();
        let (out, _rx) = outbound(1);
        let mut snapshot = registry.create(pid("a"), "Alice", out).unwrap();

        snapshot.is_ready = true;

        assert!(!registry.get(&pid("a")).unwrap().is_ready);
    }

    // =====================================================================
    // remove() / disconnected()
    // =====================================================================

    #[test]
    fn test_remove_returns_final_snapshot() {
        let registry = PlayerRegistry::new();
        let (out, _rx) = outbound(1);
        registry.create(pid("a"), "Alice", out).unwrap();

        let removed = registry.remove(&pid("a")).expect("was registered");

        assert_eq!(removed.id, pid("a"));
        assert!(!registry.contains(&pid("a")));
        assert!(registry.remove(&pid("a")).is_none());
    }

    #[test]
    fn test_disconnected_lists_players_with_dead_transport() {
        let registry = PlayerRegistry::new();
        let (out1, rx1) = outbound(1);
        let (out2, _rx2) = outbound(2);
        registry.create(pid("a"), "Alice", out1).unwrap();
        registry.create(pid("b"), "Bob", out2).unwrap();

        drop(rx1);

        assert_eq!(registry.disconnected(), vec![pid("a")]);
    }

    #[test]
    fn test_all_returns_every_player() {
        let registry = PlayerRegistry::new();
        let mut receivers = Vec::new();
        for (n, id) in ["a", "b", "c"].iter().enumerate() {
            let (out, rx) = outbound(n as u64);
            receivers.push(rx);
            registry.create(pid(id), id.to_uppercase(), out).unwrap();
        }

        let mut ids: Vec<PlayerId> = registry.all().into_iter().map(|p| p.id).collect();
        ids.sort();

        assert_eq!(ids, vec![pid("a"), pid("b"), pid("c")]);
    }
}
