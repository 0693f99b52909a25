//! A single game session: members, capacity/privacy rules, the
//! game-progress state machine and free-form settings.
//!
//! Immutable properties live directly on [`Room`]. Everything that changes
//! sits in [`RoomCore`] behind the room's own mutex, so multi-step
//! sequences (capacity check then add, guarded transitions, setting
//! read-modify-write) are atomic per room while different rooms never
//! contend.

use std::collections::HashMap;
use std::time::Instant;

use huddle_protocol::{PlayerId, RoomId, RoomInfo, RoomState, RoomStateChangedMessage};
use parking_lot::{Mutex, MutexGuard};

use crate::{RoomConfig, RoomError};

/// A state transition that actually changed the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: RoomState,
    pub to: RoomState,
}

impl StateChange {
    pub fn message(&self, room_id: RoomId) -> RoomStateChangedMessage {
        RoomStateChangedMessage {
            room_id,
            old_state: self.from,
            new_state: self.to,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomCore: the mutable part
// ---------------------------------------------------------------------------

/// Mutable room state. Only reachable through [`Room::lock`].
#[derive(Debug)]
pub struct RoomCore {
    id: RoomId,
    members: Vec<PlayerId>,
    state: RoomState,
    started: bool,
    /// Set once the room is being destroyed; joins are refused from then on.
    closed: bool,
    settings: HashMap<String, String>,
    last_activity: Instant,
}

impl RoomCore {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::new(),
            state: RoomState::Waiting,
            started: false,
            closed: false,
            settings: HashMap::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn members(&self) -> &[PlayerId] {
        &self.members
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.members.contains(player_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Members other than `exclude`, in join order.
    pub fn others(&self, exclude: &PlayerId) -> Vec<PlayerId> {
        self.members.iter().filter(|m| *m != exclude).cloned().collect()
    }

    pub(crate) fn add_member(&mut self, player_id: PlayerId) {
        self.members.push(player_id);
        self.touch();
    }

    pub(crate) fn remove_member(&mut self, player_id: &PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != player_id);
        self.touch();
        self.members.len() != before
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Moves to `to`. Returns the change only if the state differs.
    fn set_state(&mut self, to: RoomState) -> Option<StateChange> {
        let from = self.state;
        self.state = to;
        self.touch();
        (from != to).then_some(StateChange { from, to })
    }

    // -- State machine ----------------------------------------------------

    /// Waiting/Finished → Starting → InProgress.
    ///
    /// Starting is transient: the room passes through it while the game is
    /// set up, and only the overall change is reported.
    pub fn start_game(&mut self, min_players: usize) -> Result<Option<StateChange>, RoomError> {
        if self.started {
            return Err(RoomError::AlreadyStarted(self.id));
        }
        if self.members.len() < min_players {
            return Err(RoomError::NotEnoughPlayers {
                room: self.id,
                have: self.members.len(),
                need: min_players,
            });
        }
        let from = self.state;
        self.started = true;
        self.set_state(RoomState::Starting);
        self.set_state(RoomState::InProgress);
        Ok((from != RoomState::InProgress).then_some(StateChange {
            from,
            to: RoomState::InProgress,
        }))
    }

    pub fn end_game(&mut self) -> Result<Option<StateChange>, RoomError> {
        if !self.started {
            return Err(RoomError::NotStarted(self.id));
        }
        self.started = false;
        Ok(self.set_state(RoomState::Finished))
    }

    pub fn pause_game(&mut self) -> Result<Option<StateChange>, RoomError> {
        if !self.started {
            return Err(RoomError::NotStarted(self.id));
        }
        Ok(self.set_state(RoomState::Paused))
    }

    pub fn resume_game(&mut self) -> Result<Option<StateChange>, RoomError> {
        if self.state != RoomState::Paused {
            return Err(RoomError::NotPaused {
                room: self.id,
                state: self.state,
            });
        }
        Ok(self.set_state(RoomState::InProgress))
    }

    /// Unconditional return to Waiting.
    pub fn reset(&mut self) -> Option<StateChange> {
        self.started = false;
        self.set_state(RoomState::Waiting)
    }

    /// Pauses a started game whose membership fell below `min_players`.
    pub fn auto_pause(&mut self, min_players: usize) -> Option<StateChange> {
        if self.started && self.members.len() < min_players {
            self.set_state(RoomState::Paused)
        } else {
            None
        }
    }

    // -- Settings ---------------------------------------------------------

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Stores a setting, returning the previous value.
    pub fn set_setting(&mut self, key: String, value: String) -> Option<String> {
        self.touch();
        self.settings.insert(key, value)
    }

    pub fn remove_setting(&mut self, key: &str) -> Option<String> {
        self.touch();
        self.settings.remove(key)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A game room. Shared as `Arc<Room>` by the lobby and in-flight operations.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    capacity: usize,
    is_private: bool,
    password: Option<String>,
    persistent: bool,
    created_at: Instant,
    core: Mutex<RoomCore>,
    /// Held while a committed change is fanned out, so notifications leave
    /// in commit order without keeping `core` locked during sends.
    dispatch: Mutex<()>,
}

impl Room {
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            id,
            name: config.name,
            capacity: config.max_players,
            is_private: config.is_private,
            password: config.password,
            persistent: config.persistent,
            created_at: Instant::now(),
            core: Mutex::new(RoomCore::new(id)),
            dispatch: Mutex::new(()),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Public rooms accept any password; private rooms need an exact match.
    pub fn check_password(&self, password: Option<&str>) -> bool {
        !self.is_private || self.password.as_deref() == password
    }

    /// Locks the mutable state.
    pub fn lock(&self) -> MutexGuard<'_, RoomCore> {
        self.core.lock()
    }

    /// Releases `core` only after taking the dispatch lock. Whoever holds
    /// the returned guard sends next; the room itself is free to mutate.
    pub(crate) fn hand_off<'a>(&'a self, core: MutexGuard<'a, RoomCore>) -> MutexGuard<'a, ()> {
        let dispatch = self.dispatch.lock();
        drop(core);
        dispatch
    }

    // -- Locked reads -----------------------------------------------------

    pub fn state(&self) -> RoomState {
        self.core.lock().state()
    }

    pub fn is_started(&self) -> bool {
        self.core.lock().is_started()
    }

    pub fn player_count(&self) -> usize {
        self.core.lock().len()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.core.lock().members().to_vec()
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.core.lock().contains(player_id)
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.core.lock().is_empty()
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.core.lock().setting(key).map(str::to_owned)
    }

    pub fn settings(&self) -> HashMap<String, String> {
        self.core.lock().settings.clone()
    }

    pub fn last_activity(&self) -> Instant {
        self.core.lock().last_activity
    }

    pub fn info(&self) -> RoomInfo {
        let core = self.core.lock();
        self.info_locked(&core)
    }

    pub(crate) fn info_locked(&self, core: &RoomCore) -> RoomInfo {
        RoomInfo {
            room_id: self.id,
            name: self.name.clone(),
            player_count: core.len(),
            max_players: self.capacity,
            is_private: self.is_private,
            is_persistent: self.persistent,
            state: core.state(),
            players: core.members().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn room_with(n: usize) -> Room {
        let room = Room::new(RoomId(1), RoomConfig::new("test", 8));
        {
            let mut core = room.lock();
            for i in 0..n {
                core.add_member(pid(&format!("p{i}")));
            }
        }
        room
    }

    // =====================================================================
    // Membership
    // =====================================================================

    #[test]
    fn test_new_room_is_waiting_and_empty() {
        let room = Room::new(RoomId(1), RoomConfig::new("test", 4));
        assert_eq!(room.state(), RoomState::Waiting);
        assert!(room.is_empty());
        assert!(!room.is_started());
        assert_eq!(room.capacity(), 4);
    }

    #[test]
    fn test_remove_member_reports_presence() {
        let room = room_with(2);
        let mut core = room.lock();
        assert!(core.remove_member(&pid("p0")));
        assert!(!core.remove_member(&pid("p0")));
        assert_eq!(core.members(), &[pid("p1")]);
    }

    #[test]
    fn test_others_excludes_and_keeps_join_order() {
        let room = room_with(3);
        assert_eq!(room.lock().others(&pid("p1")), vec![pid("p0"), pid("p2")]);
    }

    #[test]
    fn test_check_password() {
        let public = Room::new(RoomId(1), RoomConfig::new("pub", 2));
        assert!(public.check_password(None));
        assert!(public.check_password(Some("anything")));

        let private = Room::new(RoomId(2), RoomConfig::new("priv", 2).private("secret"));
        assert!(!private.check_password(Some("wrong")));
        assert!(!private.check_password(None));
        assert!(private.check_password(Some("secret")));
    }

    // =====================================================================
    // State machine
    // =====================================================================

    #[test]
    fn test_start_game_needs_two_players() {
        let room = room_with(1);
        let result = room.lock().start_game(2);
        assert!(matches!(
            result,
            Err(RoomError::NotEnoughPlayers { have: 1, need: 2, .. })
        ));
        assert_eq!(room.state(), RoomState::Waiting);
    }

    #[test]
    fn test_start_game_lands_in_progress() {
        let room = room_with(2);
        let change = room.lock().start_game(2).unwrap();
        assert_eq!(
            change,
            Some(StateChange {
                from: RoomState::Waiting,
                to: RoomState::InProgress
            })
        );
        assert!(room.is_started());
    }

    #[test]
    fn test_start_game_twice_fails() {
        let room = room_with(2);
        room.lock().start_game(2).unwrap();
        assert!(matches!(room.lock().start_game(2), Err(RoomError::AlreadyStarted(_))));
    }

    #[test]
    fn test_pause_requires_started() {
        let room = room_with(2);
        assert!(matches!(room.lock().pause_game(), Err(RoomError::NotStarted(_))));
    }

    #[test]
    fn test_pause_resume_cycle() {
        let room = room_with(2);
        let mut core = room.lock();
        core.start_game(2).unwrap();

        let paused = core.pause_game().unwrap();
        assert_eq!(paused.map(|c| c.to), Some(RoomState::Paused));

        assert_eq!(core.pause_game().unwrap(), None, "already paused, no change");

        let resumed = core.resume_game().unwrap();
        assert_eq!(resumed.map(|c| c.to), Some(RoomState::InProgress));
    }

    #[test]
    fn test_resume_unless_paused_fails() {
        let room = room_with(2);
        let mut core = room.lock();
        assert!(matches!(core.resume_game(), Err(RoomError::NotPaused { .. })));
        core.start_game(2).unwrap();
        assert!(matches!(
            core.resume_game(),
            Err(RoomError::NotPaused {
                state: RoomState::InProgress,
                ..
            })
        ));
    }

    #[test]
    fn test_end_game_requires_started_and_finishes() {
        let room = room_with(2);
        let mut core = room.lock();
        assert!(matches!(core.end_game(), Err(RoomError::NotStarted(_))));

        core.start_game(2).unwrap();
        let change = core.end_game().unwrap();

        assert_eq!(change.map(|c| c.to), Some(RoomState::Finished));
        assert!(!core.is_started());
    }

    #[test]
    fn test_finished_room_can_start_again() {
        let room = room_with(2);
        let mut core = room.lock();
        core.start_game(2).unwrap();
        core.end_game().unwrap();

        let change = core.start_game(2).unwrap();
        assert_eq!(
            change,
            Some(StateChange {
                from: RoomState::Finished,
                to: RoomState::InProgress
            })
        );
    }

    #[test]
    fn test_reset_is_unconditional() {
        let room = room_with(2);
        let mut core = room.lock();
        assert_eq!(core.reset(), None, "already waiting");

        core.start_game(2).unwrap();
        core.pause_game().unwrap();
        let change = core.reset();

        assert_eq!(change.map(|c| c.to), Some(RoomState::Waiting));
        assert!(!core.is_started());
    }

    #[test]
    fn test_auto_pause_only_when_started_and_short() {
        let room = room_with(2);
        let mut core = room.lock();
        core.remove_member(&pid("p1"));
        assert_eq!(core.auto_pause(2), None, "not started");

        core.add_member(pid("p1"));
        core.start_game(2).unwrap();
        assert_eq!(core.auto_pause(2), None, "still two players");

        core.remove_member(&pid("p1"));
        assert_eq!(
            core.auto_pause(2),
            Some(StateChange {
                from: RoomState::InProgress,
                to: RoomState::Paused
            })
        );
    }

    // =====================================================================
    // Settings / info
    // =====================================================================

    #[test]
    fn test_settings_read_modify_write() {
        let room = room_with(0);
        let mut core = room.lock();
        assert_eq!(core.set_setting("map".into(), "dust".into()), None);
        assert_eq!(core.set_setting("map".into(), "nuke".into()).as_deref(), Some("dust"));
        assert_eq!(core.setting("map"), Some("nuke"));
        assert_eq!(core.remove_setting("map").as_deref(), Some("nuke"));
        assert_eq!(core.setting("map"), None);
    }

    #[test]
    fn test_info_snapshot() {
        let room = room_with(2);
        let info = room.info();
        assert_eq!(info.room_id, RoomId(1));
        assert_eq!(info.player_count, 2);
        assert_eq!(info.max_players, 8);
        assert_eq!(info.players, vec![pid("p0"), pid("p1")]);
    }
}
