//! The player entity: identity, connection handle, room membership,
//! spatial state and gameplay stats.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use huddle_protocol::{Channel, PlayerId, PlayerInfo, PlayerState, RoomId, Transform};
use huddle_transport::{Outbound, TransportError};

/// Score needed per level.
const SCORE_PER_LEVEL: i64 = 1_000;

const DEFAULT_MAX_HEALTH: f32 = 100.0;

// ---------------------------------------------------------------------------
// PlayerStats
// ---------------------------------------------------------------------------

/// Per-session gameplay counters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub kills: u32,
    pub deaths: u32,
    pub score: i64,
    pub level: u32,
    pub health: f32,
    pub max_health: f32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            kills: 0,
            deaths: 0,
            score: 0,
            level: 1,
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
        }
    }
}

impl PlayerStats {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Adds (or subtracts) score and recomputes the level. Level never
    /// drops below 1.
    pub fn add_score(&mut self, points: i64) {
        self.score = self.score.saturating_add(points);
        self.level = 1 + (self.score.max(0) / SCORE_PER_LEVEL) as u32;
    }

    pub fn record_kill(&mut self, points: i64) {
        self.kills += 1;
        self.add_score(points);
    }

    /// Applies damage. Returns `true` if this hit was the killing blow;
    /// damage to an already dead player does nothing.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if !self.is_alive() || amount <= 0.0 {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        if self.health == 0.0 {
            self.deaths += 1;
            return true;
        }
        false
    }

    pub fn heal(&mut self, amount: f32) {
        if self.is_alive() && amount > 0.0 {
            self.health = (self.health + amount).min(self.max_health);
        }
    }

    pub fn respawn(&mut self) {
        self.health = self.max_health;
    }

    /// Kills per death; deaths of zero count as one.
    pub fn kd_ratio(&self) -> f32 {
        self.kills as f32 / self.deaths.max(1) as f32
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A connected player.
///
/// Owned by the [`PlayerRegistry`](crate::PlayerRegistry). Clones are
/// snapshots: they share the transport handle but not the mutable fields.
#[derive(Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    outbound: Arc<dyn Outbound>,

    /// The room this player is a member of. Non-`None` exactly while the
    /// room's member list contains this player; only the lobby writes it.
    pub current_room: Option<RoomId>,
    pub is_ready: bool,
    pub state: PlayerState,

    pub connected_at: Instant,
    pub last_activity: Instant,

    pub transform: Transform,
    pub stats: PlayerStats,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, outbound: Arc<dyn Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            name: name.into(),
            outbound,
            current_room: None,
            is_ready: false,
            state: PlayerState::Idle,
            connected_at: now,
            last_activity: now,
            transform: Transform::default(),
            stats: PlayerStats::default(),
        }
    }

    pub fn outbound(&self) -> &Arc<dyn Outbound> {
        &self.outbound
    }

    /// Queues an encoded frame on the requested channel.
    pub fn send(&self, data: Vec<u8>, channel: Channel) -> Result<(), TransportError> {
        match channel {
            Channel::Reliable => self.outbound.send(data),
            Channel::Unreliable => self.outbound.send_unreliable(data),
        }
    }

    /// `false` once the transport is gone or the player was marked
    /// disconnected.
    pub fn is_connected(&self) -> bool {
        self.state != PlayerState::Disconnected && self.outbound.is_alive()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Records room membership. Called by the lobby under the room lock.
    pub fn enter_room(&mut self, room_id: RoomId, game_running: bool) {
        self.current_room = Some(room_id);
        self.is_ready = false;
        self.state = if game_running {
            PlayerState::InGame
        } else {
            PlayerState::InLobby
        };
        self.touch();
    }

    /// Clears room membership. Called by the lobby under the room lock.
    pub fn exit_room(&mut self) {
        self.current_room = None;
        self.is_ready = false;
        if self.state != PlayerState::Disconnected {
            self.state = PlayerState::Idle;
        }
        self.touch();
    }

    /// Follows the room's game state after a transition. Called by the
    /// lobby under the room lock.
    pub fn sync_game_state(&mut self, game_running: bool) {
        if self.current_room.is_none() || self.state == PlayerState::Disconnected {
            return;
        }
        self.state = if game_running {
            PlayerState::InGame
        } else {
            PlayerState::InLobby
        };
    }

    /// Applies a transform update. Updates are unreliable and may arrive
    /// out of order, so one older than the current sample is ignored.
    /// Returns `true` if it was applied.
    pub fn update_transform(&mut self, transform: Transform) -> bool {
        if transform.timestamp < self.transform.timestamp {
            return false;
        }
        self.transform = transform;
        self.touch();
        true
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            player_id: self.id.clone(),
            name: self.name.clone(),
            room_id: self.current_room,
            is_ready: self.is_ready,
            state: self.state,
            position: self.transform.position,
            kills: self.stats.kills,
            deaths: self.stats.deaths,
            score: self.stats.score,
            level: self.stats.level,
            health: self.stats.health,
            max_health: self.stats.max_health,
        }
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connection", &self.outbound.id())
            .field("current_room", &self.current_room)
            .field("state", &self.state)
            .field("is_ready", &self.is_ready)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use huddle_protocol::Vec3;
    use huddle_transport::{ChannelOutbound, ConnectionId, OutboundFrame};

    use super::*;

    fn player() -> (Player, tokio::sync::mpsc::UnboundedReceiver<OutboundFrame>) {
        let (out, rx) = ChannelOutbound::pair(ConnectionId::new(1));
        (Player::new(PlayerId::new("p1"), "Alice", Arc::new(out)), rx)
    }

    #[test]
    fn test_new_player_is_idle_and_roomless() {
        let (p, _rx) = player();
        assert_eq!(p.state, PlayerState::Idle);
        assert!(p.current_room.is_none());
        assert!(p.is_connected());
        assert_eq!(p.stats.level, 1);
    }

    #[test]
    fn test_send_routes_by_channel() {
        let (p, mut rx) = player();

        p.send(vec![1], Channel::Reliable).unwrap();
        p.send(vec![2], Channel::Unreliable).unwrap();

        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Reliable(vec![1]));
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Unreliable(vec![2]));
    }

    #[test]
    fn test_enter_and_exit_room_track_state() {
        let (mut p, _rx) = player();
        p.is_ready = true;

        p.enter_room(RoomId(4), false);
        assert_eq!(p.current_room, Some(RoomId(4)));
        assert_eq!(p.state, PlayerState::InLobby);
        assert!(!p.is_ready, "joining resets readiness");

        p.exit_room();
        assert!(p.current_room.is_none());
        assert_eq!(p.state, PlayerState::Idle);
    }

    #[test]
    fn test_enter_running_game_is_in_game() {
        let (mut p, _rx) = player();
        p.enter_room(RoomId(4), true);
        assert_eq!(p.state, PlayerState::InGame);
    }

    #[test]
    fn test_sync_game_state_skips_roomless_and_disconnected() {
        let (mut p, _rx) = player();
        p.sync_game_state(true);
        assert_eq!(p.state, PlayerState::Idle);

        p.enter_room(RoomId(4), false);
        p.sync_game_state(true);
        assert_eq!(p.state, PlayerState::InGame);

        p.state = PlayerState::Disconnected;
        p.sync_game_state(false);
        assert_eq!(p.state, PlayerState::Disconnected);
    }

    #[test]
    fn test_stale_transform_is_ignored() {
        let (mut p, _rx) = player();
        let newer = Transform {
            position: Vec3::new(5.0, 0.0, 0.0),
            timestamp: 200,
            ..Transform::default()
        };
        let older = Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            timestamp: 100,
            ..Transform::default()
        };

        assert!(p.update_transform(newer));
        assert!(!p.update_transform(older));
        assert_eq!(p.transform.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_dropped_transport_means_disconnected() {
        let (p, rx) = player();
        drop(rx);
        assert!(!p.is_connected());
    }

    #[test]
    fn test_damage_kills_once() {
        let mut stats = PlayerStats::default();

        assert!(!stats.apply_damage(60.0));
        assert!(stats.apply_damage(60.0));
        assert!(!stats.apply_damage(10.0), "already dead");

        assert_eq!(stats.deaths, 1);
        assert_eq!(stats.health, 0.0);
    }

    #[test]
    fn test_heal_caps_at_max_and_skips_dead() {
        let mut stats = PlayerStats::default();
        stats.apply_damage(30.0);
        stats.heal(100.0);
        assert_eq!(stats.health, stats.max_health);

        stats.apply_damage(500.0);
        stats.heal(10.0);
        assert_eq!(stats.health, 0.0);

        stats.respawn();
        assert!(stats.is_alive());
    }

    #[test]
    fn test_score_drives_level() {
        let mut stats = PlayerStats::default();
        stats.record_kill(2_500);
        assert_eq!(stats.kills, 1);
        assert_eq!(stats.level, 3);

        stats.add_score(-10_000);
        assert_eq!(stats.level, 1);
    }

    #[test]
    fn test_kd_ratio_with_no_deaths() {
        let mut stats = PlayerStats::default();
        stats.record_kill(0);
        stats.record_kill(0);
        assert_eq!(stats.kd_ratio(), 2.0);
    }
}
