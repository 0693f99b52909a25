//! Lobby and room configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Server-wide limits for the room registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Capacity used when a client creates a room without choosing one.
    pub default_max_players: usize,

    /// Members needed to start a game. A running game whose membership
    /// drops below this is paused automatically.
    pub min_players_to_start: usize,

    /// Upper bound on concurrently existing rooms.
    pub max_rooms: usize,

    /// Buffered [`LobbyEvent`](crate::LobbyEvent)s per subscriber before a
    /// slow subscriber starts lagging.
    pub event_capacity: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_max_players: 8,
            min_players_to_start: 2,
            max_rooms: 10_000,
            event_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings fixed at room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub name: String,

    /// Capacity. Never exceeded, including under concurrent joins.
    pub max_players: usize,

    /// Private rooms are hidden from listings and require `password`.
    pub is_private: bool,

    pub password: Option<String>,

    /// Persistent rooms survive becoming empty.
    pub persistent: bool,
}

impl RoomConfig {
    /// A public, non-persistent room.
    pub fn new(name: impl Into<String>, max_players: usize) -> Self {
        Self {
            name: name.into(),
            max_players,
            is_private: false,
            password: None,
            persistent: false,
        }
    }

    /// Makes the room private, guarded by `password`.
    pub fn private(mut self, password: impl Into<String>) -> Self {
        self.is_private = true;
        self.password = Some(password.into());
        self
    }

    /// Keeps the room alive after its last member leaves.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self::new("Room", LobbyConfig::default().default_max_players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.min_players_to_start, 2);
        assert_eq!(config.default_max_players, 8);
    }

    #[test]
    fn test_lobby_config_partial_json_fills_defaults() {
        let config: LobbyConfig = serde_json::from_str(r#"{"max_rooms": 5}"#).unwrap();
        assert_eq!(config.max_rooms, 5);
        assert_eq!(config.min_players_to_start, 2);
    }

    #[test]
    fn test_room_config_builders() {
        let config = RoomConfig::new("duel", 2).private("secret").persistent();
        assert!(config.is_private);
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert!(config.persistent);
        assert_eq!(config.max_players, 2);
    }
}
