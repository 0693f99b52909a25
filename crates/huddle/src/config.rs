//! Server-wide configuration.

use std::time::Duration;

use huddle_room::LobbyConfig;
use huddle_voice::VoiceConfig;
use serde::{Deserialize, Serialize};

use crate::HuddleError;

/// Everything needed to build a [`HuddleServer`](crate::HuddleServer).
///
/// Missing fields fall back to their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub lobby: LobbyConfig,
    pub voice: VoiceConfig,

    /// Without voice, rooms get no voice channel and voice requests are
    /// refused.
    pub enable_voice: bool,

    /// Default `tracing` filter; `RUST_LOG` overrides it.
    pub log_filter: String,

    /// How often the maintenance task sweeps players whose transport has
    /// gone away.
    pub prune_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            lobby: LobbyConfig::default(),
            voice: VoiceConfig::default(),
            enable_voice: true,
            log_filter: "info".to_string(),
            prune_interval_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Parses a JSON config document.
    ///
    /// # Errors
    /// [`HuddleError::InvalidConfig`] for malformed JSON or wrongly typed
    /// fields.
    pub fn from_json(json: &str) -> Result<Self, HuddleError> {
        serde_json::from_str(json).map_err(|e| HuddleError::InvalidConfig(e.to_string()))
    }

    /// Installs the global `tracing` subscriber with
    /// [`log_filter`](Self::log_filter) as the default filter. Call once,
    /// before building the server.
    ///
    /// # Errors
    /// See [`init_tracing`](crate::telemetry::init_tracing).
    pub fn init_tracing(&self) -> Result<(), HuddleError> {
        crate::telemetry::init_tracing(&self.log_filter)
    }

    /// Never zero.
    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms.max(1))
    }
}
