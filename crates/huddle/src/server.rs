//! `HuddleServer` builder and the service objects it wires together.
//!
//! The server owns one [`Lobby`] and, when voice is on, one
//! [`VoipManager`] sharing the same [`PlayerRegistry`]. Every connection
//! gets a [`ConnectionHandler`] holding `Arc`s to both; there is no global
//! state.

use std::sync::Arc;

use huddle_protocol::{Channel, MessageType, PlayerId};
use huddle_room::{Lobby, LobbyConfig};
use huddle_session::PlayerRegistry;
use huddle_transport::Outbound;
use huddle_voice::{ChannelRegistry, VoiceConfig, VoipManager};
use tokio::task::JoinHandle;

use crate::{ConnectionHandler, HuddleError, ServerConfig};

/// Builder for configuring a [`HuddleServer`].
///
/// # Example
///
/// ```rust,no_run
/// use huddle::HuddleServer;
///
/// # fn main() -> Result<(), huddle::HuddleError> {
/// let server = HuddleServer::builder()
///     .enable_voice(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct HuddleServerBuilder {
    config: ServerConfig,
}

impl HuddleServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.config.lobby = config;
        self
    }

    pub fn voice_config(mut self, config: VoiceConfig) -> Self {
        self.config.voice = config;
        self
    }

    pub fn enable_voice(mut self, enabled: bool) -> Self {
        self.config.enable_voice = enabled;
        self
    }

    /// Builds the service objects.
    ///
    /// # Errors
    /// [`HuddleError::Voice`] if voice is on and its config is invalid.
    pub fn build(self) -> Result<HuddleServer, HuddleError> {
        let players = Arc::new(PlayerRegistry::new());
        let lobby = Lobby::new(players, self.config.lobby.clone());

        let (lobby, voip) = if self.config.enable_voice {
            let registry = Arc::new(ChannelRegistry::new(self.config.voice.clone())?);
            let lobby = Arc::new(lobby.with_voice_provisioner(registry.clone()));
            let voip = Arc::new(VoipManager::new(registry, Arc::clone(&lobby)));
            (lobby, Some(voip))
        } else {
            (Arc::new(lobby), None)
        };

        tracing::info!(voice = self.config.enable_voice, "huddle server ready");
        Ok(HuddleServer {
            config: self.config,
            lobby,
            voip,
        })
    }
}

/// The assembled session layer.
///
/// Hand each accepted connection to [`connect`](Self::connect) and feed the
/// returned handler its decoded requests.
pub struct HuddleServer {
    config: ServerConfig,
    lobby: Arc<Lobby>,
    voip: Option<Arc<VoipManager>>,
}

impl HuddleServer {
    pub fn builder() -> HuddleServerBuilder {
        HuddleServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn lobby(&self) -> &Arc<Lobby> {
        &self.lobby
    }

    /// `None` when voice is disabled.
    pub fn voip(&self) -> Option<&Arc<VoipManager>> {
        self.voip.as_ref()
    }

    /// Registers a new player on `outbound` and returns the handler for its
    /// requests. The player is sent its own `PlayerInfo` first.
    ///
    /// # Errors
    /// [`HuddleError::Session`] if the id is empty or already connected.
    pub fn connect(
        &self,
        player_id: PlayerId,
        name: impl Into<String>,
        outbound: Arc<dyn Outbound>,
    ) -> Result<ConnectionHandler, HuddleError> {
        let conn_id = outbound.id();
        let player = self.lobby.create_player(player_id, name, outbound)?;
        tracing::info!(%conn_id, player_id = %player.id, "player connected");

        self.lobby.send_to_player(
            &player.id,
            MessageType::PlayerInfo,
            &player.info(),
            Channel::Reliable,
        );
        Ok(ConnectionHandler::new(
            player.id,
            conn_id,
            Arc::clone(&self.lobby),
            self.voip.clone(),
        ))
    }

    /// Spawns the periodic sweep that removes players whose transport died
    /// without a clean disconnect. Must be called inside a Tokio runtime.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let lobby = Arc::clone(&self.lobby);
        let period = self.config.prune_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let pruned = lobby.prune_disconnected();
                if !pruned.is_empty() {
                    tracing::debug!(count = pruned.len(), "maintenance sweep");
                }
            }
        })
    }
}
