//! Voice channels by room and voice state by player.

use std::sync::Arc;

use dashmap::DashMap;
use huddle_protocol::{PlayerId, RoomId};
use huddle_room::{ProvisionError, VoiceProvisioner};
use tokio::sync::broadcast;

use crate::{PlayerVoiceState, TalkingEdge, VoiceChannel, VoiceConfig, VoiceError, VoiceEvent};

const EVENT_CAPACITY: usize = 256;

/// Owns every [`VoiceChannel`] and [`PlayerVoiceState`].
///
/// Both maps are keyed DashMaps; no operation here holds more than one
/// entry at a time. The lobby reaches this registry only through the
/// [`VoiceProvisioner`] impl.
///
/// Talking edges are decided here, against the player's state, and
/// published as [`VoiceEvent`]s. Telling room members is left to the
/// caller, which owns the lobby.
#[derive(Debug)]
pub struct ChannelRegistry {
    config: VoiceConfig,
    channels: DashMap<RoomId, Arc<VoiceChannel>>,
    states: DashMap<PlayerId, PlayerVoiceState>,
    events: broadcast::Sender<VoiceEvent>,
}

impl ChannelRegistry {
    /// # Errors
    /// [`VoiceError::InvalidConfig`] if the config fails validation.
    pub fn new(config: VoiceConfig) -> Result<Self, VoiceError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config,
            channels: DashMap::new(),
            states: DashMap::new(),
            events,
        })
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.events.subscribe()
    }

    // -- Channels ---------------------------------------------------------

    /// Returns the room's channel, creating it on first call. Every call
    /// for the same room yields the same `Arc`.
    pub fn create_voice_channel(&self, room_id: RoomId) -> Arc<VoiceChannel> {
        let entry = self.channels.entry(room_id).or_insert_with(|| {
            tracing::info!(%room_id, "voice channel created");
            Arc::new(VoiceChannel::new(room_id, self.config.clone()))
        });
        Arc::clone(entry.value())
    }

    /// Removes the channel and clears its speech tracking. Returns `false`
    /// if the room had none.
    pub fn destroy_voice_channel(&self, room_id: RoomId) -> bool {
        match self.channels.remove(&room_id) {
            Some((_, channel)) => {
                channel.clear();
                tracing::info!(%room_id, "voice channel destroyed");
                true
            }
            None => false,
        }
    }

    pub fn get_voice_channel(&self, room_id: RoomId) -> Option<Arc<VoiceChannel>> {
        self.channels.get(&room_id).map(|c| Arc::clone(c.value()))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    // -- Player state -----------------------------------------------------

    /// Snapshot of the player's voice state, created with defaults if it
    /// doesn't exist yet.
    pub fn get_or_create_voice_state(&self, player_id: &PlayerId) -> PlayerVoiceState {
        self.update_state(player_id, |s| s.clone())
    }

    /// Snapshot without creating.
    pub fn voice_state(&self, player_id: &PlayerId) -> Option<PlayerVoiceState> {
        self.states.get(player_id).map(|s| s.clone())
    }

    /// Runs `f` with exclusive access to the player's state, creating it
    /// first if needed.
    pub fn update_state<R>(
        &self,
        player_id: &PlayerId,
        f: impl FnOnce(&mut PlayerVoiceState) -> R,
    ) -> R {
        let mut state = self
            .states
            .entry(player_id.clone())
            .or_insert_with(|| PlayerVoiceState::new(player_id.clone()));
        f(state.value_mut())
    }

    /// Sets the mute flag. Muting a talking player ends its speech; the
    /// room it was talking in is returned so members can be told.
    pub fn set_player_muted(&self, player_id: &PlayerId, muted: bool) -> Option<RoomId> {
        let stopped = self.update_state(player_id, |s| s.set_muted(muted));
        tracing::debug!(%player_id, muted, "mute changed");
        if let Some(room_id) = stopped {
            self.stopped_talking(player_id, room_id);
        }
        stopped
    }

    pub fn set_player_deafened(&self, player_id: &PlayerId, deafened: bool) {
        self.update_state(player_id, |s| {
            s.is_deafened = deafened;
            s.touch();
        });
        tracing::debug!(%player_id, deafened, "deafen changed");
    }

    /// Both volumes are clamped to `[0, 2]`.
    pub fn set_player_volume(&self, player_id: &PlayerId, input: f32, output: f32) {
        self.update_state(player_id, |s| s.set_volume(input, output));
    }

    pub fn record_latency(&self, player_id: &PlayerId, latency_ms: u32) {
        self.update_state(player_id, |s| s.record_latency(latency_ms));
    }

    // -- Talking ----------------------------------------------------------

    /// Applies a talking write and, for each edge it produced, updates the
    /// affected channel and publishes a [`VoiceEvent`].
    pub fn set_talking(&self, player_id: &PlayerId, room_id: RoomId, talking: bool) -> TalkingEdge {
        let edge = self.update_state(player_id, |s| s.set_talking(room_id, talking));
        if let Some(stopped) = edge.stopped_in {
            self.stopped_talking(player_id, stopped);
        }
        if let Some(started) = edge.started_in {
            if let Some(channel) = self.get_voice_channel(started) {
                channel.speaker_started(player_id);
            }
            let _ = self.events.send(VoiceEvent::StartedTalking {
                player_id: player_id.clone(),
                room_id: started,
            });
        }
        edge
    }

    /// Ends the player's speech in `room_id`, if it is talking there.
    pub fn stop_talking_in(&self, player_id: &PlayerId, room_id: RoomId) -> bool {
        let stopped = self
            .states
            .get_mut(player_id)
            .is_some_and(|mut s| s.stop_talking_in(room_id));
        if stopped {
            self.stopped_talking(player_id, room_id);
        }
        stopped
    }

    fn stopped_talking(&self, player_id: &PlayerId, room_id: RoomId) {
        if let Some(channel) = self.get_voice_channel(room_id) {
            channel.speaker_stopped(player_id);
        }
        // No subscribers is fine.
        let _ = self.events.send(VoiceEvent::StoppedTalking {
            player_id: player_id.clone(),
            room_id,
        });
    }

    pub fn is_muted(&self, player_id: &PlayerId) -> bool {
        self.states.get(player_id).is_some_and(|s| s.is_muted)
    }

    pub fn is_deafened(&self, player_id: &PlayerId) -> bool {
        self.states.get(player_id).is_some_and(|s| s.is_deafened)
    }

    /// Drops the player's voice state and any channel tracking. Returns
    /// `true` if a state existed.
    pub fn remove_player(&self, player_id: &PlayerId) -> bool {
        let removed = self.states.remove(player_id).is_some();
        let channels: Vec<Arc<VoiceChannel>> =
            self.channels.iter().map(|c| Arc::clone(c.value())).collect();
        for channel in channels {
            channel.forget_player(player_id);
        }
        if removed {
            tracing::debug!(%player_id, "voice state removed");
        }
        removed
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl VoiceProvisioner for ChannelRegistry {
    fn provision(&self, room_id: RoomId) -> Result<(), ProvisionError> {
        self.create_voice_channel(room_id);
        Ok(())
    }

    fn teardown(&self, room_id: RoomId) -> Result<(), ProvisionError> {
        if self.destroy_voice_channel(room_id) {
            Ok(())
        } else {
            Err(ProvisionError::MissingChannel(room_id))
        }
    }

    fn player_left(&self, player_id: &PlayerId, room_id: RoomId) -> bool {
        let stopped = self.stop_talking_in(player_id, room_id);
        if let Some(channel) = self.get_voice_channel(room_id) {
            channel.forget_player(player_id);
        }
        stopped
    }

    fn release_player(&self, player_id: &PlayerId) {
        self.remove_player(player_id);
    }
}
