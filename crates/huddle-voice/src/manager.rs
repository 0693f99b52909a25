//! The VoIP manager: talking-state edges and the per-packet audio
//! pipeline.
//!
//! ```text
//! AudioPacket ──→ checks ──→ noise gate ──→ auto gain ──→ bookkeeping
//!                                                             │
//!                     per listener: attenuate + pan ──→ AudioBroadcast (unreliable)
//! ```

use std::sync::Arc;

use huddle_protocol::{
    AudioBroadcast, AudioPacket, Channel, MessageType, PlayerId, RoomId, VoiceActivityMessage,
};
use huddle_room::Lobby;
use tokio::sync::broadcast;

use crate::{ChannelRegistry, PlayerVoiceState, VoiceChannel, VoiceError, dsp, spatial};

/// Talking-state edges for in-process observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    StartedTalking { player_id: PlayerId, room_id: RoomId },
    StoppedTalking { player_id: PlayerId, room_id: RoomId },
}

/// Why a packet went nowhere.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("sender is muted")]
    SenderMuted,
    #[error("room has no voice channel")]
    NoVoiceChannel,
    #[error("unknown sender")]
    UnknownSender,
    #[error("unknown room")]
    UnknownRoom,
    #[error("sender is not in the room")]
    NotInRoom,
    #[error("malformed audio: {0}")]
    Malformed(#[from] VoiceError),
}

/// Outcome of [`VoipManager::process_audio_packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketDisposition {
    /// Handed to this many listeners.
    Delivered(usize),
    Dropped(DropReason),
}

/// Runs voice for every room of one [`Lobby`].
///
/// Holds the lobby for membership, positions and sending; the lobby only
/// knows the [`ChannelRegistry`] through its provisioner capability, so
/// there is no reference cycle.
pub struct VoipManager {
    registry: Arc<ChannelRegistry>,
    lobby: Arc<Lobby>,
}

impl VoipManager {
    pub fn new(registry: Arc<ChannelRegistry>, lobby: Arc<Lobby>) -> Self {
        Self { registry, lobby }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.registry.subscribe()
    }

    // =====================================================================
    // Channels / state (registry passthrough)
    // =====================================================================

    pub fn create_voice_channel(&self, room_id: RoomId) -> Arc<VoiceChannel> {
        self.registry.create_voice_channel(room_id)
    }

    pub fn destroy_voice_channel(&self, room_id: RoomId) -> bool {
        self.registry.destroy_voice_channel(room_id)
    }

    pub fn get_voice_channel(&self, room_id: RoomId) -> Option<Arc<VoiceChannel>> {
        self.registry.get_voice_channel(room_id)
    }

    pub fn get_or_create_voice_state(&self, player_id: &PlayerId) -> PlayerVoiceState {
        self.registry.get_or_create_voice_state(player_id)
    }

    /// Muting a talking player tells its room it stopped.
    pub fn set_player_muted(&self, player_id: &PlayerId, muted: bool) {
        if let Some(room_id) = self.registry.set_player_muted(player_id, muted) {
            self.announce_talking(player_id, room_id, false);
        }
    }

    pub fn set_player_deafened(&self, player_id: &PlayerId, deafened: bool) {
        self.registry.set_player_deafened(player_id, deafened);
    }

    pub fn set_player_volume(&self, player_id: &PlayerId, input: f32, output: f32) {
        self.registry.set_player_volume(player_id, input, output);
    }

    pub fn record_latency(&self, player_id: &PlayerId, latency_ms: u32) {
        self.registry.record_latency(player_id, latency_ms);
    }

    /// Drops the player's voice state, first ending any speech its room
    /// still thinks is going on.
    pub fn remove_player(&self, player_id: &PlayerId) -> bool {
        let talking_in = self
            .registry
            .voice_state(player_id)
            .and_then(|s| s.talking_in());
        if let Some(room_id) = talking_in {
            self.set_player_talking(player_id, room_id, false);
        }
        self.registry.remove_player(player_id)
    }

    // =====================================================================
    // Talking state
    // =====================================================================

    /// Sets whether the player talks in `room_id`. Only a real flip
    /// notifies: the other room members get `PlayerStartedTalking` /
    /// `PlayerStoppedTalking` and a [`VoiceEvent`] is published. A player
    /// still flagged in another room is stopped there first. Returns
    /// `true` if anything flipped.
    pub fn set_player_talking(&self, player_id: &PlayerId, room_id: RoomId, talking: bool) -> bool {
        let edge = self.registry.set_talking(player_id, room_id, talking);
        if let Some(stopped) = edge.stopped_in {
            self.announce_talking(player_id, stopped, false);
        }
        if let Some(started) = edge.started_in {
            self.announce_talking(player_id, started, true);
        }
        !edge.is_empty()
    }

    fn announce_talking(&self, player_id: &PlayerId, room_id: RoomId, talking: bool) {
        let message_type = if talking {
            MessageType::PlayerStartedTalking
        } else {
            MessageType::PlayerStoppedTalking
        };
        let message = VoiceActivityMessage {
            player_id: player_id.clone(),
            room_id,
            is_talking: talking,
        };
        self.lobby
            .broadcast_to_room(room_id, message_type, &message, Some(player_id));
        tracing::debug!(%player_id, %room_id, talking, "talking state changed");
    }

    // =====================================================================
    // Audio pipeline
    // =====================================================================

    /// Cleans up one inbound packet and relays a positional copy to every
    /// other member who isn't deafened.
    ///
    /// Never fails: anything wrong with the packet or its context turns
    /// into [`PacketDisposition::Dropped`], logged at debug.
    pub fn process_audio_packet(
        &self,
        sender: &PlayerId,
        room_id: RoomId,
        packet: AudioPacket,
    ) -> PacketDisposition {
        match self.relay(sender, room_id, packet) {
            Ok(delivered) => PacketDisposition::Delivered(delivered),
            Err(reason) => {
                tracing::debug!(%sender, %room_id, %reason, "audio packet dropped");
                PacketDisposition::Dropped(reason)
            }
        }
    }

    fn relay(
        &self,
        sender: &PlayerId,
        room_id: RoomId,
        packet: AudioPacket,
    ) -> Result<usize, DropReason> {
        let player = self.lobby.get_player(sender).ok_or(DropReason::UnknownSender)?;
        if self.registry.is_muted(sender) {
            return Err(DropReason::SenderMuted);
        }
        let channel = self
            .registry
            .get_voice_channel(room_id)
            .ok_or(DropReason::NoVoiceChannel)?;
        let room = self.lobby.get_room(room_id).ok_or(DropReason::UnknownRoom)?;
        if !room.contains(sender) {
            return Err(DropReason::NotInRoom);
        }
        if packet.audio_bytes.is_empty() {
            return Err(VoiceError::EmptyPayload.into());
        }
        // Only raw 16-bit PCM is transformed; other codecs are relayed
        // with the client's own volume figure.
        let pcm = if spatial::is_pcm16(&packet) {
            Some(dsp::decode_pcm16(&packet.audio_bytes)?)
        } else {
            None
        };

        let config = channel.config();
        let input_volume = self.registry.update_state(sender, |s| {
            s.record_sequence(packet.sequence_number);
            s.input_volume
        });

        let (audio_bytes, volume) = match pcm {
            Some(mut samples) => {
                let measured = dsp::average_volume(&packet.audio_bytes);
                if config.enable_noise_reduction {
                    dsp::noise_gate(&mut samples, config.noise_gate_threshold);
                }
                if config.enable_auto_gain {
                    dsp::auto_gain(&mut samples);
                }
                let bytes = dsp::encode_pcm16(&samples);
                channel.buffer_for_mix(sender, samples);
                (bytes, measured * input_volume)
            }
            None => (packet.audio_bytes, packet.volume * input_volume),
        };

        let sanitized = AudioPacket {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            audio_bytes,
            sample_rate: packet.sample_rate,
            channels: packet.channels,
            bits_per_sample: packet.bits_per_sample,
            timestamp: packet.timestamp,
            position: player.transform.position,
            volume,
            codec: packet.codec,
            sequence_number: packet.sequence_number,
            is_end_of_speech: packet.is_end_of_speech,
        };

        channel.record_speech(sender);
        if !packet.is_end_of_speech {
            self.set_player_talking(sender, room_id, true);
        }

        let server_timestamp = self.lobby.clock().now_ms();
        let mut delivered = 0;
        for listener in room.player_ids() {
            if listener == *sender || self.registry.is_deafened(&listener) {
                continue;
            }
            let Some(position) = self.lobby.players().position(&listener) else {
                continue;
            };
            let output_volume = self
                .registry
                .voice_state(&listener)
                .map_or(1.0, |s| s.output_volume);

            let (audio_packet, placement) =
                spatial::place_for_listener(&sanitized, position, config);
            let broadcast = AudioBroadcast {
                audio_packet,
                room_id,
                server_timestamp,
                distance_from_listener: placement.distance,
                volume_multiplier: placement.attenuation * output_volume,
            };
            if self.lobby.send_to_player(
                &listener,
                MessageType::AudioBroadcast,
                &broadcast,
                Channel::Unreliable,
            ) {
                delivered += 1;
            }
        }

        if sanitized.is_end_of_speech {
            self.set_player_talking(sender, room_id, false);
        }
        Ok(delivered)
    }

    /// Mixes the frames buffered in a mixing channel since the last call.
    pub fn take_mix(&self, room_id: RoomId) -> Result<Option<Vec<i16>>, VoiceError> {
        let channel = self
            .registry
            .get_voice_channel(room_id)
            .ok_or(VoiceError::ChannelNotFound(room_id))?;
        Ok(channel.take_mix())
    }
}
