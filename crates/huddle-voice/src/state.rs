//! Per-player voice state: mute/deafen, talking edge, volumes and link
//! quality.

use std::time::Instant;

use huddle_protocol::{PlayerId, RoomId};
use serde::Serialize;

/// Volumes are clamped into `[0, MAX_VOLUME]`.
pub const MAX_VOLUME: f32 = 2.0;

/// Sequence gaps wider than this are treated as a late packet from before
/// the current sequence rather than a burst of loss.
const REORDER_WINDOW: u32 = 1 << 15;

/// Link quality estimated from the audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceQuality {
    /// `1 - packet_loss`.
    pub signal_quality: f32,
    /// Fraction of expected packets that never arrived.
    pub packet_loss: f32,
    /// Smoothed round-trip estimate reported by the transport.
    pub latency_ms: u32,
}

impl Default for VoiceQuality {
    fn default() -> Self {
        Self {
            signal_quality: 1.0,
            packet_loss: 0.0,
            latency_ms: 0,
        }
    }
}

/// The notifications one talking write calls for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TalkingEdge {
    /// The player was talking here and no longer is.
    pub stopped_in: Option<RoomId>,
    /// The player started talking here.
    pub started_in: Option<RoomId>,
}

impl TalkingEdge {
    pub fn is_empty(&self) -> bool {
        self.stopped_in.is_none() && self.started_in.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PlayerVoiceState {
    pub player_id: PlayerId,
    pub is_muted: bool,
    pub is_deafened: bool,
    /// The room the player is currently talking in.
    talking_in: Option<RoomId>,
    pub input_volume: f32,
    pub output_volume: f32,
    pub quality: VoiceQuality,
    last_sequence: Option<u32>,
    received: u64,
    lost: u64,
    pub updated_at: Instant,
}

impl PlayerVoiceState {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            is_muted: false,
            is_deafened: false,
            talking_in: None,
            input_volume: 1.0,
            output_volume: 1.0,
            quality: VoiceQuality::default(),
            last_sequence: None,
            received: 0,
            lost: 0,
            updated_at: Instant::now(),
        }
    }

    pub fn is_talking(&self) -> bool {
        self.talking_in.is_some()
    }

    pub fn talking_in(&self) -> Option<RoomId> {
        self.talking_in
    }

    pub fn touch(&mut self) {
        self.updated_at = Instant::now();
    }

    /// Records whether the player talks in `room_id`. The returned edge is
    /// empty unless something flipped; the timestamp refreshes either way.
    ///
    /// Starting in one room while still flagged in another stops the old
    /// one first. Stopping only counts for the room the player talks in,
    /// and a muted player never starts.
    pub fn set_talking(&mut self, room_id: RoomId, talking: bool) -> TalkingEdge {
        self.touch();
        let mut edge = TalkingEdge::default();
        if talking {
            if self.is_muted || self.talking_in == Some(room_id) {
                return edge;
            }
            edge.stopped_in = self.talking_in.replace(room_id);
            edge.started_in = Some(room_id);
        } else if self.talking_in == Some(room_id) {
            edge.stopped_in = self.talking_in.take();
        }
        edge
    }

    /// Clears the talking flag if it is set for `room_id`.
    pub fn stop_talking_in(&mut self, room_id: RoomId) -> bool {
        if self.talking_in != Some(room_id) {
            return false;
        }
        self.talking_in = None;
        self.touch();
        true
    }

    /// Sets the mute flag. Muting a talking player stops it; the room it
    /// was talking in is returned.
    pub fn set_muted(&mut self, muted: bool) -> Option<RoomId> {
        self.is_muted = muted;
        self.touch();
        if muted { self.talking_in.take() } else { None }
    }

    pub fn set_volume(&mut self, input: f32, output: f32) {
        self.input_volume = clamp_volume(input);
        self.output_volume = clamp_volume(output);
        self.touch();
    }

    /// Feeds one received sequence number into the loss estimate.
    pub fn record_sequence(&mut self, sequence: u32) {
        self.touch();
        let Some(last) = self.last_sequence else {
            self.last_sequence = Some(sequence);
            self.received = 1;
            self.refresh_quality();
            return;
        };

        let ahead = sequence.wrapping_sub(last);
        if ahead == 0 {
            // Duplicate.
            return;
        }
        if ahead < REORDER_WINDOW {
            self.lost += u64::from(ahead - 1);
            self.last_sequence = Some(sequence);
        } else {
            // Late arrival of a packet already counted as lost.
            self.lost = self.lost.saturating_sub(1);
        }
        self.received += 1;
        self.refresh_quality();
    }

    /// Blends a latency sample into the running estimate (1/8 weight). The
    /// first sample is taken as is.
    pub fn record_latency(&mut self, latency_ms: u32) {
        self.quality.latency_ms = if self.quality.latency_ms == 0 {
            latency_ms
        } else {
            ((u64::from(self.quality.latency_ms) * 7 + u64::from(latency_ms)) / 8) as u32
        };
        self.touch();
    }

    fn refresh_quality(&mut self) {
        let expected = self.received + self.lost;
        let loss = if expected == 0 {
            0.0
        } else {
            self.lost as f32 / expected as f32
        };
        self.quality.packet_loss = loss;
        self.quality.signal_quality = 1.0 - loss;
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        1.0
    } else {
        volume.clamp(0.0, MAX_VOLUME)
    }
}
