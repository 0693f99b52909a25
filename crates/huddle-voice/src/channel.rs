//! The voice channel paired with one room.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use huddle_protocol::{PlayerId, RoomId};
use parking_lot::Mutex;

use crate::{VoiceConfig, dsp};

#[derive(Debug)]
struct Activity {
    last_activity: Instant,
    /// Last time each player's audio came through.
    last_speech: HashMap<PlayerId, Instant>,
    /// Players whose talking flag is currently set.
    speakers: HashSet<PlayerId>,
    mixing: bool,
    /// Latest processed frame per speaker, while mixing is on.
    mix_buffer: HashMap<PlayerId, Vec<i16>>,
}

/// Audio session state for a room. Shares the room's id and lives exactly
/// as long as the room does.
#[derive(Debug)]
pub struct VoiceChannel {
    room_id: RoomId,
    config: VoiceConfig,
    created_at: Instant,
    activity: Mutex<Activity>,
}

impl VoiceChannel {
    pub fn new(room_id: RoomId, config: VoiceConfig) -> Self {
        let now = Instant::now();
        let mixing = config.enable_mixing;
        Self {
            room_id,
            config,
            created_at: now,
            activity: Mutex::new(Activity {
                last_activity: now,
                last_speech: HashMap::new(),
                speakers: HashSet::new(),
                mixing,
                mix_buffer: HashMap::new(),
            }),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.activity.lock().last_activity
    }

    /// Stamps the sender's last-speech time.
    pub fn record_speech(&self, player_id: &PlayerId) {
        let now = Instant::now();
        let mut activity = self.activity.lock();
        activity.last_activity = now;
        activity.last_speech.insert(player_id.clone(), now);
    }

    pub fn last_speech(&self, player_id: &PlayerId) -> Option<Instant> {
        self.activity.lock().last_speech.get(player_id).copied()
    }

    pub(crate) fn speaker_started(&self, player_id: &PlayerId) {
        let mut activity = self.activity.lock();
        activity.last_activity = Instant::now();
        activity.speakers.insert(player_id.clone());
    }

    pub(crate) fn speaker_stopped(&self, player_id: &PlayerId) {
        let mut activity = self.activity.lock();
        activity.speakers.remove(player_id);
        activity.mix_buffer.remove(player_id);
    }

    pub fn active_speaker_count(&self) -> usize {
        self.activity.lock().speakers.len()
    }

    // -- Mixing -----------------------------------------------------------

    pub fn is_mixing(&self) -> bool {
        self.activity.lock().mixing
    }

    /// Turning mixing off drops whatever is buffered.
    pub fn set_mixing(&self, enabled: bool) {
        let mut activity = self.activity.lock();
        activity.mixing = enabled;
        if !enabled {
            activity.mix_buffer.clear();
        }
    }

    /// Keeps `samples` as the speaker's latest frame. Ignored while mixing
    /// is off.
    pub(crate) fn buffer_for_mix(&self, player_id: &PlayerId, samples: Vec<i16>) {
        let mut activity = self.activity.lock();
        if activity.mixing {
            activity.mix_buffer.insert(player_id.clone(), samples);
        }
    }

    /// Mixes and clears the buffered frames. `None` if nothing is buffered.
    pub fn take_mix(&self) -> Option<Vec<i16>> {
        let frames: Vec<Vec<i16>> = {
            let mut activity = self.activity.lock();
            if activity.mix_buffer.is_empty() {
                return None;
            }
            activity.mix_buffer.drain().map(|(_, frame)| frame).collect()
        };
        let streams: Vec<&[i16]> = frames.iter().map(Vec::as_slice).collect();
        Some(dsp::mix(&streams))
    }

    // -- Cleanup ----------------------------------------------------------

    /// Drops everything tracked for one player.
    pub(crate) fn forget_player(&self, player_id: &PlayerId) {
        let mut activity = self.activity.lock();
        activity.last_speech.remove(player_id);
        activity.speakers.remove(player_id);
        activity.mix_buffer.remove(player_id);
    }

    /// Clears all per-player tracking. Called when the channel is destroyed.
    pub(crate) fn clear(&self) {
        let mut activity = self.activity.lock();
        activity.last_speech.clear();
        activity.speakers.clear();
        activity.mix_buffer.clear();
    }
}
