//! Voice channel configuration.

use huddle_protocol::AudioCodec;
use serde::{Deserialize, Serialize};

use crate::VoiceError;

/// How a client decides when to transmit.
///
/// The server only stores this for clients to read; talking state changes
/// on explicit requests and end-of-speech packets whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VoiceActivation {
    #[default]
    VoiceActivity,
    PushToTalk,
    AlwaysOn,
}

/// Audio format and processing switches shared by every voice channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// The format clients are asked to capture in. Advisory: the pipeline
    /// goes by each packet's own codec tag.
    pub codec: AudioCodec,
    pub activation: VoiceActivation,

    /// Full volume at or inside this distance.
    pub min_distance: f32,
    /// Silent at or beyond this distance.
    pub max_distance: f32,

    /// Stereo panning from the sender's bearing.
    pub enable_3d_audio: bool,

    pub enable_noise_reduction: bool,
    /// Normalized amplitude under which a sample is zeroed.
    pub noise_gate_threshold: f32,

    pub enable_auto_gain: bool,

    /// New channels keep a mix buffer of the latest frame per speaker.
    pub enable_mixing: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
            bits_per_sample: 16,
            codec: AudioCodec::default(),
            activation: VoiceActivation::VoiceActivity,
            min_distance: 1.0,
            max_distance: 50.0,
            enable_3d_audio: true,
            enable_noise_reduction: true,
            noise_gate_threshold: 0.02,
            enable_auto_gain: true,
            enable_mixing: false,
        }
    }
}

impl VoiceConfig {
    /// Rejects settings the pipeline can't work with.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.min_distance.is_nan() || self.min_distance < 0.0 {
            return Err(VoiceError::InvalidConfig(format!(
                "min_distance must be >= 0, got {}",
                self.min_distance
            )));
        }
        if self.max_distance.is_nan() || self.max_distance <= self.min_distance {
            return Err(VoiceError::InvalidConfig(format!(
                "max_distance ({}) must exceed min_distance ({})",
                self.max_distance, self.min_distance
            )));
        }
        if !(0.0..1.0).contains(&self.noise_gate_threshold) {
            return Err(VoiceError::InvalidConfig(format!(
                "noise_gate_threshold must be in [0, 1), got {}",
                self.noise_gate_threshold
            )));
        }
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(VoiceError::InvalidConfig(
                "sample_rate and channels must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
