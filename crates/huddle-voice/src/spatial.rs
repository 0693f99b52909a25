//! Positional audio: distance attenuation and stereo panning.

use huddle_protocol::{AudioCodec, AudioPacket, Vec3};

use crate::{VoiceConfig, dsp};

/// Linear falloff between `min_distance` (1.0) and `max_distance` (0.0).
pub fn distance_attenuation(distance: f32, min_distance: f32, max_distance: f32) -> f32 {
    if distance <= min_distance {
        1.0
    } else if distance >= max_distance {
        0.0
    } else {
        (1.0 - (distance - min_distance) / (max_distance - min_distance)).clamp(0.0, 1.0)
    }
}

/// Sine of the source's bearing around the listener's vertical axis:
/// -1 hard left, 0 straight ahead or behind, +1 hard right.
pub fn pan_value(source: Vec3, listener: Vec3) -> f32 {
    (source.x - listener.x).atan2(source.z - listener.z).sin()
}

/// `(left, right)` gains for a pan value; each lies in [0.5, 1.5].
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan) / 2.0 + 0.5, (1.0 + pan) / 2.0 + 0.5)
}

/// Applies pan gains to interleaved samples: channel 0 takes the left
/// gain, channel 1 the right. Further channels are untouched. Results
/// saturate at the `i16` bounds.
pub fn apply_stereo_pan(samples: &mut [i16], channels: u16, pan: f32) {
    if channels < 2 {
        return;
    }
    let (left, right) = pan_gains(pan);
    for frame in samples.chunks_mut(channels as usize) {
        if let [l, r, ..] = frame {
            *l = scale(*l, left);
            *r = scale(*r, right);
        }
    }
}

fn scale(sample: i16, gain: f32) -> i16 {
    (sample as f32 * gain)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// How a packet was shaped for one listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub distance: f32,
    pub attenuation: f32,
    /// Set when stereo panning was applied.
    pub pan: Option<f32>,
}

/// Builds a listener's copy of `packet`: volume scaled by distance and,
/// for multi-channel PCM with 3D audio on, samples panned by bearing.
pub fn place_for_listener(
    packet: &AudioPacket,
    listener: Vec3,
    config: &VoiceConfig,
) -> (AudioPacket, Placement) {
    let distance = packet.position.distance(listener);
    let attenuation = distance_attenuation(distance, config.min_distance, config.max_distance);

    let mut placed = packet.clone();
    placed.volume = packet.volume * attenuation;

    let mut pan = None;
    if config.enable_3d_audio && is_pcm16(packet) && packet.channels > 1 {
        if let Ok(mut samples) = dsp::decode_pcm16(&packet.audio_bytes) {
            let value = pan_value(packet.position, listener);
            apply_stereo_pan(&mut samples, packet.channels, value);
            placed.audio_bytes = dsp::encode_pcm16(&samples);
            pan = Some(value);
        }
    }

    (
        placed,
        Placement {
            distance,
            attenuation,
            pan,
        },
    )
}

/// Raw 16-bit PCM, the only format the server transforms.
pub fn is_pcm16(packet: &AudioPacket) -> bool {
    packet.codec == AudioCodec::Pcm && packet.bits_per_sample == 16
}

#[cfg(test)]
mod tests {
    use huddle_protocol::PlayerId;

    use super::*;

    fn packet(channels: u16, samples: &[i16], position: Vec3) -> AudioPacket {
        AudioPacket {
            player_id: PlayerId::new("s"),
            player_name: "S".into(),
            audio_bytes: dsp::encode_pcm16(samples),
            sample_rate: 48_000,
            channels,
            bits_per_sample: 16,
            timestamp: 0,
            position,
            volume: 1.0,
            codec: AudioCodec::Pcm,
            sequence_number: 0,
            is_end_of_speech: false,
        }
    }

    // =====================================================================
    // Attenuation
    // =====================================================================

    #[test]
    fn test_attenuation_boundaries_are_exact() {
        assert_eq!(distance_attenuation(1.0, 1.0, 50.0), 1.0);
        assert_eq!(distance_attenuation(0.0, 1.0, 50.0), 1.0);
        assert_eq!(distance_attenuation(50.0, 1.0, 50.0), 0.0);
        assert_eq!(distance_attenuation(500.0, 1.0, 50.0), 0.0);
    }

    #[test]
    fn test_attenuation_strictly_decreases_between_bounds() {
        let samples: Vec<f32> = (11..50)
            .map(|d| distance_attenuation(d as f32, 1.0, 50.0))
            .collect();
        assert!(samples.windows(2).all(|w| w[0] > w[1]));
        assert!(samples.iter().all(|a| *a > 0.0 && *a < 1.0));
    }

    #[test]
    fn test_attenuation_at_ten_units() {
        let a = distance_attenuation(10.0, 1.0, 50.0);
        assert!((a - (1.0 - 9.0 / 49.0)).abs() < 1e-6);
        assert!((a - 0.816).abs() < 1e-3);
    }

    // =====================================================================
    // Panning
    // =====================================================================

    #[test]
    fn test_pan_value_by_bearing() {
        let listener = Vec3::ZERO;
        assert!((pan_value(Vec3::new(5.0, 0.0, 0.0), listener) - 1.0).abs() < 1e-6);
        assert!((pan_value(Vec3::new(-5.0, 0.0, 0.0), listener) + 1.0).abs() < 1e-6);
        assert!(pan_value(Vec3::new(0.0, 0.0, 5.0), listener).abs() < 1e-6);
    }

    #[test]
    fn test_pan_gains_range() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(1.0), (0.5, 1.5));
        assert_eq!(pan_gains(-1.0), (1.5, 0.5));
    }

    #[test]
    fn test_stereo_pan_saturates_instead_of_wrapping() {
        let mut samples = vec![30_000, 30_000, -30_000, -30_000];

        apply_stereo_pan(&mut samples, 2, 1.0);

        assert_eq!(samples, vec![15_000, i16::MAX, -15_000, i16::MIN]);
    }

    #[test]
    fn test_mono_is_not_panned() {
        let mut samples = vec![1_000, 2_000];
        apply_stereo_pan(&mut samples, 1, 1.0);
        assert_eq!(samples, vec![1_000, 2_000]);
    }

    // =====================================================================
    // Per-listener placement
    // =====================================================================

    #[test]
    fn test_place_scales_volume_by_distance() {
        let source = packet(1, &[1_000, 1_000], Vec3::ZERO);

        let (placed, placement) =
            place_for_listener(&source, Vec3::new(0.0, 0.0, 10.0), &VoiceConfig::default());

        assert!((placement.distance - 10.0).abs() < 1e-6);
        assert!((placed.volume - placement.attenuation).abs() < 1e-6);
        assert_eq!(placement.pan, None, "mono");
        assert_eq!(placed.audio_bytes, source.audio_bytes);
    }

    #[test]
    fn test_place_pans_stereo_pcm() {
        let source = packet(2, &[1_000, 1_000], Vec3::new(3.0, 0.0, 0.0));

        let (placed, placement) =
            place_for_listener(&source, Vec3::ZERO, &VoiceConfig::default());

        assert!((placement.pan.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(dsp::decode_pcm16(&placed.audio_bytes).unwrap(), vec![500, 1_500]);
    }

    #[test]
    fn test_place_leaves_opus_bytes_alone() {
        let mut source = packet(2, &[1_000, 1_000], Vec3::new(3.0, 0.0, 0.0));
        source.codec = AudioCodec::Opus;

        let (placed, placement) =
            place_for_listener(&source, Vec3::ZERO, &VoiceConfig::default());

        assert_eq!(placement.pan, None);
        assert_eq!(placed.audio_bytes, source.audio_bytes);
    }
}
