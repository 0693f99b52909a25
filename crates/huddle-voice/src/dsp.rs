//! 16-bit PCM helpers: decode/encode, noise gate, auto gain, level
//! metering and mixing.
//!
//! Samples are little-endian signed 16-bit. "Normalized" means
//! `sample / 32768`, so full scale is `[-1, 1)`.

use byteorder::{ByteOrder, LittleEndian};

use crate::VoiceError;

/// Divisor mapping an `i16` to a normalized amplitude.
pub const I16_SCALE: f32 = 32768.0;

/// Auto gain leaves packets whose peak is at or below this alone.
pub const AUTO_GAIN_FLOOR: f32 = 0.1;
/// Peak level auto gain aims for.
pub const AUTO_GAIN_TARGET: f32 = 0.8;
/// Largest boost auto gain applies.
pub const AUTO_GAIN_MAX: f32 = 2.0;

#[inline]
pub fn normalize(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Clamps a normalized amplitude to [-1, 1] and converts it back to an
/// `i16`, saturating at the type's bounds.
#[inline]
pub fn quantize(amplitude: f32) -> i16 {
    let scaled = amplitude.clamp(-1.0, 1.0) * I16_SCALE;
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Decodes little-endian 16-bit samples.
///
/// # Errors
/// - [`VoiceError::EmptyPayload`] for no bytes at all.
/// - [`VoiceError::TruncatedSample`] for an odd byte count.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<i16>, VoiceError> {
    if bytes.is_empty() {
        return Err(VoiceError::EmptyPayload);
    }
    if bytes.len() % 2 != 0 {
        return Err(VoiceError::TruncatedSample(bytes.len()));
    }
    let mut samples = vec![0i16; bytes.len() / 2];
    LittleEndian::read_i16_into(bytes, &mut samples);
    Ok(samples)
}

pub fn encode_pcm16(samples: &[i16]) -> Vec<u8> {
    let mut bytes = vec![0u8; samples.len() * 2];
    LittleEndian::write_i16_into(samples, &mut bytes);
    bytes
}

/// Zeroes every sample quieter than `threshold` (normalized). Returns how
/// many samples were silenced.
pub fn noise_gate(samples: &mut [i16], threshold: f32) -> usize {
    let mut gated = 0;
    for sample in samples.iter_mut() {
        if *sample != 0 && normalize(*sample).abs() < threshold {
            *sample = 0;
            gated += 1;
        }
    }
    gated
}

/// Largest normalized absolute amplitude; 0 for no samples.
pub fn peak_amplitude(samples: &[i16]) -> f32 {
    samples
        .iter()
        .map(|s| normalize(*s).abs())
        .fold(0.0, f32::max)
}

/// Scales the packet towards [`AUTO_GAIN_TARGET`] peak.
///
/// Returns the gain applied, or `None` if the peak was at or below
/// [`AUTO_GAIN_FLOOR`] and nothing changed.
pub fn auto_gain(samples: &mut [i16]) -> Option<f32> {
    let peak = peak_amplitude(samples);
    if peak <= AUTO_GAIN_FLOOR {
        return None;
    }
    let gain = (AUTO_GAIN_TARGET / peak).min(AUTO_GAIN_MAX);
    for sample in samples.iter_mut() {
        *sample = quantize(normalize(*sample) * gain);
    }
    Some(gain)
}

/// Mean normalized absolute amplitude of a raw 16-bit payload. A trailing
/// odd byte is ignored; an empty payload measures 0.
pub fn average_volume(bytes: &[u8]) -> f32 {
    let mut total = 0.0f32;
    let mut count = 0usize;
    for chunk in bytes.chunks_exact(2) {
        total += normalize(LittleEndian::read_i16(chunk)).abs();
        count += 1;
    }
    if count == 0 { 0.0 } else { total / count as f32 }
}

/// Sums several streams sample by sample, saturating at the `i16` bounds.
/// The result is as long as the longest stream; shorter ones count as
/// silence past their end.
pub fn mix(streams: &[&[i16]]) -> Vec<i16> {
    let len = streams.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![0i16; len];
    for stream in streams {
        for (acc, sample) in out.iter_mut().zip(stream.iter()) {
            *acc = acc.saturating_add(*sample);
        }
    }
    out
}
