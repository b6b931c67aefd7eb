//! Deterministic synthetic signals and fixture writers shared by unit tests.

use std::path::Path;

pub(crate) const RATE: u32 = 16_000;

/// Sine tone of `secs` seconds.
pub(crate) fn tone(freq: f32, secs: f32, rate: u32, amplitude: f32) -> Vec<f32> {
    let n = (secs * rate as f32).round() as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
        .collect()
}

/// Uniform noise in `[-amplitude, amplitude]` from a seeded xorshift.
pub(crate) fn noise(secs: f32, rate: u32, amplitude: f32, seed: u64) -> Vec<f32> {
    let n = (secs * rate as f32).round() as usize;
    let mut state = seed.max(1);
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            amplitude * (2.0 * unit as f32 - 1.0)
        })
        .collect()
}

pub(crate) fn silence(secs: f32, rate: u32) -> Vec<f32> {
    vec![0.0; (secs * rate as f32).round() as usize]
}

/// Sample-wise sum; the result has the length of the longer input.
pub(crate) fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| a.get(i).copied().unwrap_or(0.0) + b.get(i).copied().unwrap_or(0.0))
        .collect()
}

/// `secs` of speech-like audio at roughly 20 dB SNR: a noise-only lead-in and
/// tail of 0.25 s each around a tone, over a constant noise floor.
pub(crate) fn clean_take(secs: f32, rate: u32) -> Vec<f32> {
    let edge = 0.25;
    let mut voiced = silence(edge, rate);
    voiced.extend(tone(220.0, secs - 2.0 * edge, rate, 0.5));
    voiced.extend(silence(edge, rate));
    mix(&voiced, &noise(secs, rate, 0.05, 7))
}

/// Write interleaved samples as 16-bit PCM WAV.
pub(crate) fn write_wav(path: &Path, interleaved: &[f32], channels: u16, rate: u32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in interleaved {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}
