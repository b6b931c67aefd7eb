//! Channel mixing and sample-rate conversion.
//!
//! Ingestion normalises every source to **16 kHz mono `f32`** in two steps:
//!
//! 1. [`downmix_to_mono`]: average any number of interleaved channels.
//! 2. [`resample`]: band-limited sinc interpolation (rubato `SincFixedIn`,
//!    256 taps, BlackmanHarris2 window) to the target rate.
//!
//! The output is cut (or zero-padded) to
//! `round(len * target / source)` samples, so duration is preserved to
//! within one sample.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ResampleError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("sample rate must be non-zero (source {source_rate} Hz, target {target_rate} Hz)")]
    ZeroRate { source_rate: u32, target_rate: u32 },

    #[error("failed to build resampler: {0}")]
    Construction(String),

    #[error("resampling failed: {0}")]
    Process(String),
}

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; a trailing partial frame
/// is dropped.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use speech_etl::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Number of samples [`resample`] produces for `input_len` source samples.
pub fn expected_output_len(input_len: usize, source_rate: u32, target_rate: u32) -> usize {
    if source_rate == 0 {
        return 0;
    }
    (input_len as f64 * target_rate as f64 / source_rate as f64).round() as usize
}

/// Resample mono `samples` from `source_rate` to `target_rate`.
///
/// * Equal rates return a copy of the input.
/// * Empty input returns an empty vector.
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(ResampleError::ZeroRate {
            source_rate,
            target_rate,
        });
    }
    if source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let expected = expected_output_len(samples.len(), source_rate, target_rate);

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;

    // Single-pass: chunk size equals the whole input.
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| ResampleError::Construction(e.to_string()))?;

    let input: [&[f32]; 1] = [samples];
    let mut output = resampler
        .process(&input[..], None)
        .map_err(|e| ResampleError::Process(e.to_string()))?
        .swap_remove(0);

    // Flush the filter tail until the full output length is available.
    for _ in 0..4 {
        if output.len() >= expected {
            break;
        }
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| ResampleError::Process(e.to_string()))?;
        match tail.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => break,
        }
    }

    output.resize(expected, 0.0);
    let aligned = output;

    log::debug!(
        "resampled {} samples ({} Hz) -> {} samples ({} Hz)",
        samples.len(),
        source_rate,
        aligned.len(),
        target_rate
    );

    Ok(aligned)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- downmix_to_mono ---------------------------------------------------

    #[test]
    fn downmix_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_two_channel() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = downmix_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_drops_partial_frame() {
        let input = vec![0.4_f32; 7];
        let out = downmix_to_mono(&input, 2);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        let out = resample(&input, 16_000, 16_000).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], 48_000, 16_000).unwrap().is_empty());
    }

    #[test]
    fn resample_zero_rate_is_error() {
        let err = resample(&[0.0; 10], 0, 16_000).unwrap_err();
        assert!(matches!(err, ResampleError::ZeroRate { .. }));
    }

    #[test]
    fn resample_48k_to_16k_length() {
        let input = vec![0.0_f32; 48_000];
        let out = resample(&input, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn resample_44100_to_16k_length_within_one_sample() {
        let input = vec![0.0_f32; 66_150]; // 1.5 s
        let out = resample(&input, 44_100, 16_000).unwrap();
        assert!(
            out.len().abs_diff(24_000) <= 1,
            "expected ~24000, got {}",
            out.len()
        );
    }

    #[test]
    fn resample_upsample_8k_to_16k_length() {
        let input = vec![0.0_f32; 8_000];
        let out = resample(&input, 8_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn resample_preserves_dc_level_away_from_edges() {
        let input = vec![0.5_f32; 48_000];
        let out = resample(&input, 48_000, 16_000).unwrap();
        // Edges ring against the implicit zeros outside the signal.
        for &s in &out[1_000..15_000] {
            assert!((s - 0.5).abs() < 0.01, "amplitude drift: {s}");
        }
    }

    #[test]
    fn resample_keeps_tone_aligned() {
        // A 440 Hz tone should stay within about a sample of its original
        // phase.
        let src_rate = 44_100;
        let input: Vec<f32> = (0..src_rate)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / src_rate as f32).sin())
            .collect();
        let out = resample(&input, src_rate, 16_000).unwrap();
        let mut err = 0.0_f32;
        for i in 2_000..14_000 {
            let expected = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin();
            err = err.max((out[i] - expected).abs());
        }
        assert!(err < 0.2, "max deviation {err}");
    }

    #[test]
    fn resample_impulse_lands_at_scaled_position() {
        let mut input = vec![0.0_f32; 48_000];
        input[24_000] = 1.0;
        let out = resample(&input, 48_000, 16_000).unwrap();
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak.abs_diff(8_000) <= 1, "peak at {peak}");
    }
}
