//! Objective quality measurements for an ingested waveform.
//!
//! | Measure | Definition |
//! |---------|------------|
//! | Duration | `sample_count / target_rate` |
//! | SNR | loudest-decile vs quietest-decile mean frame power, in dB |
//!
//! The SNR estimator runs a centred STFT (2048 / 512 by default), takes each
//! frame's mean power `mean(|X|²)`, sorts the frames, and compares the mean
//! of the top 10 % with the mean of the bottom 10 % (plus `1e-10`).  It
//! assumes the loudest frames are dominated by speech and the quietest by the
//! noise floor.  At least one frame is always taken on each side.
//!
//! [`QualityScorer`] is the seam the gate calls through, so tests can count
//! how often each measure is computed.

use crate::config::GateConfig;
use crate::dsp::Stft;

use super::Waveform;

/// Added to the noise power so the ratio and logarithm stay finite.
pub const NOISE_FLOOR_EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// QualityMetrics
// ---------------------------------------------------------------------------

/// Measurements behind one gate decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    pub duration_secs: f32,
    pub snr_db: f32,
}

// ---------------------------------------------------------------------------
// QualityScorer trait
// ---------------------------------------------------------------------------

/// Computes the gate's measurements.
///
/// Object-safe and `Send + Sync` so a pipeline can hold an
/// `Arc<dyn QualityScorer>` shared across worker threads.
pub trait QualityScorer: Send + Sync {
    /// Duration in seconds.
    fn duration_secs(&self, waveform: &Waveform) -> f32;

    /// Estimated signal-to-noise ratio in dB.
    fn snr_db(&self, waveform: &Waveform) -> f32;
}

// ---------------------------------------------------------------------------
// SpectralScorer
// ---------------------------------------------------------------------------

/// Production scorer using the decile SNR estimator.
#[derive(Debug, Clone)]
pub struct SpectralScorer {
    target_sample_rate: u32,
    stft: Stft,
    decile: f32,
}

impl SpectralScorer {
    pub fn new(target_sample_rate: u32, config: &GateConfig) -> Self {
        Self {
            target_sample_rate,
            stft: Stft::new(config.snr_n_fft, config.snr_hop_length),
            decile: config.snr_decile.clamp(0.0, 1.0),
        }
    }

    /// Mean power of every STFT frame, in frame order.
    pub fn frame_powers(&self, waveform: &Waveform) -> Vec<f64> {
        let mut powers = Vec::with_capacity(self.stft.frame_count(waveform.len()));
        self.stft.for_each_power_frame(waveform.samples(), |_, power| {
            let sum: f64 = power.iter().map(|&p| p as f64).sum();
            powers.push(sum / power.len().max(1) as f64);
        });
        powers
    }
}

impl QualityScorer for SpectralScorer {
    fn duration_secs(&self, waveform: &Waveform) -> f32 {
        if self.target_sample_rate == 0 {
            return 0.0;
        }
        waveform.len() as f32 / self.target_sample_rate as f32
    }

    fn snr_db(&self, waveform: &Waveform) -> f32 {
        let mut powers = self.frame_powers(waveform);
        decile_snr_db(&mut powers, self.decile)
    }
}

/// `10·log10(mean(top k) / (mean(bottom k) + ε))` with
/// `k = max(1, floor(decile · n))`.
///
/// Sorts `powers` in place.  An all-zero input yields `-inf`.
pub fn decile_snr_db(powers: &mut [f64], decile: f32) -> f32 {
    if powers.is_empty() {
        return f32::NEG_INFINITY;
    }
    powers.sort_by(|a, b| a.total_cmp(b));

    let n = powers.len();
    let k = ((n as f64 * decile as f64).floor() as usize).clamp(1, n);

    let mean = |slice: &[f64]| slice.iter().sum::<f64>() / slice.len() as f64;
    let signal = mean(&powers[n - k..]);
    let noise = mean(&powers[..k]) + NOISE_FLOOR_EPSILON;

    (10.0 * (signal / noise).log10()) as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{clean_take, noise, tone, RATE};

    fn scorer() -> SpectralScorer {
        SpectralScorer::new(RATE, &GateConfig::default())
    }

    #[test]
    fn duration_uses_target_rate() {
        let wf = Waveform::new(vec![0.0; 24_000], RATE);
        assert!((scorer().duration_secs(&wf) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn speech_over_quiet_floor_scores_about_twenty_db() {
        let wf = Waveform::new(clean_take(2.0, RATE), RATE);
        let snr = scorer().snr_db(&wf);
        assert!(snr > 15.0 && snr < 30.0, "snr {snr}");
    }

    #[test]
    fn pure_noise_scores_near_zero_db() {
        let wf = Waveform::new(noise(3.0, RATE, 0.3, 11), RATE);
        let snr = scorer().snr_db(&wf);
        assert!(snr < 5.0, "snr {snr}");
    }

    #[test]
    fn short_input_still_uses_one_frame_per_side() {
        // 4 frames: 10 % rounds down to zero, so k is clamped to 1.
        let wf = Waveform::new(tone(440.0, 0.1, RATE, 0.5), RATE);
        let snr = scorer().snr_db(&wf);
        assert!(snr.is_finite(), "snr {snr}");
        assert!(snr >= 0.0);
    }

    #[test]
    fn decile_slice_sizes() {
        let mut powers: Vec<f64> = (1..=20).map(|p| p as f64).collect();
        // top 2 = {19, 20}, bottom 2 = {1, 2}
        let snr = decile_snr_db(&mut powers, 0.1);
        let expected = 10.0 * (19.5 / (1.5 + NOISE_FLOOR_EPSILON)).log10();
        assert!((snr as f64 - expected).abs() < 1e-4);
    }

    #[test]
    fn silence_is_negative_infinity() {
        let mut powers = vec![0.0; 12];
        assert_eq!(decile_snr_db(&mut powers, 0.1), f32::NEG_INFINITY);
    }

    #[test]
    fn frame_powers_count_matches_stft() {
        let wf = Waveform::new(vec![0.1; 5_120], RATE);
        assert_eq!(scorer().frame_powers(&wf).len(), 11);
    }
}
