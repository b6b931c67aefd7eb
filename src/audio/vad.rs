//! Energy-based leading/trailing silence trimming.
//!
//! [`SilenceTrimmer`] removes the quiet head and tail of a denoised clip
//! before it is written.
//!
//! ## Algorithm
//!
//! The signal is split into centred frames (2048 samples, hop 512, zero
//! padded by half a frame on each end).  A frame is *voiced* when its mean
//! square energy is within `top_db` (20 dB) of the loudest frame:
//!
//! ```text
//! 10·log10(max(1e-10, mse)) - 10·log10(max(1e-10, max_mse)) > -top_db
//! ```
//!
//! The kept region runs from `first_voiced * hop` to
//! `min(len, (last_voiced + 1) * hop)`.
//!
//! When the loudest frame does not rise above the `1e-10` floor (an
//! all-zero or near-silent clip) nothing counts as voiced and the waveform
//! is returned unchanged.

use crate::config::TrimConfig;

use super::Waveform;

const AMIN: f64 = 1e-10;

// ---------------------------------------------------------------------------
// SilenceTrimmer
// ---------------------------------------------------------------------------

/// Trims silence relative to the clip's own peak frame energy.
///
/// # Example
///
/// ```rust
/// use speech_etl::audio::{SilenceTrimmer, Waveform};
///
/// let trimmer = SilenceTrimmer::new(20.0);
///
/// // 1 s of silence followed by 1 s of signal
/// let mut samples = vec![0.0_f32; 16_000];
/// samples.extend(vec![0.5_f32; 16_000]);
///
/// let trimmed = trimmer.trim(&Waveform::new(samples, 16_000));
/// assert!(trimmed.len() < 32_000);
/// assert!(trimmed.len() >= 16_000);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SilenceTrimmer {
    /// Threshold below the loudest frame, in dB.
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
}

impl Default for SilenceTrimmer {
    fn default() -> Self {
        Self::from_config(&TrimConfig::default())
    }
}

impl SilenceTrimmer {
    /// Trimmer with the default 2048 / 512 framing.
    pub fn new(top_db: f32) -> Self {
        let defaults = TrimConfig::default();
        Self::with_framing(top_db, defaults.frame_length, defaults.hop_length)
    }

    /// Zero frame or hop lengths are bumped to `1`.
    pub fn with_framing(top_db: f32, frame_length: usize, hop_length: usize) -> Self {
        Self {
            top_db,
            frame_length: frame_length.max(1),
            hop_length: hop_length.max(1),
        }
    }

    pub fn from_config(config: &TrimConfig) -> Self {
        Self::with_framing(config.top_db, config.frame_length, config.hop_length)
    }

    pub fn top_db(&self) -> f32 {
        self.top_db
    }

    /// Mean square energy of every centred frame.
    pub fn frame_energies(&self, samples: &[f32]) -> Vec<f64> {
        let mut prefix = Vec::with_capacity(samples.len() + 1);
        prefix.push(0.0_f64);
        for &s in samples {
            let x = if s.is_finite() { s as f64 } else { 0.0 };
            prefix.push(prefix[prefix.len() - 1] + x * x);
        }

        let half = self.frame_length / 2;
        let frames = 1 + samples.len() / self.hop_length;
        (0..frames)
            .map(|t| {
                // Window in unpadded coordinates is [t*hop - half, t*hop - half + frame).
                let start = (t * self.hop_length).saturating_sub(half).min(samples.len());
                let end = (t * self.hop_length + self.frame_length)
                    .saturating_sub(half)
                    .min(samples.len());
                (prefix[end] - prefix[start]) / self.frame_length as f64
            })
            .collect()
    }

    /// `[start, end)` sample range to keep, or `None` when nothing is voiced.
    pub fn trim_bounds(&self, samples: &[f32]) -> Option<(usize, usize)> {
        if samples.is_empty() {
            return None;
        }

        let energies = self.frame_energies(samples);
        let peak = energies.iter().copied().fold(0.0_f64, f64::max);
        // No frame rises above the amplitude floor: nothing is voiced.
        if peak <= AMIN {
            return None;
        }
        let ref_db = 10.0 * peak.max(AMIN).log10();
        let floor = -(self.top_db as f64);
        let is_voiced = |mse: f64| 10.0 * mse.max(AMIN).log10() - ref_db > floor;

        let first = energies.iter().position(|&e| is_voiced(e))?;
        let last = energies.iter().rposition(|&e| is_voiced(e)).unwrap_or(first);

        let start = (first * self.hop_length).min(samples.len());
        let end = ((last + 1) * self.hop_length).min(samples.len());
        Some((start, end.max(start)))
    }

    /// Trim leading and trailing silence.
    pub fn trim(&self, waveform: &Waveform) -> Waveform {
        match self.trim_bounds(waveform.samples()) {
            Some((start, end)) => {
                log::debug!(
                    "trimmed {} samples head, {} samples tail",
                    start,
                    waveform.len() - end
                );
                waveform.slice(start, end)
            }
            None => waveform.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
