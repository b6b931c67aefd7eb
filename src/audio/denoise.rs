//! Local-variance Wiener filter.
//!
//! For every sample the mean and variance of a centred window (15 samples by
//! default, zero-padded at the edges) are computed.  The noise power is the
//! average of all local variances, and each sample is pulled towards its local
//! mean in proportion to how much of the local variance the noise explains:
//!
//! ```text
//! y = μ                          if σ² < noise
//! y = μ + (1 - noise / σ²)(x - μ) otherwise
//! ```
//!
//! A window with zero variance yields `μ` rather than NaN.

use crate::config::DenoiseConfig;

use super::Waveform;

#[derive(Debug, Clone, Copy)]
pub struct WienerDenoiser {
    window: usize,
}

impl Default for WienerDenoiser {
    fn default() -> Self {
        Self::new(DenoiseConfig::default().window)
    }
}

impl WienerDenoiser {
    /// Even window sizes are bumped to the next odd size so the window stays
    /// centred.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window: if window % 2 == 0 { window + 1 } else { window },
        }
    }

    pub fn from_config(config: &DenoiseConfig) -> Self {
        Self::new(config.window)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Denoise `waveform`; the result has the same length and sample rate.
    pub fn denoise(&self, waveform: &Waveform) -> Waveform {
        Waveform::new(self.filter(waveform.samples()), waveform.sample_rate())
    }

    pub fn filter(&self, samples: &[f32]) -> Vec<f32> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        // Prefix sums of x and x² with one leading zero.
        let mut sum = Vec::with_capacity(n + 1);
        let mut sum_sq = Vec::with_capacity(n + 1);
        sum.push(0.0_f64);
        sum_sq.push(0.0_f64);
        for &s in samples {
            let x = if s.is_finite() { s as f64 } else { 0.0 };
            sum.push(sum[sum.len() - 1] + x);
            sum_sq.push(sum_sq[sum_sq.len() - 1] + x * x);
        }

        let half = self.window / 2;
        let size = self.window as f64;
        let mut means = Vec::with_capacity(n);
        let mut variances = Vec::with_capacity(n);
        for i in 0..n {
            // Out-of-range neighbours are zeros: they add nothing to the sums
            // but still count in the window size.
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let mean = (sum[hi] - sum[lo]) / size;
            let mean_sq = (sum_sq[hi] - sum_sq[lo]) / size;
            means.push(mean);
            variances.push((mean_sq - mean * mean).max(0.0));
        }

        let noise = variances.iter().sum::<f64>() / n as f64;

        samples
            .iter()
            .zip(means.iter().zip(variances.iter()))
            .map(|(&s, (&mean, &var))| {
                let x = if s.is_finite() { s as f64 } else { 0.0 };
                let y = if var < noise || var <= 0.0 {
                    mean
                } else {
                    mean + (1.0 - noise / var) * (x - mean)
                };
                y as f32
            })
            .collect()
    }
}
