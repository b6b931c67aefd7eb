//! Slaney-style mel filter bank.
//!
//! Triangular filters are placed at equal steps on the Slaney mel scale
//! (linear below 1 kHz, logarithmic above) and each triangle is scaled by
//! `2 / bandwidth_hz`.  Weights are stored sparsely as `(bin, weight)` pairs.

/// Projects a power spectrum onto `n_mels` bands.
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    n_bins: usize,
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelFilterBank {
    /// Build a bank for an `n_fft`-point spectrum at `sample_rate`.
    ///
    /// `f_max` is clamped to Nyquist and `f_min` to `[0, f_max]`.
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, f_min: f32, f_max: f32) -> Self {
        let n_bins = n_fft.max(1) / 2 + 1;
        let sr = sample_rate.max(1) as f64;
        let f_max = (f_max as f64).min(sr / 2.0).max(0.0);
        let f_min = (f_min as f64).clamp(0.0, f_max);

        let mel_min = hz_to_mel(f_min);
        let mel_max = hz_to_mel(f_max);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| {
                let t = i as f64 / (n_mels + 1) as f64;
                mel_to_hz(mel_min + (mel_max - mel_min) * t)
            })
            .collect();

        let bin_hz = |bin: usize| bin as f64 * sr / n_fft.max(1) as f64;

        let mut filters = Vec::with_capacity(n_mels);
        for m in 0..n_mels {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let lower_width = center - left;
            let upper_width = right - center;
            let enorm = if right > left { 2.0 / (right - left) } else { 0.0 };

            let mut weights = Vec::new();
            for bin in 0..n_bins {
                let hz = bin_hz(bin);
                let lower = if lower_width > 0.0 {
                    (hz - left) / lower_width
                } else {
                    0.0
                };
                let upper = if upper_width > 0.0 {
                    (right - hz) / upper_width
                } else {
                    0.0
                };
                let w = lower.min(upper).max(0.0) * enorm;
                if w > 0.0 {
                    weights.push((bin, w as f32));
                }
            }
            filters.push(weights);
        }

        Self { n_bins, filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Mel-band energies for one power frame.
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0_f32; self.filters.len()];
        self.apply_into(power, &mut out);
        out
    }

    /// Write mel-band energies for one power frame into `out`.
    pub fn apply_into(&self, power: &[f32], out: &mut [f32]) {
        for (idx, filter) in self.filters.iter().enumerate() {
            let mut sum = 0.0_f64;
            for &(bin, weight) in filter {
                let p = power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64;
                sum += p * weight as f64;
            }
            if let Some(slot) = out.get_mut(idx) {
                *slot = sum as f32;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn filter(&self, band: usize) -> &[(usize, f32)] {
        &self.filters[band]
    }
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1_000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 250.0, 999.0, 1_000.0, 4_000.0, 8_000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "{hz} -> {back}");
        }
    }

    #[test]
    fn mel_scale_is_linear_below_one_khz() {
        assert!((hz_to_mel(500.0) - 7.5).abs() < 1e-9);
        assert!((hz_to_mel(1_000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn bank_has_requested_band_count() {
        let bank = MelFilterBank::new(16_000, 2048, 128, 0.0, 8_000.0);
        assert_eq!(bank.n_mels(), 128);
        assert_eq!(bank.n_bins(), 1025);
        assert_eq!(bank.apply(&vec![1.0; 1025]).len(), 128);
    }

    #[test]
    fn every_band_covers_at_least_one_bin() {
        let bank = MelFilterBank::new(16_000, 2048, 128, 0.0, 8_000.0);
        for band in 0..128 {
            assert!(!bank.filter(band).is_empty(), "band {band} empty");
        }
    }

    #[test]
    fn tone_lands_in_matching_band() {
        let bank = MelFilterBank::new(16_000, 2048, 128, 0.0, 8_000.0);
        let mut power = vec![0.0_f32; 1025];
        power[256] = 1.0; // 2 kHz
        let mel = bank.apply(&power);
        let (peak, _) = mel
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
        let center_hz = mel_to_hz(
            hz_to_mel(0.0) + (hz_to_mel(8_000.0) - hz_to_mel(0.0)) * (peak + 1) as f64 / 129.0,
        );
        assert!((center_hz - 2_000.0).abs() < 150.0, "center {center_hz}");
    }

    #[test]
    fn f_max_is_clamped_to_nyquist() {
        let bank = MelFilterBank::new(16_000, 512, 8, 0.0, 40_000.0);
        for band in 0..8 {
            assert!(bank.filter(band).iter().all(|&(bin, _)| bin <= 256));
        }
    }
}
