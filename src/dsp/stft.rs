//! Centred short-time Fourier transform.
//!
//! Frames are centred on `t * hop` with `n_fft / 2` zeros of padding on both
//! ends of the signal and a periodic Hann window, so a signal of `L` samples
//! yields `1 + L / hop` frames.  Only the non-negative frequency bins
//! (`n_fft / 2 + 1`) are reported, as power `|X|²`.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Reusable STFT plan; cheap to share across threads.
#[derive(Clone)]
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .finish_non_exhaustive()
    }
}

impl Stft {
    /// Zero sizes are bumped to `1`.
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let n_fft = n_fft.max(1);
        let hop_length = hop_length.max(1);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            fft,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of non-negative frequency bins per frame.
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frames produced for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Call `f(frame_index, power_bins)` for every frame in order.
    pub fn for_each_power_frame<F>(&self, samples: &[f32], mut f: F)
    where
        F: FnMut(usize, &[f32]),
    {
        let n_bins = self.n_bins();
        let half = (self.n_fft / 2) as isize;
        let mut buffer = vec![Complex::<f32>::default(); self.n_fft];
        let mut scratch = vec![Complex::<f32>::default(); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0_f32; n_bins];

        for frame in 0..self.frame_count(samples.len()) {
            let start = (frame * self.hop_length) as isize - half;
            for (i, cell) in buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 {
                    samples.get(idx as usize).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                *cell = Complex::new(sanitize(sample) * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            for (slot, c) in power.iter_mut().zip(buffer.iter()) {
                *slot = c.norm_sqr();
            }
            f(frame, &power);
        }
    }

    /// Collect every frame's power spectrum (`frames × n_bins`).
    pub fn power_frames(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut frames = Vec::with_capacity(self.frame_count(samples.len()));
        self.for_each_power_frame(samples, |_, power| frames.push(power.to_vec()));
        frames
    }
}

/// Periodic Hann window of `length` samples.
pub fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0_f32; length.max(1)];
    }
    let n = length as f64;
    (0..length)
        .map(|i| (0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n).cos()) as f32)
        .collect()
}

fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}
