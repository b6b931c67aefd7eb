//! Log-power mel spectrogram.

use crate::dsp::{MelFilterBank, Stft};

/// Floor applied before taking logarithms.
pub const AMIN: f32 = 1e-10;

/// `n_mels × n_frames` log-power values, row-major (one row per mel band).
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    n_mels: usize,
    n_frames: usize,
    data: Vec<f32>,
}

impl MelSpectrogram {
    /// Returns `None` when `data.len() != n_mels * n_frames`.
    pub fn from_parts(n_mels: usize, n_frames: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == n_mels * n_frames).then_some(Self {
            n_mels,
            n_frames,
            data,
        })
    }

    /// Mel power spectrogram of `samples` (linear power, not yet in dB).
    pub fn power(samples: &[f32], stft: &Stft, bank: &MelFilterBank) -> Self {
        let n_mels = bank.n_mels();
        let n_frames = stft.frame_count(samples.len());
        let mut data = vec![0.0_f32; n_mels * n_frames];
        let mut column = vec![0.0_f32; n_mels];

        stft.for_each_power_frame(samples, |t, power| {
            bank.apply_into(power, &mut column);
            for (m, &value) in column.iter().enumerate() {
                data[m * n_frames + t] = value;
            }
        });

        Self {
            n_mels,
            n_frames,
            data,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// `[n_mels, n_frames]`.
    pub fn shape(&self) -> [usize; 2] {
        [self.n_mels, self.n_frames]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn get(&self, mel: usize, frame: usize) -> Option<f32> {
        if mel >= self.n_mels || frame >= self.n_frames {
            return None;
        }
        self.data.get(mel * self.n_frames + frame).copied()
    }

    /// Largest value, or `None` when empty.
    pub fn max(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::max)
    }

    pub fn min(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::min)
    }

    /// Convert power to decibels relative to the maximum, in place.
    ///
    /// `10·log10(max(amin, S)) - 10·log10(max(amin, max(S)))`, then values
    /// more than `top_db` below the peak are raised to `peak - top_db`.
    pub fn power_to_db(mut self, top_db: Option<f32>) -> Self {
        power_to_db_in_place(&mut self.data, top_db);
        self
    }
}

/// `power_to_db` with `ref = max` and `amin = 1e-10` on a flat slice.
pub fn power_to_db_in_place(values: &mut [f32], top_db: Option<f32>) {
    let peak = values.iter().copied().fold(0.0_f32, f32::max);
    let ref_db = 10.0 * peak.max(AMIN).log10();

    for v in values.iter_mut() {
        let p = if v.is_finite() { *v } else { 0.0 };
        *v = 10.0 * p.max(AMIN).log10() - ref_db;
    }

    if let Some(top_db) = top_db {
        let max_db = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = max_db - top_db.max(0.0);
        for v in values.iter_mut() {
            *v = v.max(floor);
        }
    }
}
