//! Mono waveform value passed between pipeline stages.
//!
//! Every stage takes a `&Waveform` and returns a new one; nothing mutates a
//! waveform in place.
//!
//! # Example
//!
//! ```rust
//! use speech_etl::audio::Waveform;
//!
//! let wf = Waveform::new(vec![0.0_f32; 24_000], 16_000);
//! assert_eq!(wf.channels(), 1);
//! assert!((wf.duration_secs() - 1.5).abs() < 1e-6);
//! ```

// ---------------------------------------------------------------------------
// Waveform
// ---------------------------------------------------------------------------

/// Single-channel `f32` samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always `1`; ingestion collapses every source to mono.
    pub fn channels(&self) -> u16 {
        1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `sample_count / sample_rate`; `0.0` for a zero sample rate.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }

    /// New waveform holding `samples[start..end]` at the same rate.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Self::new(self.samples[start..end].to_vec(), self.sample_rate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
