//! Spectral analysis primitives shared by the quality scorer and the feature
//! generator.

pub mod mel;
pub mod stft;

pub use mel::MelFilterBank;
pub use stft::{hann_window, Stft};
