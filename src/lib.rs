//! Speech recording ETL: quality-gate, clean and featurise raw recordings.
//!
//! | Module | Role |
//! |--------|------|
//! | [`audio`] | ingestion, quality scoring, gate, denoise, trim, WAV output |
//! | [`dsp`] | STFT and mel filter bank |
//! | [`features`] | log-mel spectrogram, `.npy` tensor, PNG preview |
//! | [`pipeline`] | per-file pipeline and batch orchestrator |
//! | [`config`] | TOML-backed settings |

pub mod audio;
pub mod config;
pub mod dsp;
pub mod features;
pub mod pipeline;

#[cfg(test)]
mod test_support;
