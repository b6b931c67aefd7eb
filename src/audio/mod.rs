//! Audio cleaning stages: ingestion → scoring → gate → denoise → trim → write.
//!
//! # Pipeline
//!
//! ```text
//! file / bytes → symphonia decode → downmix_to_mono → resample (rubato)
//!             → SpectralScorer → QualityGate ─reject→ stop
//!                                             └accept→ WienerDenoiser
//!             → SilenceTrimmer → WaveformWriter (16 kHz mono WAV)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use speech_etl::audio::{GateDecision, Ingestor, QualityGate, SpectralScorer};
//! use speech_etl::config::GateConfig;
//!
//! let ingestor = Ingestor::new(16_000);
//! let waveform = ingestor.load_file(Path::new("raw_data/PD/a.wav")).unwrap();
//!
//! let config = GateConfig::default();
//! let scorer = SpectralScorer::new(16_000, &config);
//! match QualityGate::from_config(&config).evaluate(&scorer, &waveform) {
//!     GateDecision::Accepted(m) => println!("accepted: {:.1} dB", m.snr_db),
//!     GateDecision::Rejected(r) => println!("rejected: {r}"),
//! }
//! ```

pub mod denoise;
pub mod gate;
pub mod ingest;
pub mod quality;
pub mod resample;
pub mod vad;
pub mod waveform;
pub mod writer;

pub use denoise::WienerDenoiser;
pub use gate::{GateDecision, QualityGate, QualityRejection};
pub use ingest::{IngestionError, Ingestor};
pub use quality::{QualityMetrics, QualityScorer, SpectralScorer};
pub use resample::{downmix_to_mono, resample, ResampleError};
pub use vad::SilenceTrimmer;
pub use waveform::Waveform;
pub use writer::{WaveformWriter, WriteError};
