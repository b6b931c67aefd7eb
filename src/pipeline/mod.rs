//! Pipeline module: per-file cleaning and the batch orchestrator.
//!
//! # Architecture
//!
//! ```text
//! BatchOrchestrator::run()            ← async, one instance per run
//!        │
//!        ├─ Scanning    walkdir(input_root)
//!        ├─ Processing  spawn_blocking(CleaningPipeline::clean_file) × workers
//!        ├─ Counting    BatchCounters (atomic)
//!        └─ Done        BatchReport
//!
//! BatchOrchestrator::run_features()   ← second pass over the cleaned tree
//!        └─ spawn_blocking(FeatureExtractor::extract_file) → FeatureReport
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use speech_etl::config::PipelineConfig;
//! use speech_etl::pipeline::BatchOrchestrator;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = BatchOrchestrator::new(&PipelineConfig::default());
//!     let (cleaned, features) = orchestrator
//!         .run_all(Path::new("raw_data"), Path::new("out"), Path::new("out"))
//!         .await
//!         .unwrap();
//!     println!("{cleaned:?} {features:?}");
//! }
//! ```

pub mod batch;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use batch::{
    clean_output_path, feature_stem, mirror_dir, scan_audio_files, scan_wav_files,
    BatchError, BatchOrchestrator,
};
pub use runner::{CleaningPipeline, FileOutcome, PipelineError};
pub use state::{BatchCounters, BatchReport, BatchState, FeatureReport};
