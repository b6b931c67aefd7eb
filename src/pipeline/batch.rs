//! Batch orchestrator: walks an input tree, mirrors it into an output tree
//! and runs every recognised audio file through the [`CleaningPipeline`].
//! A second pass turns the cleaned `.wav`s into feature tensors.
//!
//! # Run flow
//!
//! ```text
//! run(input_root, output_root)
//!   ├─ Scanning    walkdir, keep allow-listed extensions (sorted)
//!   ├─ Processing  per file on the blocking pool, at most `workers` at once:
//!   │                create_dir_all(mirror) → clean_file(<prefix><stem>.wav)
//!   ├─ Counting    accepted / rejected (errors and panics count as rejected)
//!   └─ Done        BatchReport
//! ```
//!
//! Each file reads only its own input and writes only its own output path,
//! so the only shared state is the counter pair.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::audio::Ingestor;
use crate::config::PipelineConfig;
use crate::features::{FeatureExtractor, PreviewOutcome};

use super::runner::CleaningPipeline;
use super::state::{BatchCounters, BatchReport, BatchState, FeatureReport};

// ---------------------------------------------------------------------------
// BatchError
// ---------------------------------------------------------------------------

/// Errors that stop a whole run before any file is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("input root does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("input root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("cannot create output root {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The task runtime failed outside any single file.
    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Output directory mirroring `file`'s directory under `output_root`.
///
/// `None` when `file` is not under `input_root`.
pub fn mirror_dir(input_root: &Path, output_root: &Path, file: &Path) -> Option<PathBuf> {
    let relative = file.strip_prefix(input_root).ok()?;
    Some(match relative.parent() {
        Some(parent) => output_root.join(parent),
        None => output_root.to_path_buf(),
    })
}

/// `<output_root>/<relative dir>/<prefix><stem>.wav`; the input extension is
/// discarded.
pub fn clean_output_path(
    input_root: &Path,
    output_root: &Path,
    file: &Path,
    prefix: &str,
) -> Option<PathBuf> {
    let dir = mirror_dir(input_root, output_root, file)?;
    let stem = file.file_stem()?.to_str()?;
    Some(dir.join(format!("{prefix}{stem}.wav")))
}

/// Stem used for feature artifacts: the `.wav` stem with `prefix` removed,
/// so `clean_a.wav` yields `a`.  A stem that is exactly the prefix is kept
/// whole.
pub fn feature_stem(wav_path: &Path, prefix: &str) -> Option<String> {
    let stem = wav_path.file_stem()?.to_str()?;
    match stem.strip_prefix(prefix) {
        Some(rest) if !rest.is_empty() => Some(rest.to_string()),
        _ => Some(stem.to_string()),
    }
}

/// Allow-listed audio files under `root`, sorted.  Unreadable entries are
/// logged and skipped.
pub fn scan_audio_files(root: &Path, ingestor: &Ingestor) -> Vec<PathBuf> {
    scan_files(root, |path| match ingestor.check_extension(path) {
        Ok(_) => true,
        Err(rejection) => {
            log::debug!("not scanned: {rejection}");
            false
        }
    })
}

/// `.wav` files under `root`, sorted.
pub fn scan_wav_files(root: &Path) -> Vec<PathBuf> {
    scan_files(root, |path| {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false)
    })
}

fn scan_files(root: &Path, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && keep(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
            Err(e) => log::warn!("skipping unreadable entry: {e}"),
        }
    }
    files.sort();
    files
}

fn check_roots(input_root: &Path, output_root: &Path) -> Result<(), BatchError> {
    if !input_root.exists() {
        return Err(BatchError::InputNotFound(input_root.to_path_buf()));
    }
    if !input_root.is_dir() {
        return Err(BatchError::NotADirectory(input_root.to_path_buf()));
    }
    std::fs::create_dir_all(output_root).map_err(|source| BatchError::CreateOutput {
        path: output_root.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// BatchOrchestrator
// ---------------------------------------------------------------------------

/// One orchestrator per batch; the report is reset at the start of each run.
///
/// ```rust,no_run
/// use std::path::Path;
/// use speech_etl::config::PipelineConfig;
/// use speech_etl::pipeline::BatchOrchestrator;
///
/// # async fn example() -> Result<(), speech_etl::pipeline::BatchError> {
/// let orchestrator = BatchOrchestrator::new(&PipelineConfig::default());
/// let report = orchestrator
///     .run(Path::new("raw_data"), Path::new("cleaned_data"))
///     .await?;
/// println!("{} accepted, {} rejected", report.accepted_count, report.rejected_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchOrchestrator {
    pipeline: Arc<CleaningPipeline>,
    features: Arc<FeatureExtractor>,
    clean_prefix: String,
    workers: usize,
    state: Mutex<BatchState>,
    counters: BatchCounters,
}

impl BatchOrchestrator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_pipeline(config, CleaningPipeline::new(config))
    }

    /// Orchestrator around a caller-built pipeline (e.g. with a custom scorer).
    pub fn with_pipeline(config: &PipelineConfig, pipeline: CleaningPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            features: Arc::new(FeatureExtractor::new(
                config.audio.target_sample_rate,
                &config.features,
            )),
            clean_prefix: config.batch.clean_prefix.clone(),
            workers: config.batch.workers.max(1),
            state: Mutex::new(BatchState::Idle),
            counters: BatchCounters::new(),
        }
    }

    pub fn state(&self) -> BatchState {
        self.state.lock().map(|s| *s).unwrap_or(BatchState::Idle)
    }

    /// Counters of the current (or last) cleaning run.
    pub fn report(&self) -> BatchReport {
        self.counters.snapshot()
    }

    fn set_state(&self, next: BatchState) {
        if let Ok(mut state) = self.state.lock() {
            if *state != next {
                log::debug!("batch: {} -> {}", state.label(), next.label());
            }
            *state = next;
        }
    }

    // -----------------------------------------------------------------------
    // Waveform stage
    // -----------------------------------------------------------------------

    /// Clean every recognised audio file under `input_root` into the mirrored
    /// layout under `output_root`.
    ///
    /// A file that fails to decode or write is counted as rejected; the run
    /// always continues to the next file.
    pub async fn run(
        &self,
        input_root: &Path,
        output_root: &Path,
    ) -> Result<BatchReport, BatchError> {
        check_roots(input_root, output_root)?;
        self.counters.reset();
        self.set_state(BatchState::Scanning);

        let files = {
            let root = input_root.to_path_buf();
            let ingestor = self.pipeline.ingestor().clone();
            tokio::task::spawn_blocking(move || scan_audio_files(&root, &ingestor))
                .await
                .map_err(|e| BatchError::Internal(e.to_string()))?
        };
        log::info!(
            "batch: {} audio files under {}",
            files.len(),
            input_root.display()
        );

        self.set_state(BatchState::Processing);
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for file in files {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| BatchError::Internal(e.to_string()))?;
            let pipeline = Arc::clone(&self.pipeline);
            let input_root = input_root.to_path_buf();
            let output_root = output_root.to_path_buf();
            let prefix = self.clean_prefix.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                clean_one(&pipeline, &input_root, &output_root, &file, &prefix)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            self.set_state(BatchState::Counting);
            let accepted = match joined {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("batch: file task failed: {e}");
                    false
                }
            };
            self.counters.record(accepted);
            self.set_state(BatchState::Processing);
        }

        self.set_state(BatchState::Done);
        let report = self.counters.snapshot();
        log::info!(
            "batch done: {} accepted, {} rejected",
            report.accepted_count,
            report.rejected_count
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Feature stage
    // -----------------------------------------------------------------------

    /// Generate `<stem>.npy` / `<stem>.png` for every `.wav` under
    /// `clean_root`, mirrored under `feature_root`.
    pub async fn run_features(
        &self,
        clean_root: &Path,
        feature_root: &Path,
    ) -> Result<FeatureReport, BatchError> {
        check_roots(clean_root, feature_root)?;

        let files = {
            let root = clean_root.to_path_buf();
            tokio::task::spawn_blocking(move || scan_wav_files(&root))
                .await
                .map_err(|e| BatchError::Internal(e.to_string()))?
        };
        log::info!(
            "features: {} cleaned files under {}",
            files.len(),
            clean_root.display()
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for file in files {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| BatchError::Internal(e.to_string()))?;
            let features = Arc::clone(&self.features);
            let clean_root = clean_root.to_path_buf();
            let feature_root = feature_root.to_path_buf();
            let prefix = self.clean_prefix.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                features_one(&features, &clean_root, &feature_root, &file, &prefix)
            });
        }

        let mut report = FeatureReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FeatureResult::Generated { preview_failed }) => {
                    report.generated_count += 1;
                    if preview_failed {
                        report.preview_failures += 1;
                    }
                }
                Ok(FeatureResult::Failed) => report.failed_count += 1,
                Err(e) => {
                    log::warn!("features: file task failed: {e}");
                    report.failed_count += 1;
                }
            }
        }

        log::info!(
            "features done: {} generated, {} failed, {} previews failed",
            report.generated_count,
            report.failed_count,
            report.preview_failures
        );
        Ok(report)
    }

    /// Waveform stage into `output_root`, then the feature stage from
    /// `output_root` into `feature_root`.
    pub async fn run_all(
        &self,
        input_root: &Path,
        output_root: &Path,
        feature_root: &Path,
    ) -> Result<(BatchReport, FeatureReport), BatchError> {
        let batch = self.run(input_root, output_root).await?;
        let features = self.run_features(output_root, feature_root).await?;
        Ok((batch, features))
    }
}

// ---------------------------------------------------------------------------
// Per-file work (blocking pool)
// ---------------------------------------------------------------------------

fn clean_one(
    pipeline: &CleaningPipeline,
    input_root: &Path,
    output_root: &Path,
    file: &Path,
    prefix: &str,
) -> bool {
    let (Some(dir), Some(dest)) = (
        mirror_dir(input_root, output_root, file),
        clean_output_path(input_root, output_root, file, prefix),
    ) else {
        log::warn!("skipping {}: cannot derive output path", file.display());
        return false;
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::warn!("cannot create {}: {e}", dir.display());
        return false;
    }

    match pipeline.clean_file(file, &dest) {
        Ok(outcome) => outcome.is_accepted(),
        Err(e) => {
            log::warn!("failed {}: {e}", file.display());
            false
        }
    }
}

enum FeatureResult {
    Generated { preview_failed: bool },
    Failed,
}

fn features_one(
    features: &FeatureExtractor,
    clean_root: &Path,
    feature_root: &Path,
    file: &Path,
    prefix: &str,
) -> FeatureResult {
    let (Some(dir), Some(stem)) = (
        mirror_dir(clean_root, feature_root, file),
        feature_stem(file, prefix),
    ) else {
        log::warn!("skipping {}: cannot derive feature path", file.display());
        return FeatureResult::Failed;
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::warn!("cannot create {}: {e}", dir.display());
        return FeatureResult::Failed;
    }

    let tensor_path = dir.join(format!("{stem}.npy"));
    let preview_path = dir.join(format!("{stem}.png"));
    match features.extract_file(file, &tensor_path, &preview_path) {
        Ok(artifacts) => FeatureResult::Generated {
            preview_failed: matches!(artifacts.preview, PreviewOutcome::Failed(_)),
        },
        Err(e) => {
            log::warn!("features failed for {}: {e}", file.display());
            FeatureResult::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
