//! Per-file cleaning pipeline: ingestion → gate → denoise → trim → write.
//!
//! [`CleaningPipeline`] is built once from a [`PipelineConfig`] and shared
//! (behind an `Arc`) by every worker of a batch run.  It holds no mutable
//! state, so the same input always produces the same output.
//!
//! # Flow
//!
//! ```text
//! path / upload bytes
//!   └─▶ Ingestor          (decode, downmix, resample to 16 kHz)
//!         └─▶ QualityGate (duration, then SNR)
//!               ├─ Rejected → FileOutcome::Rejected, nothing written
//!               └─ Accepted → WienerDenoiser → SilenceTrimmer
//!                               └─▶ WaveformWriter → FileOutcome::Accepted
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::audio::{
    GateDecision, IngestionError, Ingestor, QualityGate, QualityMetrics, QualityRejection,
    QualityScorer, SilenceTrimmer, SpectralScorer, Waveform, WaveformWriter, WienerDenoiser,
    WriteError,
};
use crate::config::PipelineConfig;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Faults that stop one file.  A gate rejection is not a fault and is
/// reported through [`FileOutcome::Rejected`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestionError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upload name has no usable file stem.
    #[error("invalid upload name {0:?}")]
    InvalidName(String),
}

// ---------------------------------------------------------------------------
// FileOutcome
// ---------------------------------------------------------------------------

/// Result of running one waveform through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Cleaned waveform written to `path`.
    Accepted {
        path: PathBuf,
        metrics: QualityMetrics,
        /// Length of the written waveform in samples.
        samples: usize,
    },
    Rejected(QualityRejection),
}

impl FileOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FileOutcome::Accepted { .. })
    }

    /// `"accepted"`, `"too_short"` or `"low_snr"`.
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Accepted { .. } => "accepted",
            FileOutcome::Rejected(r) => r.reason(),
        }
    }
}

// ---------------------------------------------------------------------------
// CleaningPipeline
// ---------------------------------------------------------------------------

/// Stateless per-file cleaner.
///
/// ```rust,no_run
/// use std::path::Path;
/// use speech_etl::config::PipelineConfig;
/// use speech_etl::pipeline::CleaningPipeline;
///
/// let pipeline = CleaningPipeline::new(&PipelineConfig::default());
/// let outcome = pipeline
///     .clean_file(Path::new("raw/PD/a.mp3"), Path::new("out/PD/clean_a.wav"))
///     .unwrap();
/// println!("{}", outcome.label());
/// ```
#[derive(Clone)]
pub struct CleaningPipeline {
    ingestor: Ingestor,
    scorer: Arc<dyn QualityScorer>,
    gate: QualityGate,
    denoiser: WienerDenoiser,
    trimmer: SilenceTrimmer,
    writer: WaveformWriter,
    clean_prefix: String,
}

impl std::fmt::Debug for CleaningPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleaningPipeline")
            .field("ingestor", &self.ingestor)
            .field("gate", &self.gate)
            .field("denoiser", &self.denoiser)
            .field("trimmer", &self.trimmer)
            .field("writer", &self.writer)
            .field("clean_prefix", &self.clean_prefix)
            .finish_non_exhaustive()
    }
}

impl CleaningPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let rate = config.audio.target_sample_rate;
        Self {
            ingestor: Ingestor::from_config(&config.audio),
            scorer: Arc::new(SpectralScorer::new(rate, &config.gate)),
            gate: QualityGate::from_config(&config.gate),
            denoiser: WienerDenoiser::from_config(&config.denoise),
            trimmer: SilenceTrimmer::from_config(&config.trim),
            writer: WaveformWriter::new(rate),
            clean_prefix: config.batch.clean_prefix.clone(),
        }
    }

    /// Replace the quality scorer.
    pub fn with_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// `<prefix><stem>.wav`.
    pub fn output_file_name(&self, stem: &str) -> String {
        format!("{}{stem}.wav", self.clean_prefix)
    }

    /// Gate `waveform` and, when accepted, write its cleaned form to `dest`.
    ///
    /// A rejected waveform touches nothing on disk; the destination
    /// directory is only created for an accepted one.
    pub fn clean_waveform(
        &self,
        waveform: &Waveform,
        dest: &Path,
    ) -> Result<FileOutcome, PipelineError> {
        let metrics = match self.gate.evaluate(self.scorer.as_ref(), waveform) {
            GateDecision::Accepted(metrics) => metrics,
            GateDecision::Rejected(rejection) => return Ok(FileOutcome::Rejected(rejection)),
        };

        let denoised = self.denoiser.denoise(waveform);
        let trimmed = self.trimmer.trim(&denoised);
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PipelineError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.writer.write(&trimmed, dest)?;

        Ok(FileOutcome::Accepted {
            path: dest.to_path_buf(),
            metrics,
            samples: trimmed.len(),
        })
    }

    /// Ingest `input` and clean it into `dest`.
    pub fn clean_file(&self, input: &Path, dest: &Path) -> Result<FileOutcome, PipelineError> {
        let waveform = self.ingestor.load_file(input)?;
        let outcome = self.clean_waveform(&waveform, dest)?;
        log_outcome(input, &outcome);
        Ok(outcome)
    }

    /// Clean an in-memory upload into `dest_root/<prefix><stem>.wav`.
    ///
    /// Only the final component of `file_name` is used; the extension must
    /// be allow-listed.
    pub fn clean_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        dest_root: &Path,
    ) -> Result<FileOutcome, PipelineError> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::InvalidName(file_name.to_string()))?;
        let stem = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PipelineError::InvalidName(file_name.to_string()))?;

        let waveform = self.ingestor.load_bytes(bytes, base)?;

        let dest = dest_root.join(self.output_file_name(stem));
        let outcome = self.clean_waveform(&waveform, &dest)?;
        log_outcome(Path::new(base), &outcome);
        Ok(outcome)
    }
}

fn log_outcome(input: &Path, outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Accepted { path, metrics, .. } => log::info!(
            "accepted {} ({:.2}s, {:.1} dB) -> {}",
            input.display(),
            metrics.duration_secs,
            metrics.snr_db,
            path.display()
        ),
        FileOutcome::Rejected(rejection) => {
            log::info!("rejected {}: {rejection}", input.display())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_support::{clean_take, noise, silence, write_wav, RATE};
    use tempfile::tempdir;

    fn pipeline() -> CleaningPipeline {
        CleaningPipeline::new(&PipelineConfig::default())
    }

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn clean_take_is_accepted_and_written_as_16k_mono() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.wav");
        // Stereo 44.1 kHz in, mono 16 kHz out.
        let mono = clean_take(2.0, 44_100);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
        write_wav(&input, &stereo, 2, 44_100);

        let dest = dir.path().join("clean_a.wav");
        let outcome = pipeline().clean_file(&input, &dest).unwrap();
        assert!(outcome.is_accepted(), "{outcome:?}");

        let reader = hound::WavReader::open(&dest).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
    }

    #[test]
    fn short_file_is_rejected_without_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let wf = Waveform::new(clean_take(1.0, RATE), RATE);
        let outcome = pipeline()
            .clean_waveform(&wf, &out.join("clean_b.wav"))
            .unwrap();
        assert_eq!(outcome.label(), "too_short");
        assert!(dir_is_empty(&out));
    }

    #[test]
    fn noise_is_rejected_as_low_snr_without_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let wf = Waveform::new(noise(3.0, RATE, 0.3, 21), RATE);
        let outcome = pipeline()
            .clean_waveform(&wf, &out.join("clean_c.wav"))
            .unwrap();
        assert_eq!(outcome.label(), "low_snr");
        assert!(dir_is_empty(&out));
    }

    #[test]
    fn accepted_output_has_leading_silence_trimmed() {
        let dir = tempdir().unwrap();
        let mut samples = silence(0.3, RATE);
        samples.extend(clean_take(2.0, RATE));
        let wf = Waveform::new(samples, RATE);

        let dest = dir.path().join("clean_d.wav");
        match pipeline().clean_waveform(&wf, &dest).unwrap() {
            FileOutcome::Accepted { samples, .. } => assert!(samples < wf.len()),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn rejected_file_never_reaches_the_writer() {
        struct Rejecting(AtomicUsize);
        impl QualityScorer for Rejecting {
            fn duration_secs(&self, _: &Waveform) -> f32 {
                self.0.fetch_add(1, Ordering::SeqCst);
                0.5
            }
            fn snr_db(&self, _: &Waveform) -> f32 {
                panic!("snr must not be computed for short input");
            }
        }

        let dir = tempdir().unwrap();
        let scorer = Arc::new(Rejecting(AtomicUsize::new(0)));
        let pipeline = pipeline().with_scorer(scorer.clone());
        let wf = Waveform::new(clean_take(2.0, RATE), RATE);

        let outcome = pipeline
            .clean_waveform(&wf, &dir.path().join("x.wav"))
            .unwrap();
        assert_eq!(outcome.label(), "too_short");
        assert_eq!(scorer.0.load(Ordering::SeqCst), 1);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn upload_is_cleaned_into_dest_root() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.wav");
        write_wav(&src, &clean_take(2.0, RATE), 1, RATE);
        let bytes = std::fs::read(&src).unwrap();

        let dest_root = dir.path().join("uploads");
        let outcome = pipeline()
            .clean_upload("../../voice.wav", bytes, &dest_root)
            .unwrap();
        match outcome {
            FileOutcome::Accepted { path, .. } => {
                assert_eq!(path, dest_root.join("clean_voice.wav"));
                assert!(path.exists());
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn rejected_upload_leaves_dest_root_absent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.wav");
        write_wav(&src, &clean_take(1.0, RATE), 1, RATE);
        let bytes = std::fs::read(&src).unwrap();

        let dest_root = dir.path().join("uploads");
        let outcome = pipeline()
            .clean_upload("short.wav", bytes, &dest_root)
            .unwrap();
        assert_eq!(outcome.label(), "too_short");
        assert!(!dest_root.exists());
    }

    #[test]
    fn upload_with_unsupported_extension_is_typed_error() {
        let dir = tempdir().unwrap();
        let err = pipeline()
            .clean_upload("notes.txt", b"hello".to_vec(), dir.path())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Ingest(IngestionError::UnsupportedFormat { .. })
        ));
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn upload_without_stem_is_rejected() {
        let dir = tempdir().unwrap();
        let err = pipeline()
            .clean_upload("", Vec::new(), dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidName(_)));
    }

    #[test]
    fn output_name_uses_prefix() {
        assert_eq!(pipeline().output_file_name("a"), "clean_a.wav");
    }
}
