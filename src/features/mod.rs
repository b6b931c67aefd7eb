//! Feature generation: cleaned waveform → log-power mel spectrogram →
//! `.npy` tensor + optional `.png` preview.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use speech_etl::config::PipelineConfig;
//! use speech_etl::features::FeatureExtractor;
//!
//! let config = PipelineConfig::default();
//! let extractor = FeatureExtractor::new(config.audio.target_sample_rate, &config.features);
//! let artifacts = extractor
//!     .extract_file(
//!         Path::new("out/PD/clean_a.wav"),
//!         Path::new("out/PD/a.npy"),
//!         Path::new("out/PD/a.png"),
//!     )
//!     .unwrap();
//! println!("tensor shape {:?}", artifacts.shape);
//! ```

pub mod preview;
pub mod spectrogram;
pub mod tensor;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::{IngestionError, Ingestor, Waveform};
use crate::config::FeatureConfig;
use crate::dsp::{MelFilterBank, Stft};

pub use preview::{encode_preview, render_image, render_preview, RenderError};
pub use spectrogram::{power_to_db_in_place, MelSpectrogram};
pub use tensor::{decode_npy, encode_npy, persist_tensor, read_tensor, TensorError};

// ---------------------------------------------------------------------------
// FeatureError
// ---------------------------------------------------------------------------

/// Why no tensor was produced for a cleaned waveform.
///
/// Preview failures are not in here: they are reported through
/// [`PreviewOutcome::Failed`] alongside a successfully written tensor.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Ingest(#[from] IngestionError),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// What happened to the preview image.
#[derive(Debug)]
pub enum PreviewOutcome {
    Written(PathBuf),
    /// Disabled by configuration.
    Skipped,
    Failed(RenderError),
}

/// Artifacts produced for one waveform.
#[derive(Debug)]
pub struct FeatureArtifacts {
    /// `[n_mels, n_frames]`.
    pub shape: [usize; 2],
    pub tensor_path: PathBuf,
    pub preview: PreviewOutcome,
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Computes mel spectrograms and persists them.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    ingestor: Ingestor,
    stft: Stft,
    bank: MelFilterBank,
    top_db: Option<f32>,
    render_preview: bool,
    preview_scale: u32,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32, config: &FeatureConfig) -> Self {
        Self {
            ingestor: Ingestor::new(sample_rate),
            stft: Stft::new(config.n_fft, config.hop_length),
            bank: MelFilterBank::new(
                sample_rate,
                config.n_fft,
                config.n_mels,
                config.f_min,
                config.f_max,
            ),
            top_db: config.db_floor(),
            render_preview: config.render_preview,
            preview_scale: config.preview_scale,
        }
    }

    /// Log-power mel spectrogram, dB relative to its own maximum.
    pub fn compute(&self, waveform: &Waveform) -> MelSpectrogram {
        MelSpectrogram::power(waveform.samples(), &self.stft, &self.bank).power_to_db(self.top_db)
    }

    /// Load a cleaned `.wav`, compute its spectrogram and write both
    /// artifacts.
    ///
    /// The tensor and preview writes are attempted independently; a preview
    /// failure is logged and returned in [`FeatureArtifacts::preview`], while
    /// a tensor failure is the error of this call.
    pub fn extract_file(
        &self,
        wav_path: &Path,
        tensor_path: &Path,
        preview_path: &Path,
    ) -> Result<FeatureArtifacts, FeatureError> {
        let waveform = self.ingestor.load_file(wav_path)?;
        let spec = self.compute(&waveform);
        log::debug!(
            "{}: mel spectrogram {:?}",
            wav_path.display(),
            spec.shape()
        );

        let tensor = persist_tensor(&spec, tensor_path);

        let preview = if self.render_preview {
            match render_preview(&spec, preview_path, self.preview_scale) {
                Ok(()) => PreviewOutcome::Written(preview_path.to_path_buf()),
                Err(e) => {
                    log::warn!("preview for {} failed: {e}", wav_path.display());
                    PreviewOutcome::Failed(e)
                }
            }
        } else {
            PreviewOutcome::Skipped
        };

        tensor?;
        Ok(FeatureArtifacts {
            shape: spec.shape(),
            tensor_path: tensor_path.to_path_buf(),
            preview,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WaveformWriter;
    use crate::test_support::{clean_take, RATE};
    use tempfile::tempdir;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(RATE, &FeatureConfig::default())
    }

    #[test]
    fn tensor_shape_is_128_by_frames() {
        let wf = Waveform::new(clean_take(2.0, RATE), RATE);
        let spec = extractor().compute(&wf);
        assert_eq!(spec.n_mels(), 128);
        let expected = (wf.len() + 511) / 512;
        assert!(spec.n_frames().abs_diff(expected) <= 1, "{}", spec.n_frames());
    }

    #[test]
    fn extract_file_writes_tensor_and_preview() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("clean_a.wav");
        let wf = Waveform::new(clean_take(2.0, RATE), RATE);
        WaveformWriter::new(RATE).write(&wf, &wav).unwrap();

        let npy = dir.path().join("a.npy");
        let png = dir.path().join("a.png");
        let artifacts = extractor().extract_file(&wav, &npy, &png).unwrap();

        assert_eq!(artifacts.shape, [128, 1 + wf.len() / 512]);
        assert!(matches!(artifacts.preview, PreviewOutcome::Written(_)));
        let tensor = read_tensor(&npy).unwrap();
        assert_eq!(tensor.shape(), artifacts.shape);
        assert!(png.exists());
    }

    #[test]
    fn preview_failure_keeps_tensor() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("clean_a.wav");
        WaveformWriter::new(RATE)
            .write(&Waveform::new(clean_take(2.0, RATE), RATE), &wav)
            .unwrap();

        let npy = dir.path().join("a.npy");
        let png = dir.path().join("no-such-dir").join("a.png");
        let artifacts = extractor().extract_file(&wav, &npy, &png).unwrap();

        assert!(matches!(artifacts.preview, PreviewOutcome::Failed(_)));
        assert!(read_tensor(&npy).is_ok());
    }

    #[test]
    fn tensor_failure_still_renders_preview() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("clean_a.wav");
        WaveformWriter::new(RATE)
            .write(&Waveform::new(clean_take(2.0, RATE), RATE), &wav)
            .unwrap();

        let npy = dir.path().join("no-such-dir").join("a.npy");
        let png = dir.path().join("a.png");
        let err = extractor().extract_file(&wav, &npy, &png).unwrap_err();

        assert!(matches!(err, FeatureError::Tensor(_)));
        assert!(png.exists());
    }

    #[test]
    fn preview_can_be_disabled() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("clean_a.wav");
        WaveformWriter::new(RATE)
            .write(&Waveform::new(clean_take(2.0, RATE), RATE), &wav)
            .unwrap();

        let config = FeatureConfig {
            render_preview: false,
            ..FeatureConfig::default()
        };
        let png = dir.path().join("a.png");
        let artifacts = FeatureExtractor::new(RATE, &config)
            .extract_file(&wav, &dir.path().join("a.npy"), &png)
            .unwrap();
        assert!(matches!(artifacts.preview, PreviewOutcome::Skipped));
        assert!(!png.exists());
    }

    #[test]
    fn unreadable_wav_is_ingest_error() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("broken.wav");
        std::fs::write(&wav, b"RIFF????").unwrap();
        let err = extractor()
            .extract_file(&wav, &dir.path().join("b.npy"), &dir.path().join("b.png"))
            .unwrap_err();
        assert!(matches!(err, FeatureError::Ingest(_)));
        assert!(!dir.path().join("b.npy").exists());
    }
}
