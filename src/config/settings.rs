//! Pipeline settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to worker
//! threads by value.  Defaults are the production constants; a settings file
//! only needs to name the values it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Canonical sample rate every waveform is resampled to (Hz).
    pub target_sample_rate: u32,
    /// Lower-case file extensions accepted by ingestion.
    pub extensions: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            extensions: vec!["wav".into(), "mp3".into(), "m4a".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

/// Quality gate thresholds and the SNR estimator's analysis window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Recordings shorter than this are rejected as `too_short`.
    pub min_duration_secs: f32,
    /// Recordings whose estimated SNR is below this are rejected as `low_snr`.
    pub min_snr_db: f32,
    /// FFT size of the SNR estimator's short-time spectrum.
    pub snr_n_fft: usize,
    /// Hop length of the SNR estimator's short-time spectrum.
    pub snr_hop_length: usize,
    /// Fraction of frames averaged on each side (loudest / quietest).
    pub snr_decile: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 1.5,
            min_snr_db: 10.0,
            snr_n_fft: 2048,
            snr_hop_length: 512,
            snr_decile: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// DenoiseConfig
// ---------------------------------------------------------------------------

/// Wiener filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Local mean/variance window in samples.
    pub window: usize,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self { window: 15 }
    }
}

// ---------------------------------------------------------------------------
// TrimConfig
// ---------------------------------------------------------------------------

/// Leading/trailing silence trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Frames quieter than the loudest frame by more than this are silence.
    pub top_db: f32,
    /// Energy frame length in samples.
    pub frame_length: usize,
    /// Energy frame hop in samples.
    pub hop_length: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            top_db: 20.0,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Mel-spectrogram generation and preview rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub f_min: f32,
    pub f_max: f32,
    /// Dynamic range kept below the spectrogram maximum (dB).  A value of
    /// `0` or less disables the floor.
    pub top_db: f32,
    /// Render the PNG preview next to the tensor.
    pub render_preview: bool,
    /// Pixels per spectrogram cell in the preview image.
    pub preview_scale: u32,
}

impl FeatureConfig {
    /// `top_db` as an optional floor; `None` when disabled.
    pub fn db_floor(&self) -> Option<f32> {
        (self.top_db > 0.0).then_some(self.top_db)
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            f_min: 0.0,
            f_max: 8_000.0,
            top_db: 80.0,
            render_preview: true,
            preview_scale: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchConfig
// ---------------------------------------------------------------------------

/// Directory-walk behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Prefix prepended to the stem of every cleaned waveform.
    pub clean_prefix: String,
    /// Maximum number of files processed concurrently (`1` = sequential).
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            clean_prefix: "clean_".into(),
            workers: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration value object, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use speech_etl::config::PipelineConfig;
///
/// // Returns Default when the file is missing.
/// let config = PipelineConfig::load().unwrap();
/// assert_eq!(config.audio.target_sample_rate, 16_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub audio: AudioConfig,
    pub gate: GateConfig,
    pub denoise: DenoiseConfig,
    pub trim: TrimConfig,
    pub features: FeatureConfig,
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(PipelineConfig::default())` when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_values_match_production_constants() {
        let cfg = PipelineConfig::default();

        assert_eq!(cfg.audio.target_sample_rate, 16_000);
        assert_eq!(cfg.audio.extensions, vec!["wav", "mp3", "m4a"]);
        assert_eq!(cfg.gate.min_duration_secs, 1.5);
        assert_eq!(cfg.gate.min_snr_db, 10.0);
        assert_eq!(cfg.gate.snr_n_fft, 2048);
        assert_eq!(cfg.gate.snr_hop_length, 512);
        assert_eq!(cfg.denoise.window, 15);
        assert_eq!(cfg.trim.top_db, 20.0);
        assert_eq!(cfg.features.n_fft, 2048);
        assert_eq!(cfg.features.hop_length, 512);
        assert_eq!(cfg.features.n_mels, 128);
        assert_eq!(cfg.features.f_min, 0.0);
        assert_eq!(cfg.features.f_max, 8_000.0);
        assert_eq!(cfg.features.db_floor(), Some(80.0));
        assert_eq!(cfg.batch.clean_prefix, "clean_");
        assert_eq!(cfg.batch.workers, 1);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = PipelineConfig::load_from(&path).expect("should not error");
        assert_eq!(config.gate.min_snr_db, 10.0);
        assert_eq!(config.features.n_mels, 128);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = PipelineConfig::default();
        cfg.gate.min_snr_db = 12.5;
        cfg.features.top_db = 0.0;
        cfg.batch.workers = 4;
        cfg.batch.clean_prefix = "c_".into();

        cfg.save_to(&path).expect("save");
        let loaded = PipelineConfig::load_from(&path).expect("load");

        assert_eq!(loaded.gate.min_snr_db, 12.5);
        assert_eq!(loaded.features.top_db, 0.0);
        assert_eq!(loaded.features.db_floor(), None);
        assert_eq!(loaded.batch.workers, 4);
        assert_eq!(loaded.batch.clean_prefix, "c_");
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[gate]\nmin_duration_secs = 2.0\n").unwrap();

        let loaded = PipelineConfig::load_from(&path).expect("load");
        assert_eq!(loaded.gate.min_duration_secs, 2.0);
        assert_eq!(loaded.gate.min_snr_db, 10.0);
        assert_eq!(loaded.audio.target_sample_rate, 16_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "gate = [not toml").unwrap();
        assert!(PipelineConfig::load_from(&path).is_err());
    }
}
