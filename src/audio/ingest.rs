//! Audio ingestion: decode → downmix → resample.
//!
//! [`Ingestor`] turns a file path or an in-memory upload into a canonical
//! [`Waveform`] (mono, target sample rate).  Decoding is done by symphonia;
//! the container is chosen from the extension hint, which must be on the
//! allow-list (`wav`, `mp3`, `m4a` by default).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use speech_etl::audio::Ingestor;
//!
//! let ingestor = Ingestor::new(16_000);
//! let waveform = ingestor.load_file(Path::new("raw_data/PD/a.mp3")).unwrap();
//! assert_eq!(waveform.sample_rate(), 16_000);
//! ```

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::config::AudioConfig;

use super::resample::{downmix_to_mono, resample, ResampleError};
use super::Waveform;

// ---------------------------------------------------------------------------
// IngestionError
// ---------------------------------------------------------------------------

/// Why a source could not be turned into a waveform.
///
/// Terminal for the file: the orchestrator counts it as rejected and moves on.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Extension is not on the allow-list.
    #[error("unsupported audio format {extension:?}: {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container could not be recognised.
    #[error("unrecognised container for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("no decodable audio track in {0}")]
    NoTrack(PathBuf),

    /// Codec is recognised but unsupported.
    #[error("unsupported codec in {path}: {message}")]
    Codec { path: PathBuf, message: String },

    #[error("decode failed for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("no samples decoded from {0}")]
    Empty(PathBuf),

    #[error("resampling {path} failed: {source}")]
    Resample {
        path: PathBuf,
        #[source]
        source: ResampleError,
    },
}

/// Interleaved samples as they came out of the decoder.
struct Decoded {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Loads audio sources into canonical mono waveforms.
#[derive(Debug, Clone)]
pub struct Ingestor {
    target_sample_rate: u32,
    extensions: Vec<String>,
}

impl Ingestor {
    /// Ingestor with the default `wav` / `mp3` / `m4a` allow-list.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate,
            extensions: AudioConfig::default().extensions,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            target_sample_rate: config.target_sample_rate,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// `true` when `path` has an allow-listed extension (case-insensitive).
    pub fn is_supported(&self, path: &Path) -> bool {
        self.check_extension(path).is_ok()
    }

    /// Return the lower-case extension of `path`, or a typed rejection when it
    /// is missing or not allow-listed.
    pub fn check_extension(&self, path: &Path) -> Result<String, IngestionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if self.extensions.iter().any(|allowed| *allowed == extension) {
            Ok(extension)
        } else {
            Err(IngestionError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            })
        }
    }

    /// Decode the file at `path` into a canonical waveform.
    pub fn load_file(&self, path: &Path) -> Result<Waveform, IngestionError> {
        let extension = self.check_extension(path)?;
        let file = File::open(path).map_err(|source| IngestionError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = decode(Box::new(file), &extension, path)?;
        self.normalise(decoded, path)
    }

    /// Decode an in-memory upload; `name` supplies the extension hint and is
    /// used in error messages.
    pub fn load_bytes(&self, bytes: Vec<u8>, name: &str) -> Result<Waveform, IngestionError> {
        let label = Path::new(name);
        let extension = self.check_extension(label)?;
        let decoded = decode(Box::new(Cursor::new(bytes)), &extension, label)?;
        self.normalise(decoded, label)
    }

    fn normalise(&self, decoded: Decoded, label: &Path) -> Result<Waveform, IngestionError> {
        let mono = downmix_to_mono(&decoded.samples, decoded.channels);
        let samples = resample(&mono, decoded.sample_rate, self.target_sample_rate).map_err(
            |source| IngestionError::Resample {
                path: label.to_path_buf(),
                source,
            },
        )?;

        log::debug!(
            "ingested {}: {} Hz x{} -> {} samples @ {} Hz",
            label.display(),
            decoded.sample_rate,
            decoded.channels,
            samples.len(),
            self.target_sample_rate
        );

        Ok(Waveform::new(samples, self.target_sample_rate))
    }
}

// ---------------------------------------------------------------------------
// symphonia decode
// ---------------------------------------------------------------------------

fn decode(
    source: Box<dyn MediaSource>,
    extension: &str,
    label: &Path,
) -> Result<Decoded, IngestionError> {
    let mss = MediaSourceStream::new(source, Default::default());
    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| IngestionError::Probe {
            path: label.to_path_buf(),
            message: e.to_string(),
        })?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| IngestionError::NoTrack(label.to_path_buf()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| IngestionError::Codec {
            path: label.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(IngestionError::Decode {
                    path: label.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("skipping corrupt packet in {}: {msg}", label.display());
                continue;
            }
            Err(e) => {
                return Err(IngestionError::Decode {
                    path: label.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };

        let spec = *audio_buf.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(IngestionError::Empty(label.to_path_buf()));
    }

    Ok(Decoded {
        samples,
        sample_rate,
        channels,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
