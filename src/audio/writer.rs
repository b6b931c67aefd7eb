//! Canonical WAV output: mono, 16-bit PCM, target sample rate.
//!
//! The file is encoded into a temporary file in the destination directory and
//! renamed over the destination once complete, so a failed write never leaves
//! a partial artifact behind.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::Waveform;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("waveform is {actual} Hz, expected {expected} Hz")]
    SampleRate { expected: u32, actual: u32 },

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WAV encoding failed for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Writes waveforms as mono 16-bit PCM WAV at a fixed sample rate.
#[derive(Debug, Clone, Copy)]
pub struct WaveformWriter {
    sample_rate: u32,
}

impl WaveformWriter {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Write `waveform` to `dest`, replacing any existing file.
    ///
    /// The parent directory must already exist.
    pub fn write(&self, waveform: &Waveform, dest: &Path) -> Result<(), WriteError> {
        if waveform.sample_rate() != self.sample_rate {
            return Err(WriteError::SampleRate {
                expected: self.sample_rate,
                actual: waveform.sample_rate(),
            });
        }

        let io_err = |source| WriteError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let encode_err = |source| WriteError::Encode {
            path: dest.to_path_buf(),
            source,
        };

        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".speech-etl-")
            .suffix(".wav.tmp")
            .tempfile_in(dir)
            .map_err(io_err)?;

        {
            let mut writer = hound::WavWriter::new(BufWriter::new(tmp.as_file_mut()), self.spec())
                .map_err(encode_err)?;
            for &sample in waveform.samples() {
                writer.write_sample(to_pcm16(sample)).map_err(encode_err)?;
            }
            writer.finalize().map_err(encode_err)?;
        }

        tmp.persist(dest).map_err(|e| io_err(e.error))?;
        log::debug!(
            "wrote {} ({:.2}s)",
            dest.display(),
            waveform.duration_secs()
        );
        Ok(())
    }
}

fn to_pcm16(sample: f32) -> i16 {
    let s = if sample.is_finite() { sample } else { 0.0 };
    (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
