//! `.npy` (format version 1.0) persistence for mel spectrograms.
//!
//! Layout: magic `\x93NUMPY`, version `1 0`, little-endian `u16` header
//! length, an ASCII dict header padded with spaces and terminated by `\n` so
//! the data starts on a 64-byte boundary, then `f32` little-endian values in
//! C (row-major) order.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::MelSpectrogram;

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;

#[derive(Debug, Error)]
pub enum TensorError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a supported .npy file: {reason}")]
    Format { path: PathBuf, reason: String },
}

/// Encode the header plus data into a byte vector.
pub fn encode_npy(spec: &MelSpectrogram) -> Vec<u8> {
    let [rows, cols] = spec.shape();
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}"
    );
    // magic(6) + version(2) + header_len(2) + header + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header.len() + spec.data().len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for &v in spec.data() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Write `spec` to `path` as a `float32` array of shape `(n_mels, n_frames)`.
///
/// Written to a temporary file next to `path` and renamed into place.
pub fn persist_tensor(spec: &MelSpectrogram, path: &Path) -> Result<(), TensorError> {
    let io_err = |source| TensorError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".speech-etl-")
        .suffix(".npy.tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        out.write_all(&encode_npy(spec)).map_err(io_err)?;
        out.flush().map_err(io_err)?;
    }
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Read a tensor written by [`persist_tensor`].
pub fn read_tensor(path: &Path) -> Result<MelSpectrogram, TensorError> {
    let bytes = std::fs::read(path).map_err(|source| TensorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_npy(&bytes).map_err(|reason| TensorError::Format {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse a version 1.0 little-endian `f4` C-order 2-D array.
pub fn decode_npy(bytes: &[u8]) -> Result<MelSpectrogram, String> {
    if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
        return Err("missing NUMPY magic".into());
    }
    let version = (bytes[6], bytes[7]);
    if version != (1, 0) {
        return Err(format!("unsupported version {}.{}", version.0, version.1));
    }
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = 10 + header_len;
    let header = bytes
        .get(10..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or("truncated header")?;

    if !header.contains("'descr': '<f4'") {
        return Err("dtype is not little-endian float32".into());
    }
    if !header.contains("'fortran_order': False") {
        return Err("fortran order is not supported".into());
    }
    let (rows, cols) = parse_shape(header).ok_or("cannot parse 2-D shape")?;

    let data = &bytes[data_start..];
    let expected = rows * cols * 4;
    if data.len() != expected {
        return Err(format!(
            "expected {expected} data bytes for ({rows}, {cols}), found {}",
            data.len()
        ));
    }

    let values = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    MelSpectrogram::from_parts(rows, cols, values).ok_or_else(|| "shape mismatch".to_string())
}

fn parse_shape(header: &str) -> Option<(usize, usize)> {
    let start = header.find("'shape': (")? + "'shape': (".len();
    let end = start + header[start..].find(')')?;
    let mut dims = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<usize>());
    let rows = dims.next()?.ok()?;
    let cols = dims.next()?.ok()?;
    if dims.next().is_some() {
        return None;
    }
    Some((rows, cols))
}
