//! PNG preview of a mel spectrogram for human inspection.
//!
//! Time runs left to right and the lowest mel band is the bottom row.  Values
//! are normalised between the spectrogram's minimum and maximum and mapped
//! through a magma-like palette.  Rendering is independent of the tensor
//! artifact: a failure here is logged by the caller and nothing else changes.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use super::MelSpectrogram;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render: spectrogram is {rows}x{cols}")]
    Empty { rows: usize, cols: usize },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("cannot write preview {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Longest image side in pixels; longer recordings are decimated in time.
pub const MAX_PREVIEW_SIDE: u32 = 4096;

/// Palette anchors from dark purple through red to pale yellow.
const PALETTE: [[u8; 3]; 6] = [
    [0, 0, 4],
    [59, 15, 112],
    [140, 41, 129],
    [222, 73, 104],
    [254, 159, 109],
    [252, 253, 191],
];

fn colour(t: f32) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (PALETTE.len() - 1) as f32;
    let i = (pos.floor() as usize).min(PALETTE.len() - 2);
    let frac = pos - i as f32;
    let (a, b) = (PALETTE[i], PALETTE[i + 1]);
    let lerp = |c: usize| (a[c] as f32 + (b[c] as f32 - a[c] as f32) * frac).round() as u8;
    Rgb([lerp(0), lerp(1), lerp(2)])
}

/// Rasterise `spec` with `scale × scale` pixels per cell.
///
/// Each side is capped at [`MAX_PREVIEW_SIDE`]; past that, cells are sampled
/// rather than repeated.
pub fn render_image(spec: &MelSpectrogram, scale: u32) -> Result<RgbImage, RenderError> {
    let [rows, cols] = spec.shape();
    if rows == 0 || cols == 0 {
        return Err(RenderError::Empty { rows, cols });
    }
    let scale = u64::from(scale.max(1));
    let side = |cells: usize| {
        (cells as u64)
            .saturating_mul(scale)
            .min(u64::from(MAX_PREVIEW_SIDE))
    };
    let (width, height) = (side(cols), side(rows));

    let lo = spec.min().unwrap_or(0.0);
    let hi = spec.max().unwrap_or(0.0);
    let range = if hi > lo { hi - lo } else { 1.0 };

    let mut img = RgbImage::new(width as u32, height as u32);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let frame = (u64::from(x) * cols as u64 / width) as usize;
        // Row 0 of the image is the highest band.
        let mel = rows - 1 - (u64::from(y) * rows as u64 / height) as usize;
        let value = spec.get(mel, frame).unwrap_or(lo);
        *pixel = colour((value - lo) / range);
    }
    Ok(img)
}

/// Encode the preview as PNG bytes.
pub fn encode_preview(spec: &MelSpectrogram, scale: u32) -> Result<Vec<u8>, RenderError> {
    let img = render_image(spec, scale)?;
    let mut png_bytes: Vec<u8> = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}

/// Render and write the preview PNG to `path`.
pub fn render_preview(spec: &MelSpectrogram, path: &Path, scale: u32) -> Result<(), RenderError> {
    let png_bytes = encode_preview(spec, scale)?;
    std::fs::write(path, png_bytes).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}
