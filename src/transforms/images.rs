//! Image chain: lossless PNG optimisation, JPEG recompression, SVG cleanup
//!
//! Whichever of the original and the recompressed bytes is smaller is
//! written, so an image never grows. GIFs are copied unchanged.

use super::markup::minify_svg_markup;
use super::{Artifact, SourceFile, Transform, TransformError};
use crate::settings::ImageOptions;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat};
use std::path::{Path, PathBuf};

/// Image formats the chain distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Portable Network Graphics
    Png,
    /// JPEG
    Jpeg,
    /// Scalable Vector Graphics
    Svg,
    /// GIF, passed through
    Gif,
}

impl ImageKind {
    /// Detect the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "svg" => Some(ImageKind::Svg),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }
}

/// Recompresses images in place (same relative path).
#[derive(Debug, Clone, Copy)]
pub struct ImageTransform {
    options: ImageOptions,
}

impl ImageTransform {
    /// Create the chain.
    pub fn new(options: ImageOptions) -> Self {
        Self { options }
    }

    /// Optimise one image, returning the bytes to write.
    pub fn optimize(&self, kind: ImageKind, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let candidate = match kind {
            ImageKind::Png => optimize_png(data, self.options.png_preset)?,
            ImageKind::Jpeg if has_orientation_or_profile(data) => return Ok(data.to_vec()),
            ImageKind::Jpeg => recompress_jpeg(data, self.options.jpeg_quality)?,
            ImageKind::Svg => minify_svg(data)?,
            ImageKind::Gif => return Ok(data.to_vec()),
        };

        if candidate.len() < data.len() {
            tracing::debug!("{:?}: {} -> {} bytes", kind, data.len(), candidate.len());
            Ok(candidate)
        } else {
            Ok(data.to_vec())
        }
    }
}

impl Transform for ImageTransform {
    fn outputs(&self, relative: &Path) -> Vec<PathBuf> {
        vec![relative.to_path_buf()]
    }

    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError> {
        let contents = match ImageKind::from_path(&source.path) {
            Some(kind) => self.optimize(kind, &source.contents)?,
            None => source.contents.clone(),
        };
        Ok(vec![Artifact::new(source.relative.clone(), contents)])
    }
}

fn optimize_png(data: &[u8], preset: u8) -> Result<Vec<u8>, TransformError> {
    let options = oxipng::Options::from_preset(preset.min(6));
    oxipng::optimize_from_memory(data, &options).map_err(|e| TransformError::Image(e.to_string()))
}

/// Whether a JPEG carries an Exif (APP1) or ICC profile (APP2) segment.
///
/// Re-encoding drops both, which would rotate or recolour the image, so such
/// files are kept as they are.
fn has_orientation_or_profile(data: &[u8]) -> bool {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return false;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return false;
        }
        let marker = data[pos + 1];
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // start of scan or end of image: no more headers
            0xDA | 0xD9 => return false,
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let length = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        let end = (pos + 2 + length).min(data.len());
        let payload = data.get(pos + 4..end).unwrap_or_default();
        match marker {
            0xE1 if payload.starts_with(b"Exif\0\0") => return true,
            0xE2 if payload.starts_with(b"ICC_PROFILE\0") => return true,
            _ => {}
        }
        if length < 2 {
            return false;
        }
        pos += 2 + length;
    }
    false
}

fn recompress_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>, TransformError> {
    let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| TransformError::Image(e.to_string()))?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| TransformError::Image(e.to_string()))?;
    Ok(out)
}

/// Strip comments and inter-element whitespace from an SVG document.
fn minify_svg(data: &[u8]) -> Result<Vec<u8>, TransformError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| TransformError::Image("SVG is not valid UTF-8".to_string()))?;
    Ok(minify_svg_markup(text).into_bytes())
}
