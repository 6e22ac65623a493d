//! Photo normalization
//!
//! Decodes a photo, applies its EXIF orientation, crops the centered square,
//! downsizes it to the configured edge and re-encodes it as JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use thiserror::Error;

/// Normalization errors
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Unknown format or corrupt data (HEIC lands here too)
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Turns raw photo bytes into upload-ready bytes
///
/// Must be safe to call concurrently for independent inputs.
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError>;

    /// File extension of the normalized output, without the dot
    fn output_extension(&self) -> &'static str {
        "jpg"
    }
}

/// Centered square crop, re-encoded as JPEG
#[derive(Debug, Clone)]
pub struct SquareCropNormalizer {
    /// Longest output edge in pixels; 0 keeps the cropped size
    max_edge: u32,
    jpeg_quality: u8,
}

impl SquareCropNormalizer {
    pub fn new(max_edge: u32, jpeg_quality: u8) -> Self {
        Self {
            max_edge,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| NormalizeError::Decode(e.to_string()))?
            .into_decoder()
            .map_err(|e| NormalizeError::Decode(e.to_string()))?;

        // Missing or unreadable EXIF is not fatal
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        let mut image =
            DynamicImage::from_decoder(decoder).map_err(|e| NormalizeError::Decode(e.to_string()))?;
        image.apply_orientation(orientation);
        Ok(image)
    }
}

impl Default for SquareCropNormalizer {
    fn default() -> Self {
        Self::new(2048, 90)
    }
}

/// Crop the largest centered square, then shrink it to `max_edge`
pub fn square_crop(image: &DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;

    let cropped = image.crop_imm(x, y, side, side);
    if max_edge > 0 && side > max_edge {
        cropped.resize_exact(max_edge, max_edge, FilterType::Lanczos3)
    } else {
        cropped
    }
}

impl ImageNormalizer for SquareCropNormalizer {
    fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
        let image = Self::decode_oriented(bytes)?;
        let squared = square_crop(&image, self.max_edge);

        // JPEG has no alpha channel
        let rgb = squared.to_rgb8();
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| NormalizeError::Encode(e.to_string()))?;

        tracing::debug!(
            input_bytes = bytes.len(),
            output_bytes = out.len(),
            side = squared.width(),
            "Photo normalized"
        );
        Ok(out)
    }
}
