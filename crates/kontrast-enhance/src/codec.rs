// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image decoding to 8-bit grayscale and encoding of enhanced images, using
// the `image` crate.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat};
use kontrast_core::error::{KontrastError, Result};
use tracing::{debug, instrument};

/// Decode raw bytes (PNG, JPEG, BMP, TIFF, ...) into a grayscale matrix.
///
/// Colour images are converted to luma, the same way the upload form has
/// always treated them.
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode_grayscale(data: &[u8]) -> Result<GrayImage> {
    let image = image::load_from_memory(data)
        .map_err(|err| KontrastError::Decode(format!("failed to decode image: {err}")))?;
    let gray = image.into_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(KontrastError::Decode("image has no pixels".into()));
    }
    debug!(width = gray.width(), height = gray.height(), "Image decoded to grayscale");
    Ok(gray)
}

/// Container format the enhanced image is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Bmp,
    Tiff,
    Gif,
}

impl OutputFormat {
    /// Pick the format from an uploaded filename's extension, so the
    /// processed image keeps the upload's format. Unknown or missing
    /// extensions fall back to PNG.
    pub fn from_filename(filename: &str) -> Self {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "bmp" => Self::Bmp,
            "tif" | "tiff" => Self::Tiff,
            "gif" => Self::Gif,
            _ => Self::Png,
        }
    }

    /// File extension written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

/// Encode a grayscale image in the given format.
pub fn encode(image: &GrayImage, format: OutputFormat) -> Result<Vec<u8>> {
    // The GIF encoder only takes RGB(A) input.
    let dynamic = match format {
        OutputFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageLuma8(image.clone()).to_rgba8()),
        _ => DynamicImage::ImageLuma8(image.clone()),
    };
    encode_dynamic(&dynamic, format.image_format())
}

/// Encode any `DynamicImage` as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    encode_dynamic(image, ImageFormat::Png)
}

fn encode_dynamic(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| KontrastError::Encode(format!("{format:?} encoding failed: {err}")))?;
    Ok(buffer)
}
