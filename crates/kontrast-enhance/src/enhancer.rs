// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The Enhancer: applies the selected equalization to a grayscale matrix and
// derives the before/after histograms.

use image::GrayImage;
use kontrast_core::error::{KontrastError, Result};
use kontrast_core::{EnhanceParams, Method};
use tracing::{info, instrument};

use crate::codec::decode_grayscale;
use crate::equalize::{clahe, equalize_histogram};
use crate::histogram::Histogram;

/// Output of one enhancement.
#[derive(Debug, Clone)]
pub struct EnhancementResult {
    /// Method that produced `image`.
    pub method: Method,
    /// The enhanced matrix, same dimensions as the input.
    pub image: GrayImage,
    /// Histogram of the input matrix.
    pub original_histogram: Histogram,
    /// Histogram of the enhanced matrix.
    pub enhanced_histogram: Histogram,
}

/// Contrast enhancer.
///
/// Holds only its tunables; every call is a pure function of its inputs, so
/// a single instance can be shared freely between worker threads.
#[derive(Debug, Clone, Default)]
pub struct Enhancer {
    params: EnhanceParams,
}

impl Enhancer {
    pub fn new(params: EnhanceParams) -> Self {
        Self { params }
    }

    /// Enhance `image` with `method`.
    ///
    /// Fails with [`KontrastError::Decode`] for an image without pixels.
    #[instrument(skip(self, image), fields(method = %method, width = image.width(), height = image.height()))]
    pub fn enhance(&self, image: &GrayImage, method: Method) -> Result<EnhancementResult> {
        if image.width() == 0 || image.height() == 0 {
            return Err(KontrastError::Decode("image has no pixels".into()));
        }

        let grid = (self.params.tile_cols, self.params.tile_rows);
        let enhanced = match method {
            Method::HistogramEqualization => equalize_histogram(image),
            Method::AdaptiveHe => clahe(image, grid.0, grid.1, self.params.ahe_clip_factor),
            Method::Clahe => clahe(image, grid.0, grid.1, self.params.clahe_clip_factor),
        };

        let original_histogram = Histogram::from_image(image);
        let enhanced_histogram = Histogram::from_image(&enhanced);

        info!(
            levels_before = original_histogram.occupied_levels(),
            levels_after = enhanced_histogram.occupied_levels(),
            "Enhancement complete"
        );

        Ok(EnhancementResult {
            method,
            image: enhanced,
            original_histogram,
            enhanced_histogram,
        })
    }

    /// Parse `method`, decode `data`, then enhance.
    ///
    /// The method is checked first so an invalid selector is reported
    /// without touching the image bytes.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn enhance_bytes(&self, data: &[u8], method: &str) -> Result<EnhancementResult> {
        let method: Method = method.parse()?;
        let image = decode_grayscale(data)?;
        self.enhance(&image, method)
    }
}
