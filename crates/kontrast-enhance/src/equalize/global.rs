// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global histogram equalization.

use image::GrayImage;
use tracing::debug;

use super::{Lut, apply_lut, identity_lut};
use crate::histogram::Histogram;

/// Build the equalization lookup table for a histogram.
///
/// Level `v` maps to `round((cdf(v) - cdf_min) / (total - cdf_min) * 255)`,
/// where `cdf_min` is the count of the lowest occupied level. A histogram
/// with zero or one occupied level has no contrast to stretch and yields the
/// identity table.
pub fn equalization_lut(hist: &Histogram) -> Lut {
    let total = hist.total();
    let Some(first) = hist.first_nonzero() else {
        return identity_lut();
    };
    let cdf_min = hist.count(first);
    if cdf_min == total {
        return identity_lut();
    }

    let scale = 255.0 / (total - cdf_min) as f64;
    let cdf = hist.cdf();
    let mut lut = [0u8; 256];
    for (level, slot) in lut.iter_mut().enumerate() {
        let above_min = cdf[level].saturating_sub(cdf_min);
        *slot = (above_min as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Flatten the global intensity distribution of `image`.
pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let hist = Histogram::from_image(image);
    let lut = equalization_lut(&hist);
    debug!(
        occupied_levels = hist.occupied_levels(),
        "Global equalization table built"
    );
    apply_lut(image, &lut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn two_levels_spread_to_full_range() {
        let img = GrayImage::from_raw(2, 2, vec![10, 10, 200, 200]).unwrap();
        let out = equalize_histogram(&img);
        assert_eq!(out.as_raw(), &vec![0, 0, 255, 255]);

        let hist = Histogram::from_image(&out);
        assert_eq!(hist.count(0), 2);
        assert_eq!(hist.count(255), 2);
    }

    #[test]
    fn constant_image_is_unchanged() {
        let img = GrayImage::from_pixel(13, 9, Luma([77u8]));
        let out = equalize_histogram(&img);
        assert_eq!(out, img);
    }

    #[test]
    fn lut_is_monotone() {
        let img = GrayImage::from_fn(32, 32, |x, y| Luma([(60 + (x * y) % 90) as u8]));
        let lut = equalization_lut(&Histogram::from_image(&img));
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn lowest_level_maps_to_zero_highest_to_255() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([(100 + x) as u8]));
        let out = equalize_histogram(&img);
        let hist = Histogram::from_image(&out);
        assert_eq!(hist.first_nonzero(), Some(0));
        assert!(hist.count(255) > 0);
    }

    #[test]
    fn second_pass_is_near_idempotent() {
        let img = GrayImage::from_fn(64, 64, |x, y| Luma([(100 + (x + y) % 32) as u8]));
        let once = equalize_histogram(&img);
        let twice = equalize_histogram(&once);
        for (a, b) in once.as_raw().iter().zip(twice.as_raw()) {
            assert!((*a as i16 - *b as i16).abs() <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn preserves_dimensions() {
        let img = GrayImage::from_fn(31, 7, |x, y| Luma([(x * 8 + y) as u8]));
        let out = equalize_histogram(&img);
        assert_eq!(out.dimensions(), (31, 7));
    }
}
