// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalization (CLAHE).
//
// The image is split into a grid of tiles. Each tile gets its own
// equalization table built from a clipped local histogram, and every output
// pixel blends the tables of the four nearest tile centres bilinearly so tile
// borders do not show. Plain AHE is the same algorithm with a lower clip
// factor.

use image::{GrayImage, Luma};
use tracing::debug;

use super::Lut;
use crate::histogram::{Histogram, LEVELS};

/// Clip every bin above `limit` and spread the excess over all bins.
///
/// The excess is divided evenly across the 256 bins; whatever does not
/// divide evenly is handed out one count at a time at a regular stride. The
/// total count is preserved.
pub fn clip_histogram(counts: &mut [u64; LEVELS], limit: u64) {
    let mut excess = 0u64;
    for count in counts.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }
    if excess == 0 {
        return;
    }

    let batch = excess / LEVELS as u64;
    let mut residual = excess - batch * LEVELS as u64;
    for count in counts.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (LEVELS as u64 / residual).max(1) as usize;
        for count in counts.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *count += 1;
            residual -= 1;
        }
    }
}

/// Per-tile clip limit for a clip factor, or `None` when clipping is off.
///
/// The factor is relative to a perfectly flat histogram: a factor of 3.0
/// lets a bin hold three times the tile's average bin count.
fn clip_limit(clip_factor: f32, tile_pixels: u64) -> Option<u64> {
    if clip_factor <= 0.0 {
        return None;
    }
    let limit = (clip_factor as f64 * tile_pixels as f64 / LEVELS as f64) as u64;
    Some(limit.max(1))
}

/// Build one tile's equalization table from its histogram.
fn tile_lut(hist: &Histogram, clip_factor: f32) -> Lut {
    let tile_pixels = hist.total();
    let mut lut = [0u8; LEVELS];
    if tile_pixels == 0 {
        return lut;
    }

    let mut counts = *hist.counts();
    if let Some(limit) = clip_limit(clip_factor, tile_pixels) {
        clip_histogram(&mut counts, limit);
    }

    let scale = 255.0 / tile_pixels as f64;
    let mut running = 0u64;
    for (slot, &count) in lut.iter_mut().zip(counts.iter()) {
        running += count;
        *slot = (running as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Pixel span `[start, end)` of tile `index` when `len` pixels are split
/// into `count` tiles. Spans differ in length by at most one pixel.
fn tile_span(index: u32, count: u32, len: u32) -> (u32, u32) {
    let start = (index as u64 * len as u64 / count as u64) as u32;
    let end = ((index as u64 + 1) * len as u64 / count as u64) as u32;
    (start, end)
}

/// Interpolation neighbours along one axis: the two tile indices whose
/// centres bracket each pixel, and the weight of the second one.
fn axis_weights(len: u32, tiles: u32) -> Vec<(usize, usize, f32)> {
    let tile_len = len as f32 / tiles as f32;
    (0..len)
        .map(|pos| {
            let t = (pos as f32 + 0.5) / tile_len - 0.5;
            let lower = t.floor();
            let weight = t - lower;
            let lower = lower as i64;
            let first = lower.max(0) as usize;
            let second = (lower + 1).min(tiles as i64 - 1).max(0) as usize;
            (first, second, weight)
        })
        .collect()
}

/// Run CLAHE over `image` with a `tile_cols x tile_rows` grid.
///
/// The grid is reduced so that no tile is narrower than one pixel. A clip
/// factor of zero or less disables clipping (unlimited AHE).
pub fn clahe(image: &GrayImage, tile_cols: u32, tile_rows: u32, clip_factor: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let cols = tile_cols.clamp(1, width);
    let rows = tile_rows.clamp(1, height);

    let mut luts: Vec<Lut> = Vec::with_capacity((cols * rows) as usize);
    for ty in 0..rows {
        let (y0, y1) = tile_span(ty, rows, height);
        for tx in 0..cols {
            let (x0, x1) = tile_span(tx, cols, width);
            let hist = Histogram::from_region(image, x0, y0, x1, y1);
            luts.push(tile_lut(&hist, clip_factor));
        }
    }

    debug!(cols, rows, clip_factor, "Tile equalization tables built");

    let x_weights = axis_weights(width, cols);
    let y_weights = axis_weights(height, rows);
    let cols = cols as usize;

    let mut output = GrayImage::new(width, height);
    for (y, &(ty1, ty2, ya)) in y_weights.iter().enumerate() {
        for (x, &(tx1, tx2, xa)) in x_weights.iter().enumerate() {
            let value = image.get_pixel(x as u32, y as u32).0[0] as usize;

            let top_left = luts[ty1 * cols + tx1][value] as f32;
            let top_right = luts[ty1 * cols + tx2][value] as f32;
            let bottom_left = luts[ty2 * cols + tx1][value] as f32;
            let bottom_right = luts[ty2 * cols + tx2][value] as f32;

            let top = top_left * (1.0 - xa) + top_right * xa;
            let bottom = bottom_left * (1.0 - xa) + bottom_right * xa;
            let blended = top * (1.0 - ya) + bottom * ya;

            output.put_pixel(x as u32, y as u32, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_contrast(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([(110 + (x * 3 + y * 5) % 24) as u8]))
    }

    #[test]
    fn clipping_preserves_total() {
        let mut counts = [0u64; LEVELS];
        counts[10] = 900;
        counts[11] = 50;
        counts[200] = 74;
        let before: u64 = counts.iter().sum();

        clip_histogram(&mut counts, 12);

        assert_eq!(counts.iter().sum::<u64>(), before);
        assert!(counts.iter().all(|&c| c <= 12 + before / LEVELS as u64 + 1));
    }

    #[test]
    fn clipping_below_limit_is_noop() {
        let mut counts = [3u64; LEVELS];
        let before = counts;
        clip_histogram(&mut counts, 3);
        assert_eq!(counts, before);
    }

    #[test]
    fn residual_is_spread_at_stride() {
        let mut counts = [0u64; LEVELS];
        counts[0] = 5 + 4;
        clip_histogram(&mut counts, 5);
        // Four excess counts land on bins 0, 64, 128 and 192.
        assert_eq!(counts[0], 6);
        assert_eq!(counts[64], 1);
        assert_eq!(counts[128], 1);
        assert_eq!(counts[192], 1);
        assert_eq!(counts.iter().sum::<u64>(), 9);
    }

    #[test]
    fn clip_limit_is_at_least_one() {
        assert_eq!(clip_limit(2.0, 16), Some(1));
        assert_eq!(clip_limit(3.0, 1024), Some(12));
        assert_eq!(clip_limit(0.0, 1024), None);
    }

    #[test]
    fn tile_lut_is_monotone() {
        let img = low_contrast(40, 40);
        let lut = tile_lut(&Histogram::from_image(&img), 3.0);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn tile_spans_cover_the_axis() {
        let spans: Vec<_> = (0..8).map(|i| tile_span(i, 8, 61)).collect();
        assert_eq!(spans[0].0, 0);
        assert_eq!(spans[7].1, 61);
        assert!(spans.windows(2).all(|w| w[0].1 == w[1].0));
        assert!(spans.iter().all(|(s, e)| e > s));
    }

    #[test]
    fn preserves_dimensions_for_odd_sizes() {
        for (w, h) in [(37, 23), (64, 64), (9, 100), (1, 1)] {
            let img = low_contrast(w, h);
            let out = clahe(&img, 8, 8, 3.0);
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn grid_larger_than_image_is_reduced() {
        let img = GrayImage::from_raw(3, 2, vec![10, 20, 30, 40, 50, 60]).unwrap();
        let out = clahe(&img, 8, 8, 2.0);
        assert_eq!(out.dimensions(), (3, 2));
    }

    #[test]
    fn constant_image_stays_constant() {
        let img = GrayImage::from_pixel(48, 32, Luma([90u8]));
        let out = clahe(&img, 8, 8, 3.0);
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn widens_low_contrast_range() {
        let img = low_contrast(64, 64);
        let out = clahe(&img, 8, 8, 3.0);
        let before = Histogram::from_image(&img);
        let after = Histogram::from_image(&out);

        let range = |h: &Histogram| {
            let lo = h.first_nonzero().unwrap() as i32;
            let hi = (0..=255u8).rev().find(|&l| h.count(l) > 0).unwrap() as i32;
            hi - lo
        };
        assert!(range(&after) > range(&before));
        assert_eq!(after.total(), before.total());
    }

    #[test]
    fn huge_clip_factor_matches_unclipped() {
        let img = low_contrast(32, 32);
        let unclipped = clahe(&img, 4, 4, 0.0);
        let loose = clahe(&img, 4, 4, 256.0);
        assert_eq!(unclipped, loose);
    }
}
