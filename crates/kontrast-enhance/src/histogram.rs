// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 256-bin intensity histograms over whole images or rectangular regions.

use image::GrayImage;

/// Number of intensity levels in an 8-bit grayscale image.
pub const LEVELS: usize = 256;

/// Pixel counts per intensity level.
///
/// `counts[v]` is the number of pixels with intensity `v`. The counts always
/// sum to the pixel count of the region the histogram was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: [u64; LEVELS],
}

impl Histogram {
    /// Count every pixel of `image` in one pass.
    pub fn from_image(image: &GrayImage) -> Self {
        let mut counts = [0u64; LEVELS];
        for &value in image.as_raw() {
            counts[value as usize] += 1;
        }
        Self { counts }
    }

    /// Count the pixels in `[x0, x1) x [y0, y1)`, clamped to the image.
    pub fn from_region(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        let (width, height) = image.dimensions();
        let x1 = x1.min(width);
        let y1 = y1.min(height);
        let mut counts = [0u64; LEVELS];

        let stride = width as usize;
        let raw = image.as_raw();
        for y in y0.min(y1)..y1 {
            let row = y as usize * stride;
            for &value in &raw[row + x0.min(x1) as usize..row + x1 as usize] {
                counts[value as usize] += 1;
            }
        }
        Self { counts }
    }

    /// Wrap precomputed counts.
    pub fn from_counts(counts: [u64; LEVELS]) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &[u64; LEVELS] {
        &self.counts
    }

    /// Number of pixels at `level`.
    pub fn count(&self, level: u8) -> u64 {
        self.counts[level as usize]
    }

    /// Total number of pixels counted.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Largest single-bin count (0 for an empty histogram).
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Lowest occupied intensity level, if any pixel was counted.
    pub fn first_nonzero(&self) -> Option<u8> {
        self.counts.iter().position(|&c| c > 0).map(|level| level as u8)
    }

    /// Cumulative distribution: `cdf[v]` is the number of pixels with
    /// intensity `<= v`.
    pub fn cdf(&self) -> [u64; LEVELS] {
        let mut cdf = [0u64; LEVELS];
        let mut running = 0u64;
        for (slot, &count) in cdf.iter_mut().zip(self.counts.iter()) {
            running += count;
            *slot = running;
        }
        cdf
    }

    /// Number of distinct occupied levels.
    pub fn occupied_levels(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}
