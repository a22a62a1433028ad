// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Equalization algorithms: global histogram equalization and tile-based
// contrast-limited adaptive equalization (which also covers plain AHE).

pub mod clahe;
pub mod global;

pub use clahe::{clahe, clip_histogram};
pub use global::{equalization_lut, equalize_histogram};

use image::GrayImage;

/// Lookup table mapping each input intensity to an output intensity.
pub type Lut = [u8; 256];

/// Lookup table that leaves every intensity unchanged.
pub fn identity_lut() -> Lut {
    std::array::from_fn(|level| level as u8)
}

/// Apply a lookup table to every pixel, producing a new image.
pub fn apply_lut(image: &GrayImage, lut: &Lut) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    output
}
