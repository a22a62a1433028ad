// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kontrast-enhance — Contrast enhancement for 8-bit grayscale images.
//
// Provides 256-bin histograms, global histogram equalization, tile-based
// CLAHE (plain AHE is CLAHE with a lower clip factor), grayscale decoding and
// encoding, and a histogram plot rasterizer.

pub mod codec;
pub mod enhancer;
pub mod equalize;
pub mod histogram;
pub mod plot;

// Re-export the primary items so callers can use `kontrast_enhance::Enhancer` etc.
pub use codec::{OutputFormat, decode_grayscale, encode};
pub use enhancer::{EnhancementResult, Enhancer};
pub use histogram::Histogram;
pub use plot::render_histogram;
