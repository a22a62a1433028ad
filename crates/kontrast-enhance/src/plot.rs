// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Histogram plot rasterizer. Draws a 256-bar intensity histogram with a
// title, axis titles and tick labels into a PNG using `imageproc`'s drawing
// primitives and an embedded DejaVu Sans font.

use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgb, RgbImage, imageops};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use kontrast_core::error::{KontrastError, Result};
use tracing::instrument;

use crate::codec::encode_png;
use crate::histogram::{Histogram, LEVELS};

/// DejaVu Sans (Bitstream Vera license, see `assets/DejaVuSans-LICENSE.txt`).
static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Canvas size, matching a 6.4 x 4.8 inch figure at 100 dpi.
pub const PLOT_WIDTH: u32 = 640;
pub const PLOT_HEIGHT: u32 = 480;

// Plot area inside the canvas.
const AREA_LEFT: u32 = 80;
const AREA_RIGHT: u32 = 576;
const AREA_TOP: u32 = 58;
const AREA_BOTTOM: u32 = 427;

/// Fraction of the plot height the tallest bar reaches.
const HEADROOM: f64 = 0.95;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([176, 176, 176]);
/// Black at 70% opacity over white.
const BAR: Rgb<u8> = Rgb([77, 77, 77]);

/// Intensity values with a vertical grid line and a tick label.
const X_TICKS: [u32; 6] = [0, 50, 100, 150, 200, 250];
/// Number of horizontal grid divisions.
const Y_DIVISIONS: u32 = 5;

const TITLE: &str = "Histogram";
const X_LABEL: &str = "Pixel Intensity";
const Y_LABEL: &str = "Frequency";

const TITLE_SCALE: f32 = 20.0;
const LABEL_SCALE: f32 = 15.0;
const TICK_SCALE: f32 = 12.0;

/// Gap between a tick label and the frame.
const TICK_GAP: i32 = 6;

fn load_font() -> Result<FontRef<'static>> {
    FontRef::try_from_slice(FONT_BYTES)
        .map_err(|e| KontrastError::Encode(format!("embedded plot font: {e}")))
}

/// Draw `text` with its horizontal centre at `cx` and its top edge at `y`.
fn draw_centered(canvas: &mut RgbImage, font: &FontRef<'_>, scale: f32, cx: i32, y: i32, text: &str) {
    let scale = PxScale::from(scale);
    let (w, _) = text_size(scale, font, text);
    draw_text_mut(canvas, TEXT, cx - w as i32 / 2, y, scale, font, text);
}

/// Draw `text` rotated a quarter turn counter-clockwise (reading bottom-up),
/// centred vertically on `cy` with its left edge at `x`.
fn draw_vertical(canvas: &mut RgbImage, font: &FontRef<'_>, scale: f32, x: i64, cy: i64, text: &str) {
    let scale = PxScale::from(scale);
    let (w, h) = text_size(scale, font, text);
    let mut label = RgbImage::from_pixel(w as u32 + 2, h as u32 + 4, BACKGROUND);
    draw_text_mut(&mut label, TEXT, 1, 0, scale, font, text);
    let rotated = imageops::rotate270(&label);
    imageops::overlay(canvas, &rotated, x, cy - rotated.height() as i64 / 2);
}

/// Tick label for a bin count, shortened for large values.
fn count_label(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 10_000.0 {
        format!("{:.0}k", value / 1_000.0)
    } else {
        format!("{value:.0}")
    }
}

/// Draw `hist` as a labelled bar chart.
pub fn draw_histogram(hist: &Histogram) -> Result<RgbImage> {
    let font = load_font()?;
    let mut canvas = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, BACKGROUND);

    let area_w = AREA_RIGHT - AREA_LEFT;
    let area_h = AREA_BOTTOM - AREA_TOP;

    for tick in X_TICKS {
        let x = (AREA_LEFT + tick * area_w / LEVELS as u32) as f32;
        draw_line_segment_mut(&mut canvas, (x, AREA_TOP as f32), (x, AREA_BOTTOM as f32), GRID);
    }
    for step in 1..Y_DIVISIONS {
        let y = (AREA_BOTTOM - step * area_h / Y_DIVISIONS) as f32;
        draw_line_segment_mut(&mut canvas, (AREA_LEFT as f32, y), (AREA_RIGHT as f32, y), GRID);
    }

    let max = hist.max_count();
    if max > 0 {
        for (level, &count) in hist.counts().iter().enumerate() {
            if count == 0 {
                continue;
            }
            let x0 = AREA_LEFT + level as u32 * area_w / LEVELS as u32;
            let x1 = AREA_LEFT + (level as u32 + 1) * area_w / LEVELS as u32;
            let bar_h = ((count as f64 / max as f64) * area_h as f64 * HEADROOM).round() as u32;
            if bar_h == 0 {
                continue;
            }
            let rect = Rect::at(x0 as i32, (AREA_BOTTOM - bar_h) as i32)
                .of_size((x1 - x0).max(1), bar_h);
            draw_filled_rect_mut(&mut canvas, rect, BAR);
        }
    }

    let frame = Rect::at(AREA_LEFT as i32, AREA_TOP as i32).of_size(area_w + 1, area_h + 1);
    draw_hollow_rect_mut(&mut canvas, frame, FRAME);

    // Labels.
    let center_x = ((AREA_LEFT + AREA_RIGHT) / 2) as i32;
    draw_centered(&mut canvas, &font, TITLE_SCALE, center_x, 24, TITLE);

    for tick in X_TICKS {
        let x = (AREA_LEFT + tick * area_w / LEVELS as u32) as i32;
        draw_centered(
            &mut canvas,
            &font,
            TICK_SCALE,
            x,
            AREA_BOTTOM as i32 + TICK_GAP,
            &tick.to_string(),
        );
    }
    draw_centered(&mut canvas, &font, LABEL_SCALE, center_x, AREA_BOTTOM as i32 + 26, X_LABEL);

    if max > 0 {
        // The axis top corresponds to max / HEADROOM.
        let axis_top = max as f64 / HEADROOM;
        let scale = PxScale::from(TICK_SCALE);
        for step in 0..=Y_DIVISIONS {
            let label = count_label(axis_top * step as f64 / Y_DIVISIONS as f64);
            let (w, h) = text_size(scale, &font, &label);
            let y = (AREA_BOTTOM - step * area_h / Y_DIVISIONS) as i32 - h as i32 / 2;
            let x = AREA_LEFT as i32 - TICK_GAP - w as i32;
            draw_text_mut(&mut canvas, TEXT, x, y, scale, &font, &label);
        }
    }
    draw_vertical(
        &mut canvas,
        &font,
        LABEL_SCALE,
        6,
        ((AREA_TOP + AREA_BOTTOM) / 2) as i64,
        Y_LABEL,
    );

    Ok(canvas)
}

/// Draw `hist` and encode it as PNG bytes.
#[instrument(skip(hist), fields(total = hist.total()))]
pub fn render_histogram(hist: &Histogram) -> Result<Vec<u8>> {
    encode_png(&DynamicImage::ImageRgb8(draw_histogram(hist)?))
}
