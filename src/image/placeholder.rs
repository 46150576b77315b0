//! Placeholder canvas drawn in place of an image that failed to generate.

use crate::models::Dimensions;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

pub const BACKGROUND: Rgb<u8> = Rgb([30, 41, 59]);
pub const FOREGROUND: Rgb<u8> = Rgb([248, 113, 113]);

const GLYPH_SIZE: u32 = 8;
const SCALE: u32 = 2;
const LINE_PITCH: u32 = 35;
const MIN_MARGIN: u32 = 10;
const MAX_MESSAGE_CHARS: usize = 60;

/// Lines drawn on the canvas, top to bottom.
pub fn lines(message: &str) -> Vec<String> {
    let message: String = message
        .chars()
        .take(MAX_MESSAGE_CHARS)
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect();

    vec![
        "Generation Error".to_string(),
        String::new(),
        message,
        String::new(),
        "This may be due to:".to_string(),
        "- Rate limits (wait 5 min)".to_string(),
        "- Model availability".to_string(),
        "- API quota exhausted".to_string(),
    ]
}

pub fn render(dimensions: Dimensions, message: &str) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(dimensions.width, dimensions.height, BACKGROUND);

    let mut y = dimensions.height / 3;
    for line in lines(message) {
        let line_width = line.chars().count() as u32 * GLYPH_SIZE * SCALE;
        let x = (dimensions.width.saturating_sub(line_width) / 2).max(MIN_MARGIN);
        draw_line(&mut canvas, &line, x, y);
        y += LINE_PITCH;
    }

    canvas
}

fn draw_line(canvas: &mut RgbImage, line: &str, x: u32, y: u32) {
    for (index, ch) in line.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let origin_x = x + index as u32 * GLYPH_SIZE * SCALE;

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        let px = origin_x + col * SCALE + dx;
                        let py = y + row as u32 * SCALE + dy;
                        if px < canvas.width() && py < canvas.height() {
                            canvas.put_pixel(px, py, FOREGROUND);
                        }
                    }
                }
            }
        }
    }
}
