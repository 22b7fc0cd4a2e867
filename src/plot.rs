// This file contains the shared drawing utilities used by Votukit's plotting subcommands:
// font discovery, text helpers, colour constants and colour gradients.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::misc::quit_with_error;


pub static BACKGROUND_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);  // white
pub static TEXT_COLOUR: Rgb<u8> = Rgb([0, 0, 0]);              // black
pub static AXIS_COLOUR: Rgb<u8> = Rgb([0, 0, 0]);              // black
pub static GRID_COLOUR: Rgb<u8> = Rgb([211, 211, 211]);        // lightgrey

// One colour per aligner, in the order the files are given on the command line.
pub static SERIES_COLOURS: [Rgb<u8>; 3] = [
    Rgb([0, 0, 205]),    // mediumblue
    Rgb([178, 34, 34]),  // firebrick
    Rgb([34, 139, 34]),  // forestgreen
];

// Candidate locations for a usable TrueType font, checked in order.
static FONT_PATHS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
];


pub fn load_font() -> FontArc {
    for path in FONT_PATHS {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontArc::try_from_vec(data) {
                return font;
            }
        }
    }
    quit_with_error("no usable TrueType font found - install DejaVu or Liberation fonts");
}


pub fn new_canvas(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_pixel(width, height, BACKGROUND_COLOUR)
}


pub fn save_png(img: &RgbImage, filename: &Path) {
    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            crate::misc::create_dir(parent);
        }
    }
    if let Err(e) = img.save(filename) {
        quit_with_error(&format!("failed to save {}\n{}", filename.display(), e));
    }
}


pub fn calculate_text_width(text: &str, scale: PxScale, font: &FontArc) -> f32 {
    let scaled_font = font.as_scaled(scale);
    text.chars()
        .map(|c| {
            let glyph_id = scaled_font.glyph_id(c);
            scaled_font.h_advance(glyph_id)
        }).sum()
}


pub fn draw_text_centred(img: &mut RgbImage, colour: Rgb<u8>, centre_x: i32, y: i32,
                         scale: PxScale, font: &FontArc, text: &str) {
    let width = calculate_text_width(text, scale, font);
    draw_text_mut(img, colour, centre_x - (width / 2.0) as i32, y, scale, font, text);
}


pub fn draw_text_right_aligned(img: &mut RgbImage, colour: Rgb<u8>, right_x: i32, y: i32,
                               scale: PxScale, font: &FontArc, text: &str) {
    let width = calculate_text_width(text, scale, font);
    draw_text_mut(img, colour, right_x - width as i32, y, scale, font, text);
}


pub fn draw_vertical_text(img: &mut RgbImage, text: &str, x: u32, bottom_y: u32, scale: PxScale,
                          font: &FontArc) {
    // Draws text onto the image rotated 90 degrees counterclockwise. Does this by creating a temp
    // image with the text and then copying it over, pixel-by-pixel, with the appropriate
    // transformation.
    let width = calculate_text_width(text, scale, font).ceil() as u32 + 1;
    let height = scale.y.ceil() as u32 + 1;
    let (full_width, full_height) = (img.width(), img.height());
    let mut temp_img = ImageBuffer::from_pixel(width, height, BACKGROUND_COLOUR);
    draw_text_mut(&mut temp_img, TEXT_COLOUR, 0, 0, scale, font, text);
    for i in 0..width {
        let new_y = bottom_y.saturating_sub(i);
        if new_y >= full_height { continue; }
        for j in 0..height {
            let new_x = x + j;
            if new_x < full_width {
                let pixel = temp_img.get_pixel(i, j);
                if pixel != &BACKGROUND_COLOUR {
                    img.put_pixel(new_x, new_y, *pixel);
                }
            }
        }
    }
}


pub fn draw_legend(img: &mut RgbImage, entries: &[(String, Rgb<u8>)], x: i32, y: i32,
                   scale: PxScale, font: &FontArc) {
    // Draws a simple legend: a colour swatch followed by the series name, one row per entry.
    let row_height = (scale.y * 1.4) as i32;
    let swatch = (scale.y * 0.8) as i32;
    for (i, (name, colour)) in entries.iter().enumerate() {
        let row_y = y + i as i32 * row_height;
        let rect = Rect::at(x, row_y + (scale.y * 0.15) as i32)
            .of_size(swatch.max(1) as u32, swatch.max(1) as u32);
        draw_filled_rect_mut(img, rect, *colour);
        draw_text_mut(img, TEXT_COLOUR, x + swatch + (scale.y * 0.4) as i32, row_y, scale, font,
                      name);
    }
}


fn lerp_colour(a: Rgb<u8>, b: Rgb<u8>, t: f64) -> Rgb<u8> {
    let channel = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    Rgb([channel(a.0[0], b.0[0]), channel(a.0[1], b.0[1]), channel(a.0[2], b.0[2])])
}


fn gradient(anchors: &[(f64, Rgb<u8>)], value: f64) -> Rgb<u8> {
    let value = value.clamp(0.0, 1.0);
    for window in anchors.windows(2) {
        let (start, start_colour) = window[0];
        let (end, end_colour) = window[1];
        if value <= end {
            let t = if end > start { (value - start) / (end - start) } else { 0.0 };
            return lerp_colour(start_colour, end_colour, t);
        }
    }
    anchors.last().unwrap().1
}


pub fn viridis(value: f64) -> Rgb<u8> {
    // Anchor points sampled from the matplotlib viridis colour map.
    static ANCHORS: [(f64, Rgb<u8>); 5] = [
        (0.00, Rgb([68, 1, 84])),
        (0.25, Rgb([59, 82, 139])),
        (0.50, Rgb([33, 145, 140])),
        (0.75, Rgb([94, 201, 98])),
        (1.00, Rgb([253, 231, 37])),
    ];
    gradient(&ANCHORS, value)
}


pub fn mako(value: f64) -> Rgb<u8> {
    // Anchor points approximating the seaborn mako colour map (dark blue to pale mint).
    static ANCHORS: [(f64, Rgb<u8>); 5] = [
        (0.00, Rgb([13, 8, 33])),
        (0.35, Rgb([53, 70, 139])),
        (0.65, Rgb([55, 141, 143])),
        (0.85, Rgb([130, 200, 170])),
        (1.00, Rgb([222, 245, 229])),
    ];
    gradient(&ANCHORS, value)
}


pub fn draw_colour_scale(img: &mut RgbImage, colour_map: fn(f64) -> Rgb<u8>, x: i32, y: i32,
                         width: u32, height: u32, min_label: &str, max_label: &str,
                         scale: PxScale, font: &FontArc) {
    // Draws a vertical colour scale bar with the maximum value at the top.
    for row in 0..height {
        let value = 1.0 - row as f64 / height.saturating_sub(1).max(1) as f64;
        let colour = colour_map(value);
        let rect = Rect::at(x, y + row as i32).of_size(width, 1);
        draw_filled_rect_mut(img, rect, colour);
    }
    draw_text_mut(img, TEXT_COLOUR, x, y - (scale.y * 1.2) as i32, scale, font, max_label);
    draw_text_mut(img, TEXT_COLOUR, x, y + height as i32 + (scale.y * 0.2) as i32, scale, font,
                  min_label);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_colour() {
        let black = Rgb([0, 0, 0]);
        let white = Rgb([255, 255, 255]);
        assert_eq!(lerp_colour(black, white, 0.0), black);
        assert_eq!(lerp_colour(black, white, 1.0), white);
        assert_eq!(lerp_colour(black, white, 0.5), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(viridis(0.0), Rgb([68, 1, 84]));
        assert_eq!(viridis(1.0), Rgb([253, 231, 37]));
        assert_eq!(viridis(-1.0), viridis(0.0));   // out-of-range values clamp
        assert_eq!(viridis(2.0), viridis(1.0));
    }

    #[test]
    fn test_mako_endpoints() {
        assert_eq!(mako(0.0), Rgb([13, 8, 33]));
        assert_eq!(mako(1.0), Rgb([222, 245, 229]));
    }

    #[test]
    fn test_gradient_midpoints_move_monotonically() {
        // Brightness should increase from the dark end to the light end of both maps.
        let brightness = |c: Rgb<u8>| c.0[0] as u32 + c.0[1] as u32 + c.0[2] as u32;
        let mut previous = brightness(mako(0.0));
        for i in 1..=10 {
            let current = brightness(mako(i as f64 / 10.0));
            assert!(current >= previous);
            previous = current;
        }
    }
}
