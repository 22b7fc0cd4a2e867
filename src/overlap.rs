// This file contains the code for the votukit overlap subcommand: count the overlap of aligned
// pairs between two large alignment tables (one loaded, one streamed) and draw an UpSet plot of
// the result.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use ab_glyph::PxScale;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut,
                         draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::alignment::{load_pair_set, stream_overlap_counts};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_file_exists, file_stem_string, format_float, format_with_commas,
                  quit_with_error};
use crate::plot::{draw_text_centred, draw_text_right_aligned, load_font, new_canvas, save_png,
                  GRID_COLOUR, SERIES_COLOURS, TEXT_COLOUR};


pub fn overlap(in1: PathBuf, in2: PathBuf, names: Option<String>, out_png: PathBuf, res: u32) {
    check_settings(&in1, &in2, res);
    starting_message();
    print_settings(&in1, &in2, &out_png, res);
    let (name1, name2) = resolve_names(&in1, &in2, names);

    section_header("Counting aligned pairs");
    explanation("The first table's pairs are held in memory and the second table is streamed \
                 against them, so only one of the two (ideally the smaller) is ever loaded.");
    let set1 = load_pair_set(&in1);
    eprintln!("{}: {} pairs loaded", name1, format_with_commas(set1.len() as u64));
    let counts = stream_overlap_counts(&set1, &in2);
    eprintln!("{}: {} pairs streamed", name2, format_with_commas(counts.total));
    eprintln!();

    let only1 = set1.len() as u64 - counts.common;
    print_summary(&name1, &name2, set1.len() as u64, &counts, only1);
    draw_upset_plot(&name1, &name2, counts.common, only1, counts.only_b,
                    set1.len() as u64, counts.total, &out_png, res);
    finished_message(&out_png);
}


fn check_settings(in1: &Path, in2: &Path, res: u32) {
    check_if_file_exists(in1);
    check_if_file_exists(in2);
    if res < 300   { quit_with_error("--res cannot be less than 300"); }
    if res > 10000 { quit_with_error("--res cannot be greater than 10000"); }
}


fn starting_message() {
    section_header("Starting votukit overlap");
    explanation("This command counts how many aligned pairs two aligners share without loading \
                 both result tables into memory, then draws an UpSet plot of the overlap.");
}


fn print_settings(in1: &Path, in2: &Path, out_png: &Path, res: u32) {
    eprintln!("Settings:");
    eprintln!("  --in1 {}", in1.display());
    eprintln!("  --in2 {}", in2.display());
    eprintln!("  --out_png {}", out_png.display());
    eprintln!("  --res {}", res);
    eprintln!();
}


fn finished_message(out_png: &Path) {
    section_header("Finished!");
    eprintln!("UpSet plot: {}", out_png.display());
    eprintln!();
}


fn resolve_names(in1: &Path, in2: &Path, names: Option<String>) -> (String, String) {
    match names {
        Some(names) => {
            let parts: Vec<String> = names.split(',').map(|n| n.trim().to_string()).collect();
            if parts.len() != 2 {
                quit_with_error("--names requires exactly two comma-delimited names");
            }
            (parts[0].clone(), parts[1].clone())
        },
        None => (file_stem_string(in1), file_stem_string(in2)),
    }
}


fn print_summary(name1: &str, name2: &str, total1: u64,
                 counts: &crate::alignment::OverlapCounts, only1: u64) {
    section_header("Overlap summary");
    eprintln!("{}: {} pairs", name1, format_with_commas(total1));
    eprintln!("{}: {} pairs", name2, format_with_commas(counts.total));
    eprintln!("shared: {}", format_with_commas(counts.common));
    eprintln!("only {}: {}", name1, format_with_commas(only1));
    eprintln!("only {}: {}", name2, format_with_commas(counts.only_b));
    let union = only1 + counts.only_b + counts.common;
    if union > 0 {
        eprintln!("Jaccard = {}", format_float(counts.common as f64 / union as f64));
    }
    eprintln!();
}


pub fn upset_columns(common: u64, only1: u64, only2: u64) -> Vec<(bool, bool, u64)> {
    // The UpSet plot's intersection columns, largest first. The two flags mark membership of the
    // first and second set respectively.
    let mut columns = vec![(true, true, common), (true, false, only1), (false, true, only2)];
    columns.sort_by(|a, b| b.2.cmp(&a.2));
    columns
}


fn draw_upset_plot(name1: &str, name2: &str, common: u64, only1: u64, only2: u64, size1: u64,
                   size2: u64, out_png: &Path, res: u32) {
    let font = load_font();
    let w = res as f64;
    let height = (w * 0.75) as u32;
    let h = height as f64;
    let mut img = new_canvas(res, height);
    let scale = PxScale::from(res as f32 * 0.02);
    let title_scale = PxScale::from(res as f32 * 0.026);

    draw_text_centred(&mut img, TEXT_COLOUR, (w * 0.5) as i32, (h * 0.03) as i32, title_scale,
                      &font, &format!("Aligned-pair overlap: {} vs {}", name1, name2));

    let columns = upset_columns(common, only1, only2);
    let max_count = columns.iter().map(|c| c.2).max().unwrap_or(0).max(1);

    // Geometry: intersection bars in the upper right, the membership matrix below them and the
    // set-size bars in the lower left.
    let matrix_left = w * 0.30;
    let column_step = (w * 0.97 - matrix_left) / 3.0;
    let bar_width = (column_step * 0.5) as u32;
    let bars_top = h * 0.12;
    let bars_bottom = h * 0.62;
    let row_ys = [h * 0.72, h * 0.82];
    let dot_radius = (w * 0.012) as i32;

    for (i, (in1, in2, count)) in columns.iter().enumerate() {
        let centre_x = matrix_left + column_step * (i as f64 + 0.5);
        let bar_height = ((*count as f64 / max_count as f64)
                          * (bars_bottom - bars_top)).round() as u32;
        if bar_height > 0 {
            let rect = Rect::at((centre_x - bar_width as f64 / 2.0) as i32,
                                (bars_bottom - bar_height as f64) as i32)
                .of_size(bar_width, bar_height);
            draw_filled_rect_mut(&mut img, rect, TEXT_COLOUR);
        }
        draw_text_centred(&mut img, TEXT_COLOUR, centre_x as i32,
                          (bars_bottom - bar_height as f64 - scale.y as f64 * 1.3) as i32, scale,
                          &font, &format_with_commas(*count));

        // Membership dots: filled when the column includes the set, hollowish grey when not.
        for (row, member) in [(0, *in1), (1, *in2)] {
            let colour = if member { SERIES_COLOURS[row] } else { GRID_COLOUR };
            draw_filled_circle_mut(&mut img, (centre_x as i32, row_ys[row] as i32), dot_radius,
                                   colour);
        }
        if *in1 && *in2 {
            draw_line_segment_mut(&mut img, (centre_x as f32, row_ys[0] as f32),
                                  (centre_x as f32, row_ys[1] as f32), TEXT_COLOUR);
        }
    }

    // Set labels and set-size bars on the left.
    let max_size = size1.max(size2).max(1);
    let size_bar_max = w * 0.13;
    for (row, (name, size)) in [(name1, size1), (name2, size2)].iter().enumerate() {
        let y = row_ys[row];
        draw_text_right_aligned(&mut img, SERIES_COLOURS[row], (w * 0.145) as i32,
                                (y - scale.y as f64 / 2.0) as i32, scale, &font, name);
        let bar_length = (*size as f64 / max_size as f64 * size_bar_max).round() as u32;
        if bar_length > 0 {
            let rect = Rect::at((w * 0.15) as i32, (y - h * 0.012) as i32)
                .of_size(bar_length, (h * 0.024) as u32);
            draw_filled_rect_mut(&mut img, rect, SERIES_COLOURS[row]);
        }
        draw_text_mut(&mut img, TEXT_COLOUR, (w * 0.15) as i32 + bar_length as i32 + 4,
                      (y - scale.y as f64 / 2.0) as i32, scale, &font,
                      &format_with_commas(*size));
    }

    save_png(&img, out_png);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upset_columns_sorted_descending() {
        let columns = upset_columns(566041221, 87717687, 133842537);
        assert_eq!(columns[0], (true, true, 566041221));
        assert_eq!(columns[1], (false, true, 133842537));
        assert_eq!(columns[2], (true, false, 87717687));
    }

    #[test]
    fn test_upset_columns_membership_flags() {
        let columns = upset_columns(0, 5, 1);
        assert_eq!(columns[0], (true, false, 5));
        assert_eq!(columns[1], (false, true, 1));
        assert_eq!(columns[2], (true, true, 0));
    }
}
