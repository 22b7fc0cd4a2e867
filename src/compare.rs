// This file contains the code for the votukit compare subcommand: load alignment tables from
// two or three aligners, report overlap statistics and draw a Venn diagram and per-metric
// distribution (KDE) plots.

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
use fxhash::FxHashSet;
use image::RgbImage;
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::alignment::{load_alignments, mean, overlap_and_jaccard, AlignmentRecord};
use crate::log::{section_header, explanation};
use crate::misc::{check_if_dir_is_not_dir, check_if_file_exists, create_dir, file_stem_string,
                  format_float, quit_with_error};
use crate::plot::{calculate_text_width, draw_legend, draw_text_centred, draw_vertical_text,
                  load_font, new_canvas, save_png, AXIS_COLOUR, SERIES_COLOURS, TEXT_COLOUR};


pub fn compare(alignments: Vec<PathBuf>, names: Option<String>, out_dir: PathBuf, res: u32) {
    check_settings(&alignments, &out_dir, res);
    starting_message();
    print_settings(&alignments, &out_dir, res);
    create_dir(&out_dir);
    let names = resolve_names(&alignments, names);

    let tables = load_tables(&alignments, &names);
    print_basic_stats(&names, &tables);
    let pair_sets = build_pair_sets(&tables);
    print_overlaps(&names, &pair_sets);

    let plot_files = draw_plots(&names, &tables, &pair_sets, &out_dir, res);
    finished_message(&plot_files);
}


fn check_settings(alignments: &[PathBuf], out_dir: &Path, res: u32) {
    if alignments.len() < 2 || alignments.len() > 3 {
        quit_with_error("--alignments requires two or three files");
    }
    for filename in alignments {
        check_if_file_exists(filename);
    }
    check_if_dir_is_not_dir(out_dir);
    if res < 300   { quit_with_error("--res cannot be less than 300"); }
    if res > 10000 { quit_with_error("--res cannot be greater than 10000"); }
}


fn starting_message() {
    section_header("Starting votukit compare");
    explanation("This command loads the alignment tables produced by different aligners over the \
                 same sequences, reports how much the aligned pairs overlap and draws a Venn \
                 diagram plus distribution plots for identity, bitscore and e-value.");
}


fn print_settings(alignments: &[PathBuf], out_dir: &Path, res: u32) {
    eprintln!("Settings:");
    for filename in alignments {
        eprintln!("  --alignments {}", filename.display());
    }
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!("  --res {}", res);
    eprintln!();
}


fn finished_message(plot_files: &[PathBuf]) {
    section_header("Finished!");
    for filename in plot_files {
        eprintln!("Plot: {}", filename.display());
    }
    eprintln!();
}


pub fn resolve_names(alignments: &[PathBuf], names: Option<String>) -> Vec<String> {
    // Aligner names either come from --names (comma-delimited, one per file) or default to the
    // file stems.
    match names {
        Some(names) => {
            let names: Vec<String> = names.split(',').map(|n| n.trim().to_string()).collect();
            if names.len() != alignments.len() {
                quit_with_error(&format!("--names has {} entries but {} alignment files were \
                                          given", names.len(), alignments.len()));
            }
            names
        },
        None => alignments.iter().map(|path| file_stem_string(path)).collect(),
    }
}


fn load_tables(alignments: &[PathBuf], names: &[String]) -> Vec<Vec<AlignmentRecord>> {
    section_header("Loading alignments");
    explanation("Each table is loaded in full so that identity, bitscore and e-value \
                 distributions can be plotted.");
    let mut tables = Vec::new();
    for (filename, name) in alignments.iter().zip(names) {
        let records = load_alignments(filename);
        eprintln!("{}: {} alignments", name, records.len());
        tables.push(records);
    }
    eprintln!();
    tables
}


fn print_basic_stats(names: &[String], tables: &[Vec<AlignmentRecord>]) {
    section_header("Basic statistics");
    for (name, records) in names.iter().zip(tables) {
        let identities: Vec<f64> = records.iter().map(|r| r.identity).collect();
        let evalues: Vec<f64> = records.iter().map(|r| r.evalue).collect();
        eprintln!("{}: {} alignments, mean identity = {}, mean e-value = {:.2e}",
                  name, records.len(), format_float(mean(&identities)), mean(&evalues));
    }
    eprintln!();
}


fn build_pair_sets(tables: &[Vec<AlignmentRecord>]) -> Vec<FxHashSet<String>> {
    tables.iter()
        .map(|records| records.iter().map(|r| r.pair()).collect())
        .collect()
}


fn print_overlaps(names: &[String], pair_sets: &[FxHashSet<String>]) {
    section_header("Pairwise overlap");
    explanation("For each pair of aligners: the number of aligned pairs they share and the \
                 Jaccard index of their pair sets.");
    for i in 0..pair_sets.len() {
        for j in (i + 1)..pair_sets.len() {
            let (common, jaccard) = overlap_and_jaccard(&pair_sets[i], &pair_sets[j]);
            eprintln!("{} vs {}: {} shared alignments, Jaccard = {}",
                      names[i], names[j], common, format_float(jaccard));
        }
    }
    eprintln!();
}


fn draw_plots(names: &[String], tables: &[Vec<AlignmentRecord>],
              pair_sets: &[FxHashSet<String>], out_dir: &Path, res: u32) -> Vec<PathBuf> {
    section_header("Drawing plots");
    let mut plot_files = Vec::new();

    let venn_png = out_dir.join("venn_alignments.png");
    draw_venn(names, pair_sets, &venn_png, res);
    plot_files.push(venn_png);

    for (metric, label) in [("identity", "identity"), ("bitscore", "bitscore"),
                            ("evalue", "log10(evalue)")] {
        let png = out_dir.join(format!("distribution_{}.png", metric));
        let series: Vec<Vec<f64>> = tables.iter().map(|t| metric_values(t, metric)).collect();
        draw_kde_plot(names, &series, label, &png, res);
        plot_files.push(png);
    }
    plot_files
}


fn metric_values(records: &[AlignmentRecord], metric: &str) -> Vec<f64> {
    match metric {
        "identity" => records.iter().map(|r| r.identity).collect(),
        "bitscore" => records.iter().map(|r| r.bitscore).collect(),
        "evalue"   => log10_evalues(records),
        _          => unreachable!(),
    }
}


fn log10_evalues(records: &[AlignmentRecord]) -> Vec<f64> {
    // E-values span many orders of magnitude, so they are plotted on a log10 axis. Zeros (which
    // aligners report for very strong hits) are clamped to the smallest positive value seen.
    let smallest_positive = records.iter().map(|r| r.evalue).filter(|&e| e > 0.0)
        .fold(f64::INFINITY, f64::min);
    if smallest_positive == f64::INFINITY {
        return Vec::new();
    }
    records.iter().map(|r| {
        let evalue = if r.evalue > 0.0 { r.evalue } else { smallest_positive };
        evalue.log10()
    }).collect()
}


// Venn diagram drawing. Regions are identified by a set-membership bitmask (bit i set means the
// pair occurs in set i), so a 2-set diagram has 3 regions and a 3-set diagram has 7.

pub fn venn_region_counts(pair_sets: &[FxHashSet<String>]) -> BTreeMap<u8, u64> {
    let mut union: FxHashSet<&String> = FxHashSet::default();
    for set in pair_sets {
        union.extend(set.iter());
    }
    let mut counts = BTreeMap::new();
    for pair in union {
        let mut mask = 0u8;
        for (i, set) in pair_sets.iter().enumerate() {
            if set.contains(pair) { mask |= 1 << i; }
        }
        *counts.entry(mask).or_insert(0) += 1;
    }
    counts
}


fn draw_venn(names: &[String], pair_sets: &[FxHashSet<String>], out_png: &Path, res: u32) {
    let font = load_font();
    let mut img = new_canvas(res, res);
    let counts = venn_region_counts(pair_sets);
    let count = |mask: u8| counts.get(&mask).copied().unwrap_or(0).to_string();
    let w = res as f64;
    let title_scale = PxScale::from(w as f32 * 0.035);
    let label_scale = PxScale::from(w as f32 * 0.025);
    draw_text_centred(&mut img, TEXT_COLOUR, (w * 0.5) as i32, (w * 0.04) as i32, title_scale,
                      &font, "Overlap of aligned pairs");

    if names.len() == 2 {
        let radius = (w * 0.22) as i32;
        let centres = [((w * 0.38) as i32, (w * 0.52) as i32),
                       ((w * 0.62) as i32, (w * 0.52) as i32)];
        draw_circles(&mut img, &centres, radius);
        for (i, (cx, _)) in centres.iter().enumerate() {
            draw_text_centred(&mut img, SERIES_COLOURS[i], *cx,
                              (w * 0.52) as i32 - radius - (w * 0.05) as i32, label_scale, &font,
                              &names[i]);
        }
        let y = (w * 0.51) as i32;
        draw_text_centred(&mut img, TEXT_COLOUR, (w * 0.28) as i32, y, label_scale, &font,
                          &count(0b01));
        draw_text_centred(&mut img, TEXT_COLOUR, (w * 0.72) as i32, y, label_scale, &font,
                          &count(0b10));
        draw_text_centred(&mut img, TEXT_COLOUR, (w * 0.50) as i32, y, label_scale, &font,
                          &count(0b11));
    } else {
        let radius = (w * 0.20) as i32;
        let centres = [((w * 0.38) as i32, (w * 0.42) as i32),
                       ((w * 0.62) as i32, (w * 0.42) as i32),
                       ((w * 0.50) as i32, (w * 0.64) as i32)];
        draw_circles(&mut img, &centres, radius);
        draw_text_centred(&mut img, SERIES_COLOURS[0], (w * 0.25) as i32, (w * 0.16) as i32,
                          label_scale, &font, &names[0]);
        draw_text_centred(&mut img, SERIES_COLOURS[1], (w * 0.75) as i32, (w * 0.16) as i32,
                          label_scale, &font, &names[1]);
        draw_text_centred(&mut img, SERIES_COLOURS[2], (w * 0.50) as i32, (w * 0.90) as i32,
                          label_scale, &font, &names[2]);
        let regions: [(u8, f64, f64); 7] = [
            (0b001, 0.28, 0.38), (0b010, 0.72, 0.38), (0b100, 0.50, 0.76),
            (0b011, 0.50, 0.36), (0b101, 0.37, 0.58), (0b110, 0.63, 0.58),
            (0b111, 0.50, 0.50),
        ];
        for (mask, x, y) in regions {
            draw_text_centred(&mut img, TEXT_COLOUR, (w * x) as i32, (w * y) as i32, label_scale,
                              &font, &count(mask));
        }
    }
    save_png(&img, out_png);
}


fn draw_circles(img: &mut RgbImage, centres: &[(i32, i32)], radius: i32) {
    for (i, centre) in centres.iter().enumerate() {
        // Three concentric circles give a visible outline thickness.
        for r in (radius - 1)..=(radius + 1) {
            draw_hollow_circle_mut(img, *centre, r, SERIES_COLOURS[i]);
        }
    }
}


// Kernel density estimation and the distribution plot drawing.

pub fn gaussian_kde(values: &[f64], grid_points: usize) -> Option<(Vec<f64>, Vec<f64>)> {
    // Returns the evaluation grid and densities of a Gaussian KDE with Silverman's
    // rule-of-thumb bandwidth, or None when the data cannot support one (fewer than two values
    // or zero spread).
    if values.len() < 2 { return None; }
    let n = values.len() as f64;
    let data_mean = mean(values);
    let variance = values.iter().map(|v| (v - data_mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let iqr = sorted[(sorted.len() * 3) / 4] - sorted[sorted.len() / 4];
    let mut sigma = std_dev.min(iqr / 1.34);
    if sigma <= 0.0 { sigma = std_dev; }
    if sigma <= 0.0 { return None; }
    let bandwidth = 0.9 * sigma * n.powf(-0.2);

    let low = sorted[0] - 3.0 * bandwidth;
    let high = sorted[sorted.len() - 1] + 3.0 * bandwidth;
    let step = (high - low) / (grid_points - 1) as f64;
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let mut xs = Vec::with_capacity(grid_points);
    let mut ys = Vec::with_capacity(grid_points);
    for i in 0..grid_points {
        let x = low + i as f64 * step;
        let density: f64 = values.iter()
            .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
            .sum::<f64>() * norm;
        xs.push(x);
        ys.push(density);
    }
    Some((xs, ys))
}


fn draw_kde_plot(names: &[String], series: &[Vec<f64>], x_label: &str, out_png: &Path,
                 res: u32) {
    let font = load_font();
    let width = res;
    let height = (res as f64 * 0.625) as u32;
    let mut img = new_canvas(width, height);
    let scale = PxScale::from(res as f32 * 0.018);
    let title_scale = PxScale::from(res as f32 * 0.024);

    let margin_left = (res as f64 * 0.08) as i32;
    let margin_right = (res as f64 * 0.03) as i32;
    let margin_top = (res as f64 * 0.06) as i32;
    let margin_bottom = (res as f64 * 0.08) as i32;
    let plot_w = width as i32 - margin_left - margin_right;
    let plot_h = height as i32 - margin_top - margin_bottom;

    let curves: Vec<Option<(Vec<f64>, Vec<f64>)>> =
        series.iter().map(|values| gaussian_kde(values, 200)).collect();

    // Shared axis ranges across all the aligners' curves.
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max: f64 = 0.0;
    for curve in curves.iter().flatten() {
        let (xs, ys) = curve;
        x_min = x_min.min(xs[0]);
        x_max = x_max.max(xs[xs.len() - 1]);
        for &y in ys { y_max = y_max.max(y); }
    }
    if !x_min.is_finite() || y_max <= 0.0 {
        eprintln!("skipping {} plot (not enough distinct values)", x_label);
        return;
    }

    draw_hollow_rect_mut(&mut img, Rect::at(margin_left, margin_top)
                             .of_size(plot_w as u32, plot_h as u32), AXIS_COLOUR);

    let to_px = |x: f64, y: f64| -> (f32, f32) {
        let px = margin_left as f64 + (x - x_min) / (x_max - x_min) * plot_w as f64;
        let py = (margin_top + plot_h) as f64 - y / (y_max * 1.05) * plot_h as f64;
        (px as f32, py as f32)
    };

    for (i, curve) in curves.iter().enumerate() {
        let Some((xs, ys)) = curve else { continue; };
        let colour = SERIES_COLOURS[i];
        for window in xs.iter().zip(ys).collect::<Vec<_>>().windows(2) {
            let (x0, y0) = (*window[0].0, *window[0].1);
            let (x1, y1) = (*window[1].0, *window[1].1);
            let start = to_px(x0, y0);
            let end = to_px(x1, y1);
            draw_line_segment_mut(&mut img, start, end, colour);
            // A second pass one pixel down thickens the line.
            draw_line_segment_mut(&mut img, (start.0, start.1 + 1.0), (end.0, end.1 + 1.0),
                                  colour);
        }
    }

    draw_axis_ticks(&mut img, margin_left, margin_top, plot_w, plot_h, x_min, x_max, y_max,
                    scale, &font);
    draw_text_centred(&mut img, TEXT_COLOUR, margin_left + plot_w / 2,
                      (res as f32 * 0.014) as i32, title_scale, &font,
                      &format!("Distribution of {}", x_label));
    draw_text_centred(&mut img, TEXT_COLOUR, margin_left + plot_w / 2,
                      height as i32 - (res as f32 * 0.032) as i32, scale, &font, x_label);
    draw_vertical_text(&mut img, "Density", (res as f32 * 0.008) as u32,
                       (margin_top + plot_h / 2) as u32
                           + (calculate_text_width("Density", scale, &font) / 2.0) as u32,
                       scale, &font);

    let legend_entries: Vec<(String, image::Rgb<u8>)> = names.iter().enumerate()
        .map(|(i, name)| (name.clone(), SERIES_COLOURS[i])).collect();
    let legend_x = margin_left + plot_w - (res as f64 * 0.16) as i32;
    draw_legend(&mut img, &legend_entries, legend_x, margin_top + (res as f64 * 0.01) as i32,
                scale, &font);

    save_png(&img, out_png);
}


fn draw_axis_ticks(img: &mut RgbImage, margin_left: i32, margin_top: i32, plot_w: i32,
                   plot_h: i32, x_min: f64, x_max: f64, y_max: f64, scale: PxScale,
                   font: &ab_glyph::FontArc) {
    let tick_len = 6.0;
    let bottom = (margin_top + plot_h) as f32;
    for i in 0..=4 {
        let frac = i as f64 / 4.0;
        let x_px = margin_left as f32 + (frac * plot_w as f64) as f32;
        draw_line_segment_mut(img, (x_px, bottom), (x_px, bottom + tick_len), AXIS_COLOUR);
        let x_value = x_min + frac * (x_max - x_min);
        draw_text_centred(img, TEXT_COLOUR, x_px as i32, (bottom + tick_len + 2.0) as i32, scale,
                          font, &crate::misc::format_float_sigfigs(x_value, 3));

        let y_px = bottom - (frac * plot_h as f64) as f32;
        draw_line_segment_mut(img, (margin_left as f32 - tick_len, y_px),
                              (margin_left as f32, y_px), AXIS_COLOUR);
        let y_value = frac * y_max * 1.05;
        crate::plot::draw_text_right_aligned(img, TEXT_COLOUR,
                                             margin_left - tick_len as i32 - 2,
                                             y_px as i32 - (scale.y / 2.0) as i32, scale, font,
                                             &crate::misc::format_float_sigfigs(y_value, 2));
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::pair_key;
    use crate::tests::assert_almost_eq;
    use std::panic;

    fn pair_set(pairs: &[(&str, &str)]) -> FxHashSet<String> {
        pairs.iter().map(|(q, t)| pair_key(q, t)).collect()
    }

    #[test]
    fn test_resolve_names() {
        let alignments = vec![PathBuf::from("a/mmseqs.tsv"), PathBuf::from("diamond.tsv")];
        assert_eq!(resolve_names(&alignments, None), vec!["mmseqs", "diamond"]);
        assert_eq!(resolve_names(&alignments, Some("m2, d2".to_string())), vec!["m2", "d2"]);
        assert!(panic::catch_unwind(|| {
            resolve_names(&alignments, Some("only_one".to_string()));
        }).is_err());
    }

    #[test]
    fn test_venn_region_counts_two_sets() {
        let sets = vec![pair_set(&[("a", "b"), ("b", "c"), ("c", "d")]),
                        pair_set(&[("b", "c"), ("d", "e")])];
        let counts = venn_region_counts(&sets);
        assert_eq!(counts.get(&0b01), Some(&2));  // only in first
        assert_eq!(counts.get(&0b10), Some(&1));  // only in second
        assert_eq!(counts.get(&0b11), Some(&1));  // shared
    }

    #[test]
    fn test_venn_region_counts_three_sets() {
        let sets = vec![pair_set(&[("a", "b"), ("x", "y")]),
                        pair_set(&[("a", "b"), ("p", "q")]),
                        pair_set(&[("a", "b")])];
        let counts = venn_region_counts(&sets);
        assert_eq!(counts.get(&0b111), Some(&1));
        assert_eq!(counts.get(&0b001), Some(&1));
        assert_eq!(counts.get(&0b010), Some(&1));
        assert_eq!(counts.get(&0b100), None);
        let total: u64 = counts.values().sum();
        assert_eq!(total, 3);  // the union size
    }

    #[test]
    fn test_gaussian_kde_integrates_to_one() {
        let values = vec![1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 10.0, 10.5, 11.0];
        let (xs, ys) = gaussian_kde(&values, 500).unwrap();
        let mut integral = 0.0;
        for i in 1..xs.len() {
            integral += (ys[i] + ys[i - 1]) / 2.0 * (xs[i] - xs[i - 1]);
        }
        assert_almost_eq(integral, 1.0, 0.02);
    }

    #[test]
    fn test_gaussian_kde_peak_near_mean_of_symmetric_data() {
        let values = vec![4.0, 5.0, 6.0, 5.0, 4.0, 6.0, 5.0];
        let (xs, ys) = gaussian_kde(&values, 301).unwrap();
        let peak_index = ys.iter().enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap()).unwrap().0;
        assert_almost_eq(xs[peak_index], 5.0, 0.2);
    }

    #[test]
    fn test_gaussian_kde_degenerate_input() {
        assert!(gaussian_kde(&[], 100).is_none());
        assert!(gaussian_kde(&[1.0], 100).is_none());
        assert!(gaussian_kde(&[2.0, 2.0, 2.0], 100).is_none());
    }

    #[test]
    fn test_log10_evalues() {
        let mut records = Vec::new();
        for evalue in [1e-10, 0.0, 1e-5] {
            records.push(AlignmentRecord::from_line(
                &format!("q\tt\t90.0\t10\t0\t0\t1\t10\t1\t10\t{:e}\t50.0", evalue),
                &PathBuf::from("test.tsv"), 1));
        }
        let logs = log10_evalues(&records);
        assert_almost_eq(logs[0], -10.0, 1e-9);
        assert_almost_eq(logs[1], -10.0, 1e-9);  // zero clamps to the smallest positive
        assert_almost_eq(logs[2], -5.0, 1e-9);
    }
}
