// This file contains the code for the votukit heatmap subcommand: load a square labelled
// distance matrix, order it by average-linkage hierarchical clustering and draw it as a heatmap.

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
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::log::{section_header, explanation};
use crate::misc::{check_if_file_exists, file_stem_string, format_float_sigfigs,
                  open_maybe_gzipped, quit_with_error, spinner};
use crate::plot::{draw_colour_scale, draw_text_centred, load_font, mako, new_canvas, save_png,
                  TEXT_COLOUR};


pub fn heatmap(matrix: PathBuf, out_png: PathBuf, res: u32) {
    check_settings(&matrix, res);
    starting_message();
    print_settings(&matrix, &out_png, res);

    let (labels, values) = load_matrix(&matrix);
    if labels.is_empty() {
        quit_with_error(&format!("{} contains no data rows", matrix.display()));
    }
    eprintln!("Matrix: {} x {}", labels.len(), labels.len());
    eprintln!();

    let order = clustering_step(&values);
    drawing_step(&matrix, &values, &order, &out_png, res);
    finished_message(&out_png);
}


fn check_settings(matrix: &Path, res: u32) {
    check_if_file_exists(matrix);
    if res < 300   { quit_with_error("--res cannot be less than 300"); }
    if res > 10000 { quit_with_error("--res cannot be greater than 10000"); }
}


fn starting_message() {
    section_header("Starting votukit heatmap");
    explanation("This command loads a square distance matrix, orders its rows and columns with \
                 average-linkage hierarchical clustering and draws the result as a heatmap, so \
                 related vOTUs appear as blocks.");
}


fn print_settings(matrix: &Path, out_png: &Path, res: u32) {
    eprintln!("Settings:");
    eprintln!("  --matrix {}", matrix.display());
    eprintln!("  --out_png {}", out_png.display());
    eprintln!("  --res {}", res);
    eprintln!();
}


fn finished_message(out_png: &Path) {
    section_header("Finished!");
    eprintln!("Heatmap: {}", out_png.display());
    eprintln!();
}


pub fn load_matrix(filename: &Path) -> (Vec<String>, Vec<Vec<f64>>) {
    // Loads a CSV matrix with a header row of labels and an index column of labels. The matrix
    // must be square and the row labels must match the column labels.
    let mut lines = open_maybe_gzipped(filename).lines();
    let header = match lines.next() {
        Some(Ok(header)) => header,
        _ => quit_with_error(&format!("{} is empty", filename.display())),
    };
    let col_labels: Vec<String> = header.split(',').skip(1).map(|s| s.trim().to_string())
        .collect();

    let mut row_labels = Vec::new();
    let mut values = Vec::new();
    let mut line_num = 1;
    for line in lines {
        line_num += 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", filename.display(), e)),
        };
        if text.is_empty() { continue; }
        let mut parts = text.split(',');
        row_labels.push(parts.next().unwrap_or_default().trim().to_string());
        let row: Vec<f64> = parts.map(|cell| match cell.trim().parse::<f64>() {
            Ok(value) => value,
            Err(_) => quit_with_error(&format!("{} line {} has an unparseable value: {}",
                                               filename.display(), line_num, cell)),
        }).collect();
        if row.len() != col_labels.len() {
            quit_with_error(&format!("{} line {} has {} values ({} expected)",
                                     filename.display(), line_num, row.len(),
                                     col_labels.len()));
        }
        values.push(row);
    }
    if row_labels.len() != col_labels.len() {
        quit_with_error(&format!("{} is not square: {} rows vs {} columns",
                                 filename.display(), row_labels.len(), col_labels.len()));
    }
    if row_labels != col_labels {
        quit_with_error(&format!("{} row labels do not match column labels",
                                 filename.display()));
    }
    (row_labels, values)
}


fn clustering_step(values: &[Vec<f64>]) -> Vec<usize> {
    section_header("Clustering");
    explanation("Rows and columns are reordered by average-linkage hierarchical clustering over \
                 the distances.");
    let pb = spinner("clustering...");
    let order = average_linkage_order(values);
    pb.finish_and_clear();
    order
}


pub fn average_linkage_order(dist: &[Vec<f64>]) -> Vec<usize> {
    // Agglomerative clustering with average linkage: repeatedly merge the two clusters with the
    // smallest mean pairwise distance. Returns a leaf ordering that keeps merged clusters
    // adjacent. The O(n^3) loop is fine at the matrix sizes these analyses use.
    let n = dist.len();
    if n == 0 { return Vec::new(); }
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    while clusters.len() > 1 {
        let mut best_i = 0;
        let mut best_j = 1;
        let mut best_dist = f64::INFINITY;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let d = average_distance(&clusters[i], &clusters[j], dist);
                if d < best_dist {
                    best_i = i;
                    best_j = j;
                    best_dist = d;
                }
            }
        }
        let merged = clusters.remove(best_j);
        clusters[best_i].extend(merged);
    }
    clusters.pop().unwrap()
}


fn average_distance(a: &[usize], b: &[usize], dist: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    for &i in a {
        for &j in b {
            total += dist[i][j];
        }
    }
    total / (a.len() * b.len()) as f64
}


fn drawing_step(matrix: &Path, values: &[Vec<f64>], order: &[usize], out_png: &Path, res: u32) {
    section_header("Drawing heatmap");
    let font = load_font();
    let mut img = new_canvas(res, res);
    let w = res as f64;
    let scale = PxScale::from(res as f32 * 0.018);
    let title_scale = PxScale::from(res as f32 * 0.025);

    let (min_value, max_value) = value_range(values);
    let plot_left = (w * 0.05) as u32;
    let plot_top = (w * 0.10) as u32;
    let plot_size = (w * 0.80) as u32;
    let n = order.len();

    // One pass over the plot pixels handles matrices both smaller and larger than the plot area.
    for py in 0..plot_size {
        let i = order[(py as usize * n) / plot_size as usize];
        for px in 0..plot_size {
            let j = order[(px as usize * n) / plot_size as usize];
            let t = if max_value > min_value {
                (values[i][j] - min_value) / (max_value - min_value)
            } else { 0.0 };
            img.put_pixel(plot_left + px, plot_top + py, mako(t));
        }
    }

    draw_text_centred(&mut img, TEXT_COLOUR, (plot_left + plot_size / 2) as i32,
                      (w * 0.03) as i32, title_scale, &font,
                      &format!("Clustered heatmap: {}", file_stem_string(matrix)));
    draw_colour_scale(&mut img, mako, (w * 0.89) as i32, plot_top as i32, (w * 0.03) as u32,
                      plot_size, &format_float_sigfigs(min_value, 3),
                      &format_float_sigfigs(max_value, 3), scale, &font);
    save_png(&img, out_png);
}


fn value_range(values: &[Vec<f64>]) -> (f64, f64) {
    let mut min_value = f64::INFINITY;
    let mut max_value = f64::NEG_INFINITY;
    for row in values {
        for &value in row {
            min_value = min_value.min(value);
            max_value = max_value.max(value);
        }
    }
    (min_value, max_value)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_test_file;
    use std::panic;
    use tempfile::tempdir;

    #[test]
    fn test_load_matrix() {
        let dir = tempdir().unwrap();
        let matrix = dir.path().join("dist.csv");
        make_test_file(&matrix, ",a,b\na,0.0,0.5\nb,0.5,0.0\n");
        let (labels, values) = load_matrix(&matrix);
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(values, vec![vec![0.0, 0.5], vec![0.5, 0.0]]);
    }

    #[test]
    fn test_load_matrix_not_square() {
        let dir = tempdir().unwrap();
        let matrix = dir.path().join("dist.csv");
        make_test_file(&matrix, ",a,b\na,0.0,0.5\n");
        assert!(panic::catch_unwind(|| { load_matrix(&matrix); }).is_err());
    }

    #[test]
    fn test_load_matrix_label_mismatch() {
        let dir = tempdir().unwrap();
        let matrix = dir.path().join("dist.csv");
        make_test_file(&matrix, ",a,b\na,0.0,0.5\nc,0.5,0.0\n");
        assert!(panic::catch_unwind(|| { load_matrix(&matrix); }).is_err());
    }

    #[test]
    fn test_average_linkage_order_groups_close_pairs() {
        // 0 and 1 are very close, 2 and 3 are close, the two pairs are far apart.
        let big = 10.0;
        let dist = vec![
            vec![0.0, 0.1, big, big],
            vec![0.1, 0.0, big, big],
            vec![big, big, 0.0, 0.2],
            vec![big, big, 0.2, 0.0],
        ];
        let order = average_linkage_order(&dist);

        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3]);  // the order is a permutation

        let position = |x: usize| order.iter().position(|&v| v == x).unwrap();
        assert_eq!(position(0).abs_diff(position(1)), 1);  // the close pairs stay adjacent
        assert_eq!(position(2).abs_diff(position(3)), 1);
    }

    #[test]
    fn test_average_linkage_order_empty_and_single() {
        assert!(average_linkage_order(&[]).is_empty());
        assert_eq!(average_linkage_order(&[vec![0.0]]), vec![0]);
    }

    #[test]
    fn test_value_range() {
        let values = vec![vec![0.2, 0.8], vec![0.5, 0.1]];
        assert_eq!(value_range(&values), (0.1, 0.8));
    }
}
