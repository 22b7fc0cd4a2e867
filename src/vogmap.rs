// This file contains the code for the votukit vogmap subcommand: turn a protein-to-VOG
// membership table into a vOTU x VOG count heatmap for the most annotation-rich vOTUs and the
// most common VOGs.

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
use std::collections::HashMap;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::log::{section_header, explanation};
use crate::misc::{check_if_file_exists, open_maybe_gzipped, quit_with_error};
use crate::plot::{draw_colour_scale, draw_text_centred, draw_vertical_text, load_font,
                  new_canvas, save_png, viridis, TEXT_COLOUR};


pub fn vogmap(in_tsv: PathBuf, out_png: PathBuf, top: usize, res: u32) {
    check_settings(&in_tsv, top, res);
    starting_message();
    print_settings(&in_tsv, &out_png, top, res);

    let memberships = load_memberships(&in_tsv);
    eprintln!("Protein-to-VOG assignments: {}", memberships.len());
    let rows: Vec<(String, String)> = memberships.into_iter()
        .map(|(protein, cluster)| (contig_from_protein(&protein), cluster))
        .collect();

    let top_contigs = top_by_count(rows.iter().map(|(contig, _)| contig), top);
    let top_clusters = top_by_count(rows.iter().map(|(_, cluster)| cluster), top);
    eprintln!("vOTUs kept:  {}", top_contigs.len());
    eprintln!("VOGs kept:   {}", top_clusters.len());
    eprintln!();

    let table = count_table(&rows, &top_contigs, &top_clusters);
    drawing_step(&table, top_contigs.len(), top_clusters.len(), &out_png, res);
    finished_message(&out_png);
}


fn check_settings(in_tsv: &Path, top: usize, res: u32) {
    check_if_file_exists(in_tsv);
    if top < 1     { quit_with_error("--top cannot be less than 1"); }
    if res < 300   { quit_with_error("--res cannot be less than 300"); }
    if res > 10000 { quit_with_error("--res cannot be greater than 10000"); }
}


fn starting_message() {
    section_header("Starting votukit vogmap");
    explanation("This command loads a protein-to-VOG membership table, derives each protein's \
                 vOTU from its id and draws a heatmap of VOG counts for the most annotation-rich \
                 vOTUs against the most common VOGs.");
}


fn print_settings(in_tsv: &Path, out_png: &Path, top: usize, res: u32) {
    eprintln!("Settings:");
    eprintln!("  --in_tsv {}", in_tsv.display());
    eprintln!("  --out_png {}", out_png.display());
    eprintln!("  --top {}", top);
    eprintln!("  --res {}", res);
    eprintln!();
}


fn finished_message(out_png: &Path) {
    section_header("Finished!");
    eprintln!("Heatmap: {}", out_png.display());
    eprintln!();
}


pub fn load_memberships(in_tsv: &Path) -> Vec<(String, String)> {
    // Loads the headerless two-column TSV of protein id and VOG cluster id.
    let mut memberships = Vec::new();
    let mut line_num = 0;
    for line in open_maybe_gzipped(in_tsv).lines() {
        line_num += 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", in_tsv.display(), e)),
        };
        if text.is_empty() { continue; }
        let mut parts = text.split('\t');
        match (parts.next(), parts.next()) {
            (Some(protein), Some(cluster)) =>
                memberships.push((protein.to_string(), cluster.to_string())),
            _ => quit_with_error(&format!("{} line {} has fewer than two columns",
                                          in_tsv.display(), line_num)),
        }
    }
    if memberships.is_empty() {
        quit_with_error(&format!("no assignments found in {}", in_tsv.display()));
    }
    memberships
}


pub fn contig_from_protein(protein: &str) -> String {
    // Prodigal names proteins <contig>_<gene number>, so the contig is everything before the
    // final underscore.
    match protein.rsplit_once('_') {
        Some((contig, _)) => contig.to_string(),
        None => protein.to_string(),
    }
}


pub fn top_by_count<'a>(values: impl Iterator<Item = &'a String>, n: usize) -> Vec<String> {
    // The n most frequent values, most frequent first. Ties break alphabetically so the
    // selection is deterministic.
    let mut counts: HashMap<&String, u32> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut counted: Vec<(&String, u32)> = counts.into_iter().collect();
    counted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counted.into_iter().take(n).map(|(value, _)| value.clone()).collect()
}


pub fn count_table(rows: &[(String, String)], contigs: &[String], clusters: &[String])
        -> Vec<Vec<u32>> {
    // A contigs x clusters table of assignment counts, restricted to the kept labels.
    let contig_index: HashMap<&String, usize> =
        contigs.iter().enumerate().map(|(i, c)| (c, i)).collect();
    let cluster_index: HashMap<&String, usize> =
        clusters.iter().enumerate().map(|(i, c)| (c, i)).collect();
    let mut table = vec![vec![0u32; clusters.len()]; contigs.len()];
    for (contig, cluster) in rows {
        if let (Some(&i), Some(&j)) = (contig_index.get(contig), cluster_index.get(cluster)) {
            table[i][j] += 1;
        }
    }
    table
}


fn drawing_step(table: &[Vec<u32>], contig_count: usize, cluster_count: usize, out_png: &Path,
                res: u32) {
    section_header("Drawing heatmap");
    let font = load_font();
    let mut img = new_canvas(res, res);
    let w = res as f64;
    let scale = PxScale::from(res as f32 * 0.018);
    let title_scale = PxScale::from(res as f32 * 0.025);

    let max_count = table.iter().flatten().copied().max().unwrap_or(0).max(1);
    let plot_left = (w * 0.07) as u32;
    let plot_top = (w * 0.10) as u32;
    let plot_size = (w * 0.78) as u32;

    for py in 0..plot_size {
        let i = (py as usize * contig_count) / plot_size as usize;
        for px in 0..plot_size {
            let j = (px as usize * cluster_count) / plot_size as usize;
            let t = table[i][j] as f64 / max_count as f64;
            img.put_pixel(plot_left + px, plot_top + py, viridis(t));
        }
    }

    draw_text_centred(&mut img, TEXT_COLOUR, (plot_left + plot_size / 2) as i32,
                      (w * 0.03) as i32, title_scale, &font,
                      &format!("Top {} vOTUs x top {} VOGs", contig_count, cluster_count));
    draw_text_centred(&mut img, TEXT_COLOUR, (plot_left + plot_size / 2) as i32,
                      (plot_top + plot_size) as i32 + (w * 0.02) as i32, scale, &font, "VOGs");
    draw_vertical_text(&mut img, "vOTUs", (w * 0.02) as u32,
                       plot_top + plot_size / 2 + (w * 0.03) as u32, scale, &font);
    draw_colour_scale(&mut img, viridis, (w * 0.89) as i32, plot_top as i32, (w * 0.03) as u32,
                      plot_size, "0", &max_count.to_string(), scale, &font);
    save_png(&img, out_png);
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_test_file;
    use tempfile::tempdir;

    fn to_strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_contig_from_protein() {
        assert_eq!(contig_from_protein("contig_12_3"), "contig_12");
        assert_eq!(contig_from_protein("votu7_1"), "votu7");
        assert_eq!(contig_from_protein("noseparator"), "noseparator");
    }

    #[test]
    fn test_load_memberships() {
        let dir = tempdir().unwrap();
        let in_tsv = dir.path().join("vogs.tsv");
        make_test_file(&in_tsv, "votu1_1\tVOG001\nvotu1_2\tVOG002\nvotu2_1\tVOG001\n");
        let memberships = load_memberships(&in_tsv);
        assert_eq!(memberships.len(), 3);
        assert_eq!(memberships[0], ("votu1_1".to_string(), "VOG001".to_string()));
    }

    #[test]
    fn test_top_by_count() {
        let values = to_strings(&["a", "b", "a", "c", "b", "a"]);
        assert_eq!(top_by_count(values.iter(), 2), vec!["a", "b"]);
        assert_eq!(top_by_count(values.iter(), 10), vec!["a", "b", "c"]);

        // Ties break alphabetically.
        let tied = to_strings(&["z", "y"]);
        assert_eq!(top_by_count(tied.iter(), 2), vec!["y", "z"]);
    }

    #[test]
    fn test_count_table() {
        let rows = vec![
            ("votu1".to_string(), "VOG001".to_string()),
            ("votu1".to_string(), "VOG001".to_string()),
            ("votu1".to_string(), "VOG002".to_string()),
            ("votu2".to_string(), "VOG001".to_string()),
            ("votu3".to_string(), "VOG009".to_string()),  // not in the kept labels
        ];
        let contigs = to_strings(&["votu1", "votu2"]);
        let clusters = to_strings(&["VOG001", "VOG002"]);
        let table = count_table(&rows, &contigs, &clusters);
        assert_eq!(table, vec![vec![2, 1], vec![1, 0]]);
    }
}
