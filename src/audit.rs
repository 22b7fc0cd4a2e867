// This file contains the code for the votukit audit subcommand: rebuild the per-sequence status
// file purely from on-disk evidence and report how far a batch has progressed.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use chrono::Local;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::log::{section_header, explanation};
use crate::metrics::AuditMetrics;
use crate::misc::{check_if_dir_exists, check_if_file_exists, first_and_last_column, format_float,
                  open_maybe_gzipped, progress_bar, quit_with_error};
use crate::status::{checkv_dir, genomad_dir, probe_checkv, probe_genomad, StatusTable,
                    ToolStatus, STATUS_FILE_NAME};


pub fn audit(in_tsv: PathBuf, out_dir: PathBuf) {
    check_settings(&in_tsv, &out_dir);
    starting_message();
    print_settings(&in_tsv, &out_dir);

    let expected_ids = load_expected_ids(&in_tsv);
    let found_ids = scan_existing_directories(&out_dir);
    let rows = analyse_sequences(&out_dir, &expected_ids, &found_ids);

    let status_file = out_dir.join(STATUS_FILE_NAME);
    save_status_file(&rows, &status_file);
    let detailed_file = out_dir.join("processing_status_detailed.tsv");
    save_detailed_file(&rows, &detailed_file);

    let metrics = summarise(&rows, &expected_ids);
    let report_file = out_dir.join("disk_analysis_report.txt");
    save_report(&metrics, &report_file);
    metrics.save_to_yaml(&out_dir.join("audit.yaml"));
    finished_message(&status_file, &detailed_file, &report_file, &metrics);
}


fn check_settings(in_tsv: &Path, out_dir: &Path) {
    check_if_file_exists(in_tsv);
    check_if_dir_exists(out_dir);
}


fn starting_message() {
    section_header("Starting votukit audit");
    explanation("This command inspects a batch output directory and rebuilds the status file \
                 from on-disk evidence alone. It is useful after an interrupted or crashed batch, \
                 when the status file may disagree with what actually finished.");
}


fn print_settings(in_tsv: &Path, out_dir: &Path) {
    eprintln!("Settings:");
    eprintln!("  --in_tsv {}", in_tsv.display());
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!();
}


fn finished_message(status_file: &Path, detailed_file: &Path, report_file: &Path,
                    metrics: &AuditMetrics) {
    section_header("Finished!");
    eprintln!("Status file:   {}", status_file.display());
    eprintln!("Detailed file: {}", detailed_file.display());
    eprintln!("Report:        {}", report_file.display());
    let completion = if metrics.audit_total_sequences > 0 {
        metrics.audit_fully_completed as f64 / metrics.audit_total_sequences as f64 * 100.0
    } else { 0.0 };
    eprintln!("{}% of sequences are completely processed", format_float(completion));
    eprintln!();
}


pub fn load_expected_ids(in_tsv: &Path) -> Vec<String> {
    // The first column of the benchmark TSV holds the sequence ids the batch should cover.
    let mut ids = Vec::new();
    for line in open_maybe_gzipped(in_tsv).lines() {
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", in_tsv.display(), e)),
        };
        if text.is_empty() { continue; }
        if let Some((id, _)) = first_and_last_column(&text) {
            ids.push(id);
        } else {
            ids.push(text);
        }
    }
    if ids.is_empty() {
        quit_with_error(&format!("no sequences found in {}", in_tsv.display()));
    }
    ids
}


pub fn scan_existing_directories(out_dir: &Path) -> BTreeSet<String> {
    // Finds sequence ids with a geNomad or CheckV output directory, whatever their id scheme.
    let dir_name_re = Regex::new(r"^(?P<id>.+)_(genomad|checkv)$").unwrap();
    let mut found = BTreeSet::new();
    let entries = match fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(e) => quit_with_error(&format!("unable to read directory {}\n{}",
                                           out_dir.display(), e)),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() { continue; }
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        if let Some(captures) = dir_name_re.captures(&name) {
            found.insert(captures["id"].to_string());
        }
    }
    found
}


pub struct AuditRow {
    pub seq_id: String,
    pub genomad_disk: crate::status::GenomadDiskStatus,
    pub checkv_disk: crate::status::CheckvDiskStatus,
    pub genomad_status: ToolStatus,
    pub checkv_status: ToolStatus,
    pub in_expected: bool,
    pub has_genomad_dir: bool,
    pub has_checkv_dir: bool,
}


fn analyse_sequences(out_dir: &Path, expected_ids: &[String], found_ids: &BTreeSet<String>)
        -> Vec<AuditRow> {
    section_header("Analysing on-disk results");
    explanation("Each sequence's geNomad and CheckV output directories are probed and the disk \
                 evidence is mapped onto the standard status vocabulary.");
    let expected_set: HashSet<&String> = expected_ids.iter().collect();
    let mut all_ids: BTreeSet<String> = found_ids.clone();
    all_ids.extend(expected_ids.iter().cloned());
    eprintln!("Sequences to analyse: {}", all_ids.len());
    eprintln!("  expected in TSV:      {}", expected_ids.len());
    eprintln!("  with output dirs:     {}", found_ids.len());
    eprintln!();

    let pb = progress_bar(all_ids.len() as u64, "analysing");
    let mut rows = Vec::new();
    for seq_id in &all_ids {
        let genomad_disk = probe_genomad(out_dir, seq_id);
        let checkv_disk = probe_checkv(out_dir, seq_id);
        rows.push(AuditRow {
            seq_id: seq_id.clone(),
            genomad_disk,
            checkv_disk,
            genomad_status: genomad_disk.to_standard(),
            checkv_status: checkv_disk.to_standard(),
            in_expected: expected_set.contains(seq_id),
            has_genomad_dir: genomad_dir(out_dir, seq_id).is_dir(),
            has_checkv_dir: checkv_dir(out_dir, seq_id).is_dir(),
        });
        pb.inc(1);
    }
    pb.finish_and_clear();
    rows
}


fn save_status_file(rows: &[AuditRow], status_file: &Path) {
    let mut table = StatusTable::new();
    for row in rows {
        table.set(&row.seq_id, row.genomad_status, row.checkv_status);
    }
    table.save(status_file);
}


fn save_detailed_file(rows: &[AuditRow], detailed_file: &Path) {
    let mut content = String::new();
    content.push_str("sequence_id\tgeNomad_status\tcheckV_status\tgenomad_disk_detail\t\
                      checkv_disk_detail\tin_expected\thas_genomad_dir\thas_checkv_dir\n");
    for row in rows {
        content.push_str(&format!("{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                                  row.seq_id,
                                  row.genomad_status.as_str(),
                                  row.checkv_status.as_str(),
                                  row.genomad_disk.as_str(),
                                  row.checkv_disk.as_str(),
                                  row.in_expected,
                                  row.has_genomad_dir,
                                  row.has_checkv_dir));
    }
    let mut file = match File::create(detailed_file) {
        Ok(file) => file,
        Err(e) => quit_with_error(&format!("failed to create {}\n{}",
                                           detailed_file.display(), e)),
    };
    if let Err(e) = file.write_all(content.as_bytes()) {
        quit_with_error(&format!("failed to write {}\n{}", detailed_file.display(), e));
    }
}


pub fn summarise(rows: &[AuditRow], expected_ids: &[String]) -> AuditMetrics {
    let mut metrics = AuditMetrics::new();
    metrics.audit_total_sequences = rows.len() as u32;
    metrics.audit_expected_sequences = expected_ids.len() as u32;
    for row in rows {
        if !row.in_expected { metrics.audit_unexpected_sequences += 1; }
        if row.genomad_status.is_finished() && row.checkv_status == ToolStatus::Completed {
            metrics.audit_fully_completed += 1;
        }
        if row.genomad_status == ToolStatus::Pending && row.checkv_status == ToolStatus::Pending {
            metrics.audit_not_started += 1;
        }
        if row.genomad_status == ToolStatus::Running || row.checkv_status == ToolStatus::Running {
            metrics.audit_in_progress += 1;
        }
    }
    print_summary(rows, &metrics);
    metrics
}


fn print_summary(rows: &[AuditRow], metrics: &AuditMetrics) {
    let total = rows.len().max(1) as f64;
    section_header("Analysis results");
    eprintln!("Total sequences analysed: {}", rows.len());
    eprintln!("Expected in benchmark TSV: {}", metrics.audit_expected_sequences);
    eprintln!("With dirs but not expected: {}", metrics.audit_unexpected_sequences);
    eprintln!("Fully completed: {} ({}%)", metrics.audit_fully_completed,
              format_float(metrics.audit_fully_completed as f64 / total * 100.0));
    eprintln!("Not yet started: {} ({}%)", metrics.audit_not_started,
              format_float(metrics.audit_not_started as f64 / total * 100.0));
    eprintln!("In progress: {} ({}%)", metrics.audit_in_progress,
              format_float(metrics.audit_in_progress as f64 / total * 100.0));

    eprintln!();
    eprintln!("geNomad statuses:");
    for (status, count) in value_counts(rows.iter().map(|r| r.genomad_status.as_str())) {
        eprintln!("  {}: {}", status, count);
    }
    eprintln!("CheckV statuses:");
    for (status, count) in value_counts(rows.iter().map(|r| r.checkv_status.as_str())) {
        eprintln!("  {}: {}", status, count);
    }
    eprintln!();
    eprintln!("geNomad disk detail:");
    for (status, count) in value_counts(rows.iter().map(|r| r.genomad_disk.as_str())) {
        eprintln!("  {}: {}", status, count);
    }
    eprintln!("CheckV disk detail:");
    for (status, count) in value_counts(rows.iter().map(|r| r.checkv_disk.as_str())) {
        eprintln!("  {}: {}", status, count);
    }

    eprintln!();
    for line in recommendations(metrics) {
        eprintln!("{}", line);
    }
}


fn value_counts<'a>(values: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, u32> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}


pub fn recommendations(metrics: &AuditMetrics) -> Vec<String> {
    let mut lines = Vec::new();
    let expected = metrics.audit_expected_sequences;
    let completed = metrics.audit_fully_completed;
    if expected > 0 && completed >= expected {
        lines.push("All expected sequences are processed - the results are ready for \
                    analysis.".to_string());
    } else if expected > 0 && completed as f64 / expected as f64 > 0.95 {
        lines.push(format!("Almost done: {} expected sequences remain. Re-run votukit batch to \
                            finish them.", expected - completed));
    } else if metrics.audit_not_started > completed {
        lines.push("Most sequences have not been processed yet. Re-run votukit batch (consider \
                    raising --threads).".to_string());
    } else {
        lines.push("Processing is underway. Re-run votukit batch to finish the remaining \
                    sequences.".to_string());
    }
    if metrics.audit_unexpected_sequences > 0 {
        lines.push(format!("Found {} sequences with output directories that are not listed in \
                            the benchmark TSV - possibly left over from earlier runs.",
                           metrics.audit_unexpected_sequences));
    }
    lines
}


fn save_report(metrics: &AuditMetrics, report_file: &Path) {
    let mut content = String::new();
    content.push_str("=== DISK ANALYSIS REPORT ===\n");
    content.push_str(&format!("Date: {}\n\n", Local::now().format("%Y-%m-%d %H:%M:%S")));
    content.push_str(&format!("Total sequences analysed: {}\n", metrics.audit_total_sequences));
    content.push_str(&format!("Expected sequences: {}\n", metrics.audit_expected_sequences));
    content.push_str(&format!("Fully completed: {}\n", metrics.audit_fully_completed));
    content.push_str(&format!("Not yet started: {}\n", metrics.audit_not_started));
    content.push_str(&format!("In progress: {}\n", metrics.audit_in_progress));
    content.push_str(&format!("Unexpected sequences: {}\n\n", metrics.audit_unexpected_sequences));
    if metrics.audit_fully_completed >= metrics.audit_expected_sequences {
        content.push_str("STATUS: all expected sequences are processed\n");
    } else {
        content.push_str(&format!("STATUS: {} expected sequences remain\n",
                                  metrics.audit_expected_sequences -
                                  metrics.audit_fully_completed));
    }
    let mut file = match File::create(report_file) {
        Ok(file) => file,
        Err(e) => quit_with_error(&format!("failed to create {}\n{}",
                                           report_file.display(), e)),
    };
    if let Err(e) = file.write_all(content.as_bytes()) {
        quit_with_error(&format!("failed to write {}\n{}", report_file.display(), e));
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::create_dir;
    use crate::status::{CheckvDiskStatus, GenomadDiskStatus};
    use crate::tests::make_test_file;
    use tempfile::tempdir;

    fn audit_row(seq_id: &str, genomad: ToolStatus, checkv: ToolStatus,
                 in_expected: bool) -> AuditRow {
        AuditRow {
            seq_id: seq_id.to_string(),
            genomad_disk: GenomadDiskStatus::NotStarted,
            checkv_disk: CheckvDiskStatus::NotStarted,
            genomad_status: genomad,
            checkv_status: checkv,
            in_expected,
            has_genomad_dir: false,
            has_checkv_dir: false,
        }
    }

    #[test]
    fn test_load_expected_ids() {
        let dir = tempdir().unwrap();
        let in_tsv = dir.path().join("benchmark.tsv");
        make_test_file(&in_tsv, "s1\tx\tACGT\ns2\ty\tGGGG\n");
        assert_eq!(load_expected_ids(&in_tsv), vec!["s1", "s2"]);
    }

    #[test]
    fn test_scan_existing_directories() {
        let dir = tempdir().unwrap();
        create_dir(&dir.path().join("s1_genomad"));
        create_dir(&dir.path().join("s1_checkv"));
        create_dir(&dir.path().join("contig_77_genomad"));
        create_dir(&dir.path().join("fasta"));           // not a tool dir
        make_test_file(&dir.path().join("s9_checkv"), "a file, not a directory\n");
        let found = scan_existing_directories(dir.path());
        let found: Vec<&String> = found.iter().collect();
        assert_eq!(found, vec!["contig_77", "s1"]);
    }

    #[test]
    fn test_summarise() {
        let rows = vec![
            audit_row("s1", ToolStatus::Completed, ToolStatus::Completed, true),
            audit_row("s2", ToolStatus::CompletedNoHits, ToolStatus::Completed, true),
            audit_row("s3", ToolStatus::Pending, ToolStatus::Pending, true),
            audit_row("s4", ToolStatus::Running, ToolStatus::Pending, true),
            audit_row("s5", ToolStatus::Completed, ToolStatus::Failed, false),
        ];
        let expected: Vec<String> =
            ["s1", "s2", "s3", "s4"].iter().map(|s| s.to_string()).collect();
        let metrics = summarise(&rows, &expected);
        assert_eq!(metrics.audit_total_sequences, 5);
        assert_eq!(metrics.audit_expected_sequences, 4);
        assert_eq!(metrics.audit_unexpected_sequences, 1);
        assert_eq!(metrics.audit_fully_completed, 2);
        assert_eq!(metrics.audit_not_started, 1);
        assert_eq!(metrics.audit_in_progress, 1);
    }

    #[test]
    fn test_recommendations() {
        let mut metrics = AuditMetrics::new();
        metrics.audit_expected_sequences = 10;
        metrics.audit_fully_completed = 10;
        assert!(recommendations(&metrics)[0].contains("ready for analysis"));

        metrics.audit_fully_completed = 2;
        metrics.audit_not_started = 7;
        assert!(recommendations(&metrics)[0].contains("not been processed yet"));

        metrics.audit_unexpected_sequences = 3;
        let lines = recommendations(&metrics);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("3 sequences"));
    }
}
