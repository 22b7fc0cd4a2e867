// This file contains the code for the votukit batch subcommand: run geNomad and CheckV over
// every sequence of a benchmark TSV, in parallel, resuming from whatever already exists on disk.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use colored::Colorize;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::external::{check_requirements, checkv_end_to_end, genomad_end_to_end, run_command};
use crate::log::{section_header, explanation};
use crate::metrics::BatchMetrics;
use crate::misc::{check_if_dir_exists, check_if_dir_is_not_dir, check_if_file_exists, create_dir,
                  first_and_last_column, format_duration, open_maybe_gzipped, progress_bar,
                  quit_with_error};
use crate::status::{checkv_dir, genomad_dir, probe_checkv, probe_genomad, StatusTable,
                    ToolStatus, STATUS_FILE_NAME};


pub fn batch(in_tsv: PathBuf, out_dir: PathBuf, genomad_db: PathBuf, checkv_db: PathBuf,
             threads: usize) {
    let start_time = std::time::Instant::now();
    check_settings(&in_tsv, &out_dir, &genomad_db, &checkv_db, threads);
    starting_message();
    print_settings(&in_tsv, &out_dir, &genomad_db, &checkv_db, threads);
    check_requirements(&["genomad", "checkv"]);
    create_dir(&out_dir);
    let fasta_dir = out_dir.join("fasta");
    create_dir(&fasta_dir);

    let sequences = load_benchmark_sequences(&in_tsv);
    let status_file = out_dir.join(STATUS_FILE_NAME);
    let mut status_table = StatusTable::load(&status_file);

    let outcomes = classify_sequences(&sequences, &out_dir, &fasta_dir,
                                      &genomad_db, &checkv_db);

    let metrics = merge_outcomes(&outcomes, &mut status_table);
    status_table.save(&status_file);
    metrics.save_to_yaml(&out_dir.join("batch.yaml"));
    finished_message(&status_file, &outcomes, sequences.len(), start_time);
}


fn check_settings(in_tsv: &Path, out_dir: &Path, genomad_db: &Path, checkv_db: &Path,
                  threads: usize) {
    check_if_file_exists(in_tsv);
    check_if_dir_is_not_dir(out_dir);
    check_if_dir_exists(genomad_db);
    check_if_dir_exists(checkv_db);
    if threads < 1   { quit_with_error("--threads cannot be less than 1"); }
    if threads > 100 { quit_with_error("--threads cannot be greater than 100"); }
    ThreadPoolBuilder::new().num_threads(threads).build_global().unwrap();
}


fn starting_message() {
    section_header("Starting votukit batch");
    explanation("This command runs geNomad and CheckV over each sequence of the benchmark TSV, \
                 using a fixed-size worker pool. Sequences whose on-disk results are already \
                 complete are skipped, so an interrupted batch can simply be run again.");
}


fn print_settings(in_tsv: &Path, out_dir: &Path, genomad_db: &Path, checkv_db: &Path,
                  threads: usize) {
    eprintln!("Settings:");
    eprintln!("  --in_tsv {}", in_tsv.display());
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!("  --genomad_db {}", genomad_db.display());
    eprintln!("  --checkv_db {}", checkv_db.display());
    eprintln!("  --threads {}", threads);
    eprintln!();
}


fn finished_message(status_file: &Path, outcomes: &[(String, Option<SequenceOutcome>)],
                    sequence_count: usize, start_time: std::time::Instant) {
    section_header("Finished!");
    let skipped = outcomes.iter().filter(|(_, outcome)| outcome.is_none()).count();
    if skipped > 0 {
        eprintln!("{}", format!("Interrupted: {} of {} sequences were not processed",
                                skipped, sequence_count).red());
    }
    eprintln!("Status file: {}", status_file.display());
    eprintln!("Total time: {}", format_duration(start_time.elapsed()));
    eprintln!();
}


pub fn load_benchmark_sequences(in_tsv: &Path) -> Vec<(String, String)> {
    // Loads id+sequence pairs from the headerless benchmark TSV (id in the first column,
    // sequence in the last).
    let mut sequences = Vec::new();
    let mut line_num = 0;
    for line in open_maybe_gzipped(in_tsv).lines() {
        line_num += 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", in_tsv.display(), e)),
        };
        if text.is_empty() { continue; }
        match first_and_last_column(&text) {
            Some((id, sequence)) => sequences.push((id, sequence)),
            None => quit_with_error(&format!("{} line {} has fewer than two columns",
                                             in_tsv.display(), line_num)),
        }
    }
    if sequences.is_empty() {
        quit_with_error(&format!("no sequences found in {}", in_tsv.display()));
    }
    sequences
}


#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub genomad_status: ToolStatus,
    pub checkv_status: ToolStatus,
    pub genomad_skipped: bool,
    pub checkv_skipped: bool,
}


fn classify_sequences(sequences: &[(String, String)], out_dir: &Path, fasta_dir: &Path,
                      genomad_db: &Path, checkv_db: &Path)
        -> Vec<(String, Option<SequenceOutcome>)> {
    section_header("Classifying sequences");
    explanation("Each sequence is written to its own FASTA file and run through geNomad and \
                 CheckV. Results and per-sequence log lines are gathered once all workers have \
                 finished.");
    eprintln!("Sequences to process: {}", sequences.len());

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || stop_handler.store(true, Ordering::Relaxed)) {
        quit_with_error(&format!("failed to set interrupt handler\n{}", e));
    }

    let pb = progress_bar(sequences.len() as u64, "classifying");
    let results: Vec<_> = sequences.par_iter().map(|(seq_id, sequence)| {  // parallel for loop with rayon
        if stop.load(Ordering::Relaxed) {
            return (seq_id.clone(), None, Vec::new());
        }
        let (outcome, messages) = process_sequence(seq_id, sequence, out_dir, fasta_dir,
                                                   genomad_db, checkv_db);
        pb.inc(1);
        (seq_id.clone(), Some(outcome), messages)
    }).collect();
    pb.finish_and_clear();

    for (_, _, messages) in &results {
        for message in messages {
            eprintln!("{}", message);
        }
    }
    eprintln!();
    results.into_iter().map(|(seq_id, outcome, _)| (seq_id, outcome)).collect()
}


fn process_sequence(seq_id: &str, sequence: &str, out_dir: &Path, fasta_dir: &Path,
                    genomad_db: &Path, checkv_db: &Path) -> (SequenceOutcome, Vec<String>) {
    let mut messages = Vec::new();
    let fasta_path = fasta_dir.join(format!("{}.fasta", seq_id));
    if let Err(e) = write_fasta_if_missing(&fasta_path, seq_id, sequence) {
        messages.push(format!("{}: {}", seq_id,
                              format!("failed to write FASTA ({})", e).red()));
        let outcome = SequenceOutcome { genomad_status: ToolStatus::Error,
                                        checkv_status: ToolStatus::Error,
                                        genomad_skipped: false, checkv_skipped: false };
        return (outcome, messages);
    }

    let (genomad_status, genomad_skipped) =
        run_genomad(seq_id, &fasta_path, out_dir, genomad_db, &mut messages);
    let (checkv_status, checkv_skipped) =
        run_checkv(seq_id, &fasta_path, out_dir, checkv_db, &mut messages);

    (SequenceOutcome { genomad_status, checkv_status, genomad_skipped, checkv_skipped },
     messages)
}


fn write_fasta_if_missing(fasta_path: &Path, seq_id: &str, sequence: &str)
        -> std::io::Result<()> {
    if fasta_path.exists() {
        return Ok(());
    }
    let mut file = File::create(fasta_path)?;
    writeln!(file, ">{}\n{}", seq_id, sequence)?;
    Ok(())
}


fn run_genomad(seq_id: &str, fasta_path: &Path, out_dir: &Path, genomad_db: &Path,
               messages: &mut Vec<String>) -> (ToolStatus, bool) {
    let probe = probe_genomad(out_dir, seq_id);
    if probe.is_complete() {
        messages.push(format!("{}: {}", seq_id, "geNomad already complete".green()));
        return (probe.to_standard(), true);
    }
    let tool_dir = genomad_dir(out_dir, seq_id);
    create_dir(&tool_dir);
    match run_command(&mut genomad_end_to_end(fasta_path, &tool_dir, genomad_db)) {
        Ok(_) => {
            let new_probe = probe_genomad(out_dir, seq_id);
            if new_probe.is_complete() {
                messages.push(format!("{}: {}", seq_id, "geNomad completed".green()));
                (new_probe.to_standard(), false)
            } else {
                messages.push(format!("{}: {}", seq_id,
                                      "geNomad finished but left no summary".yellow()));
                (ToolStatus::Incomplete, false)
            }
        },
        Err(e) => {
            messages.push(format!("{}: {}\n{}", seq_id, "geNomad failed".red(), e));
            (ToolStatus::Failed, false)
        },
    }
}


fn run_checkv(seq_id: &str, fasta_path: &Path, out_dir: &Path, checkv_db: &Path,
              messages: &mut Vec<String>) -> (ToolStatus, bool) {
    let probe = probe_checkv(out_dir, seq_id);
    if probe.is_complete() {
        messages.push(format!("{}: {}", seq_id, "CheckV already complete".green()));
        return (probe.to_standard(), true);
    }
    let tool_dir = checkv_dir(out_dir, seq_id);
    create_dir(&tool_dir);
    match run_command(&mut checkv_end_to_end(fasta_path, &tool_dir, checkv_db)) {
        Ok(_) => {
            let new_probe = probe_checkv(out_dir, seq_id);
            if new_probe.is_complete() {
                messages.push(format!("{}: {}", seq_id, "CheckV completed".green()));
                (new_probe.to_standard(), false)
            } else {
                messages.push(format!("{}: {}", seq_id,
                                      "CheckV finished but left no quality summary".yellow()));
                (ToolStatus::Incomplete, false)
            }
        },
        Err(e) => {
            messages.push(format!("{}: {}\n{}", seq_id, "CheckV failed".red(), e));
            (ToolStatus::Failed, false)
        },
    }
}


fn merge_outcomes(outcomes: &[(String, Option<SequenceOutcome>)],
                  status_table: &mut StatusTable) -> BatchMetrics {
    let mut metrics = BatchMetrics::new();
    for (seq_id, outcome) in outcomes {
        let Some(outcome) = outcome else { continue; };
        metrics.batch_sequence_count += 1;
        if outcome.genomad_skipped { metrics.batch_skipped_genomad += 1; }
        if outcome.checkv_skipped  { metrics.batch_skipped_checkv += 1; }
        match outcome.genomad_status {
            ToolStatus::Completed       => metrics.genomad_completed += 1,
            ToolStatus::CompletedNoHits => metrics.genomad_completed_no_hits += 1,
            ToolStatus::Incomplete      => metrics.genomad_incomplete += 1,
            ToolStatus::Failed          => metrics.genomad_failed += 1,
            _                           => metrics.genomad_error += 1,
        }
        match outcome.checkv_status {
            ToolStatus::Completed  => metrics.checkv_completed += 1,
            ToolStatus::Incomplete => metrics.checkv_incomplete += 1,
            ToolStatus::Failed     => metrics.checkv_failed += 1,
            _                      => metrics.checkv_error += 1,
        }
        status_table.set(seq_id, outcome.genomad_status, outcome.checkv_status);
    }
    metrics
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_test_file;
    use std::panic;
    use tempfile::tempdir;

    #[test]
    fn test_load_benchmark_sequences() {
        let dir = tempdir().unwrap();
        let in_tsv = dir.path().join("benchmark.tsv");
        make_test_file(&in_tsv, "s1\tx\t1\tACGT\ns2\ty\t0\tGGGG\n");
        let sequences = load_benchmark_sequences(&in_tsv);
        assert_eq!(sequences, vec![("s1".to_string(), "ACGT".to_string()),
                                   ("s2".to_string(), "GGGG".to_string())]);
    }

    #[test]
    fn test_load_benchmark_sequences_malformed() {
        let dir = tempdir().unwrap();
        let in_tsv = dir.path().join("benchmark.tsv");
        make_test_file(&in_tsv, "s1\tACGT\njust_one_column\n");
        assert!(panic::catch_unwind(|| { load_benchmark_sequences(&in_tsv); }).is_err());
    }

    #[test]
    fn test_write_fasta_if_missing() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("s1.fasta");
        write_fasta_if_missing(&fasta, "s1", "ACGT").unwrap();
        assert_eq!(std::fs::read_to_string(&fasta).unwrap(), ">s1\nACGT\n");

        // A second call must not clobber the existing file.
        make_test_file(&fasta, ">s1\nTTTT\n");
        write_fasta_if_missing(&fasta, "s1", "ACGT").unwrap();
        assert_eq!(std::fs::read_to_string(&fasta).unwrap(), ">s1\nTTTT\n");
    }

    #[test]
    fn test_merge_outcomes() {
        let outcomes = vec![
            ("s1".to_string(), Some(SequenceOutcome {
                genomad_status: ToolStatus::Completed, checkv_status: ToolStatus::Completed,
                genomad_skipped: true, checkv_skipped: false })),
            ("s2".to_string(), Some(SequenceOutcome {
                genomad_status: ToolStatus::Failed, checkv_status: ToolStatus::Incomplete,
                genomad_skipped: false, checkv_skipped: false })),
            ("s3".to_string(), None),  // interrupted before processing
        ];
        let mut table = StatusTable::new();
        let metrics = merge_outcomes(&outcomes, &mut table);
        assert_eq!(metrics.batch_sequence_count, 2);
        assert_eq!(metrics.batch_skipped_genomad, 1);
        assert_eq!(metrics.genomad_completed, 1);
        assert_eq!(metrics.genomad_failed, 1);
        assert_eq!(metrics.checkv_completed, 1);
        assert_eq!(metrics.checkv_incomplete, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("s3"), None);
    }
}
