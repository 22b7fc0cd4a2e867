// This file contains the code for the votukit pipeline subcommand: extract viral sequences from
// a benchmark TSV, combine them with reference sequences, predict genes with Prodigal and run an
// all-vs-all MMseqs2 search over the predicted proteins.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::external::{check_requirements, mmseqs_convertalis, mmseqs_createdb, mmseqs_search,
                      prodigal, run_step};
use crate::log::{section_header, explanation};
use crate::metrics::PipelineMetrics;
use crate::misc::{check_if_dir_is_not_dir, check_if_file_exists, count_fasta_sequences,
                  create_dir, format_float, open_maybe_gzipped, quit_with_error};


pub fn pipeline(in_tsv: PathBuf, reference: PathBuf, out_dir: PathBuf, threads: usize,
                evalue: f64, max_seqs: u32) {
    let start_time = std::time::Instant::now();
    check_settings(&in_tsv, &reference, &out_dir, threads, evalue);
    starting_message();
    print_settings(&in_tsv, &reference, &out_dir, threads, evalue, max_seqs);
    create_dir(&out_dir);
    check_requirements(&["prodigal", "mmseqs"]);
    let mut metrics = PipelineMetrics::new();

    let viral_fasta = out_dir.join("viral_sequences.fna");
    extract_step(&in_tsv, &viral_fasta, &mut metrics);

    let combined_fasta = out_dir.join("combined_sequences.fna");
    combine_step(&viral_fasta, &reference, &combined_fasta, &mut metrics);

    let faa_file = gene_calling_step(&combined_fasta, &out_dir, &mut metrics);
    let alignment_tsv = alignment_step(&faa_file, &out_dir, threads, evalue, max_seqs,
                                       &mut metrics);

    metrics.save_to_yaml(&out_dir.join("pipeline.yaml"));
    finished_message(&viral_fasta, &combined_fasta, &faa_file, &alignment_tsv, start_time);
}


fn check_settings(in_tsv: &Path, reference: &Path, out_dir: &Path, threads: usize, evalue: f64) {
    check_if_file_exists(in_tsv);
    check_if_file_exists(reference);
    check_if_dir_is_not_dir(out_dir);
    if threads < 1   { quit_with_error("--threads cannot be less than 1"); }
    if threads > 100 { quit_with_error("--threads cannot be greater than 100"); }
    if evalue <= 0.0 { quit_with_error("--evalue must be greater than 0"); }
}


fn starting_message() {
    section_header("Starting votukit pipeline");
    explanation("This command extracts viral sequences from a benchmark TSV, combines them with \
                 reference sequences, predicts genes with Prodigal and then runs an all-vs-all \
                 MMseqs2 search over the predicted proteins.");
}


fn print_settings(in_tsv: &Path, reference: &Path, out_dir: &Path, threads: usize, evalue: f64,
                  max_seqs: u32) {
    eprintln!("Settings:");
    eprintln!("  --in_tsv {}", in_tsv.display());
    eprintln!("  --reference {}", reference.display());
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!("  --threads {}", threads);
    eprintln!("  --evalue {:e}", evalue);
    eprintln!("  --max_seqs {}", max_seqs);
    eprintln!();
}


fn finished_message(viral_fasta: &Path, combined_fasta: &Path, faa_file: &Path,
                    alignment_tsv: &Path, start_time: std::time::Instant) {
    section_header("Finished!");
    eprintln!("Viral sequences:     {}", viral_fasta.display());
    eprintln!("Combined sequences:  {}", combined_fasta.display());
    eprintln!("Predicted proteins:  {}", faa_file.display());
    eprintln!("All-vs-all table:    {}", alignment_tsv.display());
    eprintln!("Total time: {}", crate::misc::format_duration(start_time.elapsed()));
    eprintln!();
}


fn extract_step(in_tsv: &Path, viral_fasta: &Path, metrics: &mut PipelineMetrics) {
    section_header("Extracting viral sequences");
    explanation("Rows of the benchmark TSV flagged as viral are written out as FASTA.");
    let (total_count, viral_count) = extract_viral_sequences(in_tsv, viral_fasta);
    metrics.input_sequence_count = total_count as u32;
    metrics.viral_sequence_count = viral_count as u32;
    metrics.calculate_fraction();
    eprintln!("Sequences in TSV:  {}", total_count);
    eprintln!("Viral sequences:   {}", viral_count);
    eprintln!("Viral fraction:    {}%", format_float(metrics.viral_sequence_fraction * 100.0));
    eprintln!();
    if viral_count == 0 {
        quit_with_error(&format!("no viral sequences found in {}", in_tsv.display()));
    }
}


pub fn extract_viral_sequences(in_tsv: &Path, viral_fasta: &Path) -> (usize, usize) {
    // Reads the benchmark TSV (header line, then id in the first column, viral flag in the third
    // and sequence in the last) and writes the viral rows as FASTA. Returns the total row count
    // and the viral row count.
    let mut out_file = match File::create(viral_fasta) {
        Ok(file) => file,
        Err(e) => quit_with_error(&format!("failed to create {}\n{}",
                                           viral_fasta.display(), e)),
    };
    let mut total_count = 0;
    let mut viral_count = 0;
    for line in open_maybe_gzipped(in_tsv).lines().skip(1) {
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", in_tsv.display(), e)),
        };
        if text.is_empty() { continue; }
        total_count += 1;
        let fields: Vec<&str> = text.split('\t').collect();
        if fields.len() >= 3 && fields[2] == "1" {
            viral_count += 1;
            let seq_id = fields[0];
            let sequence = fields[fields.len() - 1];
            if let Err(e) = writeln!(out_file, ">{}\n{}", seq_id, sequence) {
                quit_with_error(&format!("failed to write {}\n{}", viral_fasta.display(), e));
            }
        }
    }
    (total_count, viral_count)
}


fn combine_step(viral_fasta: &Path, reference: &Path, combined_fasta: &Path,
                metrics: &mut PipelineMetrics) {
    section_header("Combining with reference sequences");
    explanation("The extracted viral sequences and the reference sequences are concatenated into \
                 one FASTA file for gene calling.");
    combine_sequences(viral_fasta, reference, combined_fasta);
    metrics.reference_sequence_count = count_fasta_sequences(reference) as u32;
    metrics.combined_sequence_count = count_fasta_sequences(combined_fasta) as u32;
    eprintln!("Viral sequences:     {}", metrics.viral_sequence_count);
    eprintln!("Reference sequences: {}", metrics.reference_sequence_count);
    eprintln!("Combined total:      {}", metrics.combined_sequence_count);
    eprintln!();
}


pub fn combine_sequences(viral_fasta: &Path, reference: &Path, combined_fasta: &Path) {
    // Concatenates the two FASTA files, decompressing gzipped input on the way.
    let mut out_file = match File::create(combined_fasta) {
        Ok(file) => file,
        Err(e) => quit_with_error(&format!("failed to create {}\n{}",
                                           combined_fasta.display(), e)),
    };
    for input in [viral_fasta, reference] {
        for line in open_maybe_gzipped(input).lines() {
            let text = match line {
                Ok(text) => text,
                Err(e) => quit_with_error(&format!("failed to read {}\n{}",
                                                   input.display(), e)),
            };
            if text.is_empty() { continue; }
            if let Err(e) = writeln!(out_file, "{}", text) {
                quit_with_error(&format!("failed to write {}\n{}",
                                         combined_fasta.display(), e));
            }
        }
    }
}


fn gene_calling_step(combined_fasta: &Path, out_dir: &Path,
                     metrics: &mut PipelineMetrics) -> PathBuf {
    section_header("Gene calling with Prodigal");
    explanation("Prodigal predicts protein-coding genes in metagenome mode.");
    let prefix = out_dir.join("vOTUs");
    let gff_file = prefix.with_extension("gff");
    let faa_file = prefix.with_extension("faa");
    let fna_file = prefix.with_extension("fna");
    run_step("predicting genes with Prodigal",
             &mut prodigal(combined_fasta, &gff_file, &faa_file, &fna_file));
    metrics.predicted_gene_count = count_fasta_sequences(&faa_file) as u32;
    eprintln!("Predicted genes: {}", metrics.predicted_gene_count);
    eprintln!();
    faa_file
}


fn alignment_step(faa_file: &Path, out_dir: &Path, threads: usize, evalue: f64, max_seqs: u32,
                  metrics: &mut PipelineMetrics) -> PathBuf {
    section_header("All-vs-all alignment with MMseqs2");
    explanation("The predicted proteins are searched against themselves and the hits are \
                 converted to a 12-column tab-separated table.");
    let db_path = out_dir.join("mmseqs_db");
    let result_path = out_dir.join("mmseqs_result");
    let tmp_dir = out_dir.join("tmp");
    let alignment_tsv = out_dir.join("vOTUs_alignment.tsv");

    run_step("creating the MMseqs2 database",
             &mut mmseqs_createdb(faa_file, &db_path));
    run_step("searching all-vs-all",
             &mut mmseqs_search(&db_path, &result_path, &tmp_dir, threads, evalue, max_seqs));
    run_step("converting hits to tabular format",
             &mut mmseqs_convertalis(&db_path, &result_path, &alignment_tsv));

    if tmp_dir.exists() {
        let _ = std::fs::remove_dir_all(&tmp_dir);  // best-effort cleanup of MMseqs2 temp files
    }
    if !alignment_tsv.exists() {
        quit_with_error(&format!("MMseqs2 produced no alignment table at {}",
                                 alignment_tsv.display()));
    }
    metrics.alignment_count = count_lines(&alignment_tsv);
    eprintln!("Alignments found: {}", metrics.alignment_count);
    eprintln!();
    alignment_tsv
}


fn count_lines(filename: &Path) -> u64 {
    // A search with no hits at all leaves an empty table, which counts as zero lines.
    if filename.metadata().map(|m| m.len()).unwrap_or(0) < 2 { return 0; }
    open_maybe_gzipped(filename).lines().map_while(Result::ok)
        .filter(|line| !line.is_empty()).count() as u64
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_test_file;
    use tempfile::tempdir;

    #[test]
    fn test_extract_viral_sequences() {
        let dir = tempdir().unwrap();
        let in_tsv = dir.path().join("benchmark.tsv");
        let out_fasta = dir.path().join("viral.fna");
        make_test_file(&in_tsv,
                       "id\tsource\tviral\tsequence\n\
                        s1\tx\t1\tACGT\n\
                        s2\tx\t0\tGGGG\n\
                        s3\tx\t1\tTTTT\n");
        let (total, viral) = extract_viral_sequences(&in_tsv, &out_fasta);
        assert_eq!(total, 3);
        assert_eq!(viral, 2);
        let content = std::fs::read_to_string(&out_fasta).unwrap();
        assert_eq!(content, ">s1\nACGT\n>s3\nTTTT\n");
    }

    #[test]
    fn test_extract_viral_sequences_short_rows() {
        // Rows with fewer than three columns can never be viral but still count as input.
        let dir = tempdir().unwrap();
        let in_tsv = dir.path().join("benchmark.tsv");
        let out_fasta = dir.path().join("viral.fna");
        make_test_file(&in_tsv, "id\tsequence\ns1\tACGT\ns2\tGGGG\n");
        let (total, viral) = extract_viral_sequences(&in_tsv, &out_fasta);
        assert_eq!(total, 2);
        assert_eq!(viral, 0);
    }

    #[test]
    fn test_combine_sequences() {
        let dir = tempdir().unwrap();
        let viral = dir.path().join("viral.fna");
        let reference = dir.path().join("reference.fna");
        let combined = dir.path().join("combined.fna");
        make_test_file(&viral, ">v1\nACGT\n");
        make_test_file(&reference, ">r1\nGGGG\n>r2\nTTTT\n");
        combine_sequences(&viral, &reference, &combined);
        let content = std::fs::read_to_string(&combined).unwrap();
        assert_eq!(content, ">v1\nACGT\n>r1\nGGGG\n>r2\nTTTT\n");
        assert_eq!(count_fasta_sequences(&combined), 3);
    }
}
