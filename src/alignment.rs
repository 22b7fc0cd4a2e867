// This file contains types and functions for working with tabular alignment results: the
// 12-column BLAST-like tables produced by mmseqs2, fasta36 and DIAMOND.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use fxhash::FxHashSet;
use std::io::prelude::*;
use std::path::Path;
use std::str::FromStr;

use crate::misc::{check_if_file_exists, open_maybe_gzipped, quit_with_error, spinner};


#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub query: String,
    pub target: String,
    pub identity: f64,
    pub length: u32,
    pub mismatches: u32,
    pub gap_opens: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub evalue: f64,
    pub bitscore: f64,
}

impl AlignmentRecord {
    pub fn from_line(line: &str, filename: &Path, line_num: u64) -> Self {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 12 {
            quit_with_error(&format!("{} line {} has {} columns (12 required)",
                                     filename.display(), line_num, parts.len()));
        }
        AlignmentRecord {
            query: parts[0].to_string(),
            target: parts[1].to_string(),
            identity: parse_column(parts[2], filename, line_num),
            length: parse_column(parts[3], filename, line_num),
            mismatches: parse_column(parts[4], filename, line_num),
            gap_opens: parse_column(parts[5], filename, line_num),
            query_start: parse_column(parts[6], filename, line_num),
            query_end: parse_column(parts[7], filename, line_num),
            target_start: parse_column(parts[8], filename, line_num),
            target_end: parse_column(parts[9], filename, line_num),
            evalue: parse_column(parts[10], filename, line_num),
            bitscore: parse_column(parts[11], filename, line_num),
        }
    }

    pub fn pair(&self) -> String {
        pair_key(&self.query, &self.target)
    }
}


fn parse_column<T: FromStr>(text: &str, filename: &Path, line_num: u64) -> T {
    match text.parse::<T>() {
        Ok(value) => value,
        Err(_) => quit_with_error(&format!("{} line {} has an unparseable value: {}",
                                           filename.display(), line_num, text)),
    }
}


pub fn pair_key(query: &str, target: &str) -> String {
    // An aligned pair is identified by its query and target names joined with a separator that
    // cannot occur in sequence ids.
    format!("{}||{}", query, target)
}


pub fn load_alignments(filename: &Path) -> Vec<AlignmentRecord> {
    // Loads an entire alignment table into memory. Malformed lines are fatal.
    check_if_file_exists(filename);
    let pb = spinner(&format!("loading {}...", filename.display()));
    let mut records = Vec::new();
    let mut line_num = 0;
    for line in open_maybe_gzipped(filename).lines() {
        line_num += 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", filename.display(), e)),
        };
        if text.is_empty() { continue; }
        records.push(AlignmentRecord::from_line(&text, filename, line_num));
    }
    pb.finish_and_clear();
    records
}


pub fn load_pair_set(filename: &Path) -> FxHashSet<String> {
    // Loads only the query and target columns of an alignment table into a set of pair keys.
    // This keeps the memory footprint manageable for tables with hundreds of millions of rows.
    check_if_file_exists(filename);
    let pb = spinner(&format!("loading pairs from {}...", filename.display()));
    let mut pairs = FxHashSet::default();
    let mut line_num = 0;
    for line in open_maybe_gzipped(filename).lines() {
        line_num += 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", filename.display(), e)),
        };
        if text.is_empty() { continue; }
        let mut parts = text.split('\t');
        match (parts.next(), parts.next()) {
            (Some(query), Some(target)) => { pairs.insert(pair_key(query, target)); },
            _ => quit_with_error(&format!("{} line {} has fewer than two columns",
                                          filename.display(), line_num)),
        }
    }
    pb.finish_and_clear();
    pairs
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlapCounts {
    pub total: u64,    // rows seen in the streamed file
    pub common: u64,   // distinct pairs present in both inputs
    pub only_b: u64,   // streamed rows whose pair is absent from the loaded set
}


pub fn stream_overlap_counts(set_a: &FxHashSet<String>, filename: &Path) -> OverlapCounts {
    // Streams a second alignment table against an already-loaded pair set without ever storing
    // the streamed pairs. Matches are deduplicated against the loaded set (so common is a true
    // intersection size and never exceeds the set), which only needs memory proportional to the
    // set already held.
    check_if_file_exists(filename);
    let pb = spinner(&format!("streaming {}...", filename.display()));
    let mut counts = OverlapCounts::default();
    let mut matched: FxHashSet<&String> = FxHashSet::default();
    let mut line_num = 0;
    for line in open_maybe_gzipped(filename).lines() {
        line_num += 1;
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", filename.display(), e)),
        };
        if text.is_empty() { continue; }
        let mut parts = text.split('\t');
        let pair = match (parts.next(), parts.next()) {
            (Some(query), Some(target)) => pair_key(query, target),
            _ => quit_with_error(&format!("{} line {} has fewer than two columns",
                                          filename.display(), line_num)),
        };
        counts.total += 1;
        match set_a.get(&pair) {
            Some(found) => { if matched.insert(found) { counts.common += 1; } },
            None => counts.only_b += 1,
        }
    }
    pb.finish_and_clear();
    counts
}


pub fn overlap_and_jaccard(set_a: &FxHashSet<String>, set_b: &FxHashSet<String>)
        -> (usize, f64) {
    // Returns the intersection size and Jaccard index of two pair sets.
    let intersection = set_a.intersection(set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    let jaccard = if union == 0 { 0.0 } else { intersection as f64 / union as f64 };
    (intersection, jaccard)
}


pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { return 0.0; }
    values.iter().sum::<f64>() / values.len() as f64
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{assert_almost_eq, make_test_file};
    use std::panic;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn pair_set(pairs: &[(&str, &str)]) -> FxHashSet<String> {
        pairs.iter().map(|(q, t)| pair_key(q, t)).collect()
    }

    #[test]
    fn test_from_line() {
        let line = "q1\tt1\t97.5\t120\t3\t1\t1\t120\t5\t124\t1e-50\t230.0";
        let record = AlignmentRecord::from_line(line, &PathBuf::from("test.tsv"), 1);
        assert_eq!(record.query, "q1");
        assert_eq!(record.target, "t1");
        assert_almost_eq(record.identity, 97.5, 1e-9);
        assert_eq!(record.length, 120);
        assert_eq!(record.mismatches, 3);
        assert_eq!(record.gap_opens, 1);
        assert_eq!(record.query_start, 1);
        assert_eq!(record.query_end, 120);
        assert_eq!(record.target_start, 5);
        assert_eq!(record.target_end, 124);
        assert_almost_eq(record.evalue, 1e-50, 1e-60);
        assert_almost_eq(record.bitscore, 230.0, 1e-9);
        assert_eq!(record.pair(), "q1||t1");
    }

    #[test]
    fn test_from_line_bad() {
        let path = PathBuf::from("test.tsv");
        assert!(panic::catch_unwind(|| {
            AlignmentRecord::from_line("q1\tt1\t97.5", &path, 1);
        }).is_err());
        assert!(panic::catch_unwind(|| {
            AlignmentRecord::from_line("q1\tt1\tabc\t120\t3\t1\t1\t120\t5\t124\t1e-50\t230.0",
                                       &path, 1);
        }).is_err());
    }

    #[test]
    fn test_load_pair_set() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("aln.tsv");
        make_test_file(&table, "a\tb\t90.0\t10\t1\t0\t1\t10\t1\t10\t1e-5\t50.0\n\
                                a\tc\t90.0\t10\t1\t0\t1\t10\t1\t10\t1e-5\t50.0\n\
                                a\tb\t85.0\t10\t1\t0\t1\t10\t1\t10\t1e-4\t40.0\n");
        let pairs = load_pair_set(&table);
        assert_eq!(pairs.len(), 2);  // duplicate a||b collapses
        assert!(pairs.contains("a||b"));
        assert!(pairs.contains("a||c"));
    }

    #[test]
    fn test_stream_overlap_counts() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("aln.tsv");
        make_test_file(&table, "a\tb\nb\tc\nc\td\na\tb\nb\tc\n");
        let set_a = pair_set(&[("a", "b"), ("x", "y")]);
        let counts = stream_overlap_counts(&set_a, &table);
        assert_eq!(counts.total, 5);
        assert_eq!(counts.common, 1);  // a||b appears twice but is one shared pair
        assert_eq!(counts.only_b, 3);
        // The set identity behind the summary: shared pairs plus pairs only in the loaded set
        // add up to the loaded set's size.
        let only_a = set_a.len() as u64 - counts.common;
        assert_eq!(counts.common + only_a, set_a.len() as u64);
    }

    #[test]
    fn test_overlap_and_jaccard() {
        let set_a = pair_set(&[("a", "b"), ("b", "c"), ("c", "d")]);
        let set_b = pair_set(&[("b", "c"), ("c", "d"), ("d", "e"), ("e", "f")]);
        let (intersection, jaccard) = overlap_and_jaccard(&set_a, &set_b);
        assert_eq!(intersection, 2);
        assert_almost_eq(jaccard, 2.0 / 5.0, 1e-9);

        let empty = FxHashSet::default();
        let (intersection, jaccard) = overlap_and_jaccard(&empty, &empty);
        assert_eq!(intersection, 0);
        assert_almost_eq(jaccard, 0.0, 1e-9);
    }

    #[test]
    fn test_mean() {
        assert_almost_eq(mean(&[]), 0.0, 1e-9);
        assert_almost_eq(mean(&[1.0, 2.0, 3.0]), 2.0, 1e-9);
    }
}
