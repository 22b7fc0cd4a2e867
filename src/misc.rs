// This file contains miscellaneous functions used by various parts of Votukit.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use indicatif::{ProgressBar, ProgressStyle};
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs::{File, create_dir_all};
use std::io;
use std::io::{prelude::*, BufReader, Read};
use std::path::Path;
use std::time::Duration;


pub fn create_dir(dir_path: &Path) {
    match create_dir_all(dir_path) {
        Ok(_) => {},
        Err(e) => quit_with_error(&format!("failed to create directory {}\n{}",
                                           dir_path.display(), e)),
    }
}


pub fn check_if_file_exists(filename: &Path) {
    // Quits with an error if the given path is not an existing file.
    if !filename.exists() {
        quit_with_error(&format!("file does not exist: {}", filename.display()));
    }
    if !filename.is_file() {
        quit_with_error(&format!("{} is not a file", filename.display()));
    }
}


pub fn check_if_dir_exists(dir: &Path) {
    // Quits with an error if the given path is not an existing directory.
    if !dir.exists() {
        quit_with_error(&format!("directory does not exist: {}", dir.display()));
    }
    if !dir.is_dir() {
        quit_with_error(&format!("{} is not a directory", dir.display()));
    }
}


pub fn check_if_dir_is_not_dir(dir: &Path) {
    // Quits with an error if the given path exists but is not a directory (not existing is okay).
    if dir.exists() && !dir.is_dir() {
        quit_with_error(&format!("{} exists but is not a directory", dir.display()));
    }
}


#[cfg(not(test))]
pub fn quit_with_error(text: &str) -> ! {
    // For friendly error messages, this function normally just prints the error and quits.
    eprintln!();
    eprintln!("Error: {}", text);
    std::process::exit(1);
}
#[cfg(test)]
pub fn quit_with_error(text: &str) -> ! {
    // But when running unit tests, this function instead panics so I can catch it for the test.
    panic!("{}", text);
}


pub fn load_fasta(filename: &Path) -> Vec<(String, String, String)> {
    // This function loads a FASTA file and runs a few checks on the result. If everything looks
    // good, it returns a vector of name+header+sequence tuples.
    let load_result = if is_file_gzipped(filename) {
        load_fasta_gzipped(filename)
    } else {
        load_fasta_not_gzipped(filename)
    };
    match load_result {
        Ok(_)  => (),
        Err(e) => quit_with_error(&format!("unable to load {}\n{}", filename.display(), e)),
    }
    let fasta_seqs = load_result.unwrap();
    check_load_fasta(&fasta_seqs, filename);
    fasta_seqs
}


fn check_load_fasta(fasta_seqs: &[(String, String, String)], filename: &Path) {
    // This function looks at the result of the load_fasta function and does some checks to make
    // sure everything looks okay. If any problems are found, it will quit with an error message.
    if fasta_seqs.is_empty() {
        quit_with_error(&format!("{} contains no sequences", filename.display()));
    }
    for (name, _, sequence) in fasta_seqs {
        if name.is_empty() {
            quit_with_error(&format!("{} has an unnamed sequence", filename.display()));
        }
        if sequence.is_empty() {
            quit_with_error(&format!("{} has an empty sequence", filename.display()));
        }
    }
    let mut set = HashSet::new();
    for (name, _, _) in fasta_seqs {
        if !set.insert(name) {
            quit_with_error(&format!("{} has a duplicate name: {}", filename.display(), name));
        }
    }
}


pub fn is_file_gzipped(filename: &Path) -> bool {
    // This function returns true if the file appears to be gzipped (based on the first two bytes)
    // and false if not. If it can't open the file or read the first two bytes, it will quit with
    // an error message.
    let open_result = File::open(filename);
    match open_result {
        Ok(_)  => (),
        Err(e) => quit_with_error(&format!("unable to open {}\n{}", filename.display(), e)),
    }
    let file = open_result.unwrap();
    let mut reader = BufReader::new(file);
    let mut buf = vec![0u8; 2];
    let read_result = reader.read_exact(&mut buf);
    match read_result {
        Ok(_)  => (),
        Err(e) => quit_with_error(&format!("{} is too small\n{}", filename.display(), e)),
    }
    buf[0] == 31 && buf[1] == 139
}


pub fn open_maybe_gzipped(filename: &Path) -> BufReader<Box<dyn Read>> {
    // Returns a buffered reader for a text file that works on both unzipped and gzipped files.
    let file = match File::open(filename) {
        Ok(f)  => f,
        Err(e) => quit_with_error(&format!("unable to open {}\n{}", filename.display(), e)),
    };
    let reader: Box<dyn Read> = if is_file_gzipped(filename) { Box::new(GzDecoder::new(file)) }
                                                        else { Box::new(file) };
    BufReader::new(reader)
}


fn load_fasta_not_gzipped(filename: &Path) -> io::Result<Vec<(String, String, String)>> {
    let file = File::open(filename)?;
    load_fasta_from_reader(BufReader::new(file), filename)
}


fn load_fasta_gzipped(filename: &Path) -> io::Result<Vec<(String, String, String)>> {
    let file = File::open(filename)?;
    load_fasta_from_reader(BufReader::new(GzDecoder::new(file)), filename)
}


fn load_fasta_from_reader<R: BufRead>(reader: R, filename: &Path)
        -> io::Result<Vec<(String, String, String)>> {
    let mut fasta_seqs = Vec::new();
    let mut name = String::new();
    let mut header = String::new();
    let mut sequence = String::new();
    for line in reader.lines() {
        let text = line?;
        if text.is_empty() {continue;}
        if let Some(stripped) = text.strip_prefix('>') {
            if !name.is_empty() {
                sequence.make_ascii_uppercase();
                fasta_seqs.push((name, header, sequence));
                sequence = String::new();
            }
            header = stripped.to_string();
            let first_piece = header.split_whitespace().next();
            match first_piece {
                Some(_) => (),
                None    => quit_with_error(&format!("{} is not correctly formatted",
                                                    filename.display())),
            }
            name = first_piece.unwrap().to_string();
        } else {
            if name.is_empty() {
                quit_with_error(&format!("{} is not correctly formatted", filename.display()));
            }
            sequence.push_str(&text);
        }
    }
    if !name.is_empty() {
        sequence.make_ascii_uppercase();
        fasta_seqs.push((name, header, sequence));
    }
    Ok(fasta_seqs)
}


pub fn count_fasta_sequences(filename: &Path) -> usize {
    // Counts header lines in a FASTA file without holding the sequences in memory.
    if !filename.exists() { return 0; }
    if filename.metadata().map(|m| m.len()).unwrap_or(0) < 2 { return 0; }
    open_maybe_gzipped(filename).lines()
        .map_while(Result::ok)
        .filter(|line| line.starts_with('>'))
        .count()
}


pub fn format_duration(duration: std::time::Duration) -> String {
    let microseconds = duration.as_micros() % 1000000;
    let seconds =      duration.as_micros() / 1000000 % 60;
    let minutes =      duration.as_micros() / 1000000 / 60 % 60;
    let hours =        duration.as_micros() / 1000000 / 60 / 60;
    format!("{}:{:02}:{:02}.{:06}", hours, minutes, seconds, microseconds)
}


pub fn format_float(num: f64) -> String {
    // Formats a float with up to six decimal places but then drops trailing zeros.
    let mut formatted = format!("{:.6}", num);
    if !formatted.contains('.') { return formatted }
    while formatted.chars().last().unwrap() == '0' { formatted.pop(); }
    if formatted.chars().last().unwrap() == '.' { formatted.pop(); }
    formatted
}


pub fn format_float_sigfigs(num: f64, sigfigs: usize) -> String {
    // Formats a float to the given number of significant figures, e.g. 1.2345 with three sig
    // figs gives "1.23". Digits left of the decimal point are never dropped.
    if num == 0.0 {
        return format!("{:.*}", sigfigs.saturating_sub(1), 0.0);
    }
    let magnitude = num.abs().log10().floor() as i64;
    let decimals = (sigfigs as i64 - 1 - magnitude).max(0) as usize;
    format!("{:.*}", decimals, num)
}


pub fn format_with_commas(num: u64) -> String {
    // Formats an integer with a comma every three digits, e.g. 1234567 gives "1,234,567".
    let digits = num.to_string();
    let mut formatted = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(c);
    }
    formatted
}


pub fn spinner(message: &str) -> ProgressBar {
    if cfg!(test) {
        ProgressBar::hidden() // don't show a spinner during unit tests
    } else {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&vec!["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"])  // dots3 from github.com/sindresorhus/cli-spinners
                .template("{spinner} {msg}").unwrap(),
        );
        pb.set_message(message.to_string().clone());
        pb
    }
}


pub fn progress_bar(length: u64, message: &str) -> ProgressBar {
    if cfg!(test) {
        ProgressBar::hidden() // don't show a progress bar during unit tests
    } else {
        let pb = ProgressBar::new(length);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {pos}/{len} ({percent}%)").unwrap()
                .progress_chars("=> "),
        );
        pb.set_message(message.to_string().clone());
        pb
    }
}


pub fn first_and_last_column(line: &str) -> Option<(String, String)> {
    // Splits a TSV line and returns its first and last columns (the benchmark-TSV convention:
    // sequence id first, nucleotide sequence last). Returns None for lines with fewer than two
    // columns.
    let mut parts = line.split('\t');
    let first = parts.next()?;
    let last = parts.last()?;
    Some((first.to_string(), last.to_string()))
}


pub fn file_stem_string(path: &Path) -> String {
    path.file_stem().unwrap_or_default().to_string_lossy().to_string()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_test_file;
    use std::panic;
    use tempfile::tempdir;

    #[test]
    fn test_format_duration() {
        let d1 = std::time::Duration::from_micros(123456789);
        let d2 = std::time::Duration::from_micros(3661000001);
        assert_eq!(format_duration(d1), "0:02:03.456789");
        assert_eq!(format_duration(d2), "1:01:01.000001");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(0.111111), "0.111111");
        assert_eq!(format_float(0.1111111), "0.111111");
        assert_eq!(format_float(10.0), "10");
    }

    #[test]
    fn test_format_float_sigfigs() {
        assert_eq!(format_float_sigfigs(1.2345, 3), "1.23");
        assert_eq!(format_float_sigfigs(1.2, 1), "1");
        assert_eq!(format_float_sigfigs(1.2, 4), "1.200");
        assert_eq!(format_float_sigfigs(123.456, 2), "123");
        assert_eq!(format_float_sigfigs(0.0, 3), "0.00");
        assert_eq!(format_float_sigfigs(0.0123, 2), "0.012");
    }

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(0), "0");
        assert_eq!(format_with_commas(123), "123");
        assert_eq!(format_with_commas(1234), "1,234");
        assert_eq!(format_with_commas(1234567), "1,234,567");
        assert_eq!(format_with_commas(87717687), "87,717,687");
    }

    #[test]
    fn test_first_and_last_column() {
        assert_eq!(first_and_last_column("seq1\tx\ty\tACGT"),
                   Some(("seq1".to_string(), "ACGT".to_string())));
        assert_eq!(first_and_last_column("seq1\tACGT"),
                   Some(("seq1".to_string(), "ACGT".to_string())));
        assert_eq!(first_and_last_column("seq1"), None);
    }

    #[test]
    fn test_load_fasta() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("seqs.fasta");
        make_test_file(&fasta, ">a extra info\nacgt\nACGT\n>b\nGGGG\n");
        let seqs = load_fasta(&fasta);
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].0, "a");
        assert_eq!(seqs[0].1, "a extra info");
        assert_eq!(seqs[0].2, "ACGTACGT");
        assert_eq!(seqs[1].0, "b");
        assert_eq!(seqs[1].2, "GGGG");
    }

    #[test]
    fn test_load_fasta_gzipped() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("seqs.fasta.gz");
        crate::tests::make_gzipped_test_file(&fasta, ">a\nACGT\n>b\nGGGG\n");
        let seqs = load_fasta(&fasta);
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[1].2, "GGGG");
    }

    #[test]
    fn test_load_fasta_duplicate_name() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("seqs.fasta");
        make_test_file(&fasta, ">a\nACGT\n>a\nGGGG\n");
        assert!(panic::catch_unwind(|| { load_fasta(&fasta); }).is_err());
    }

    #[test]
    fn test_load_fasta_empty_sequence() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("seqs.fasta");
        make_test_file(&fasta, ">a\nACGT\n>b\n");
        assert!(panic::catch_unwind(|| { load_fasta(&fasta); }).is_err());
    }

    #[test]
    fn test_count_fasta_sequences() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("seqs.fasta");
        make_test_file(&fasta, ">a\nACGT\n>b\nGG\nGG\n>c\nTTTT\n");
        assert_eq!(count_fasta_sequences(&fasta), 3);
        assert_eq!(count_fasta_sequences(&dir.path().join("missing.fasta")), 0);
    }
}
