// This file contains the wrappers around the external bioinformatics tools Votukit drives as
// subprocesses: Prodigal, MMseqs2, geNomad and CheckV. The tools themselves are opaque here,
// nothing of theirs is re-implemented.

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
use std::path::Path;
use std::process::{Command, Output};
use which::which;

use crate::misc::quit_with_error;


// The 12-column format shared by all the aligners Votukit compares.
pub const ALIGNMENT_FORMAT: &str =
    "query,target,pident,alnlen,mismatch,gapopen,qstart,qend,tstart,tend,evalue,bits";


pub fn check_requirements(reqs: &[&str]) {
    for cmd in reqs {
        if which(cmd).is_err() {
            quit_with_error(&format!("required program '{cmd}' not found in $PATH"));
        }
    }
}


pub fn command_line(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().to_string();
    for arg in command.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}


pub fn run_command(command: &mut Command) -> Result<Output, String> {
    // Runs the command to completion with captured output. A non-zero exit becomes an error
    // carrying the exit code and stderr, so callers can decide whether it is fatal.
    let output = command.output()
        .map_err(|e| format!("failed to launch {}\n{}", command_line(command), e))?;
    if !output.status.success() {
        let code = match output.status.code() {
            Some(code) => code.to_string(),
            None => "unknown".to_string(),
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed (exit code {})\n{}",
                           command_line(command), code, stderr.trim()));
    }
    Ok(output)
}


pub fn run_step(description: &str, command: &mut Command) -> Output {
    // Runs one pipeline step, echoing the command line first. Failure is fatal, which is the
    // right behaviour for the linear pipeline (each step feeds the next).
    eprintln!("{}", description);
    eprintln!("{}", command_line(command).dimmed());
    match run_command(command) {
        Ok(output) => output,
        Err(e) => quit_with_error(&e),
    }
}


pub fn prodigal(input_fasta: &Path, gff: &Path, faa: &Path, fna: &Path) -> Command {
    let mut command = Command::new("prodigal");
    command.arg("-i").arg(input_fasta)
           .arg("-o").arg(gff)
           .arg("-a").arg(faa)
           .arg("-d").arg(fna)
           .arg("-p").arg("meta")
           .arg("-f").arg("gff");
    command
}


pub fn mmseqs_createdb(input_faa: &Path, db: &Path) -> Command {
    let mut command = Command::new("mmseqs");
    command.arg("createdb").arg(input_faa).arg(db);
    command
}


pub fn mmseqs_search(db: &Path, result: &Path, tmp_dir: &Path, threads: usize, evalue: f64,
                     max_seqs: u32) -> Command {
    let mut command = Command::new("mmseqs");
    command.arg("search").arg(db).arg(db).arg(result).arg(tmp_dir)
           .arg("--threads").arg(threads.to_string())
           .arg("-e").arg(format!("{:e}", evalue))
           .arg("--max-seqs").arg(max_seqs.to_string());
    command
}


pub fn mmseqs_convertalis(db: &Path, result: &Path, out_tsv: &Path) -> Command {
    let mut command = Command::new("mmseqs");
    command.arg("convertalis").arg(db).arg(db).arg(result).arg(out_tsv)
           .arg("--format-output").arg(ALIGNMENT_FORMAT);
    command
}


pub fn genomad_end_to_end(fasta: &Path, out_dir: &Path, db: &Path) -> Command {
    let mut command = Command::new("genomad");
    command.arg("end-to-end").arg(fasta).arg(out_dir).arg(db);
    command
}


pub fn checkv_end_to_end(fasta: &Path, out_dir: &Path, db: &Path) -> Command {
    let mut command = Command::new("checkv");
    command.arg("end_to_end").arg(fasta).arg(out_dir)
           .arg("-d").arg(db);
    command
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_command_line() {
        let command = genomad_end_to_end(&PathBuf::from("in.fasta"), &PathBuf::from("out"),
                                         &PathBuf::from("db"));
        assert_eq!(command_line(&command), "genomad end-to-end in.fasta out db");

        let command = checkv_end_to_end(&PathBuf::from("in.fasta"), &PathBuf::from("out"),
                                        &PathBuf::from("db"));
        assert_eq!(command_line(&command), "checkv end_to_end in.fasta out -d db");

        let command = mmseqs_convertalis(&PathBuf::from("db"), &PathBuf::from("res"),
                                         &PathBuf::from("out.tsv"));
        assert!(command_line(&command).starts_with("mmseqs convertalis db db res out.tsv"));
        assert!(command_line(&command).contains(ALIGNMENT_FORMAT));
    }

    #[test]
    fn test_mmseqs_search_args() {
        let command = mmseqs_search(&PathBuf::from("db"), &PathBuf::from("res"),
                                    &PathBuf::from("tmp"), 8, 1e-5, 10000);
        let line = command_line(&command);
        assert!(line.contains("--threads 8"));
        assert!(line.contains("-e 1e-5"));
        assert!(line.contains("--max-seqs 10000"));
    }

    #[test]
    fn test_run_command_success() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo hello");
        let output = run_command(&mut command).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn test_run_command_failure() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo bad >&2; exit 3");
        let error = run_command(&mut command).unwrap_err();
        assert!(error.contains("exit code 3"));
        assert!(error.contains("bad"));
    }
}
