// This file contains the status vocabularies for the geNomad/CheckV pipeline, the mapping from
// on-disk evidence to standard statuses, and the status-file TSV that records them. The probing
// functions here are used both by batch (to decide whether a sequence still needs a run) and by
// audit (to rebuild the status file from disk).

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::misc::quit_with_error;


pub const STATUS_FILE_NAME: &str = "processing_status.tsv";
pub const STATUS_HEADER: &str = "sequence_id\tgeNomad_status\tcheckV_status";


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    CompletedNoHits,
    Incomplete,
    Failed,
    Error,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Pending         => "pending",
            ToolStatus::Running         => "running",
            ToolStatus::Completed       => "completed",
            ToolStatus::CompletedNoHits => "completed_no_hits",
            ToolStatus::Incomplete      => "incomplete",
            ToolStatus::Failed          => "failed",
            ToolStatus::Error           => "error",
        }
    }

    pub fn from_str(text: &str) -> ToolStatus {
        // Anything outside the standard vocabulary maps to error, so a hand-edited or corrupted
        // status file can never produce a status the rest of the code doesn't know about.
        match text {
            "pending"           => ToolStatus::Pending,
            "running"           => ToolStatus::Running,
            "completed"         => ToolStatus::Completed,
            "completed_no_hits" => ToolStatus::CompletedNoHits,
            "incomplete"        => ToolStatus::Incomplete,
            "failed"            => ToolStatus::Failed,
            _                   => ToolStatus::Error,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::CompletedNoHits)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenomadDiskStatus {
    NotStarted,
    DirectoryEmpty,
    InProgressMaybe,
    IncompleteNoSummary,
    CompletedWithHits,
    CompletedNoHits,
    ErrorReading,
}

impl GenomadDiskStatus {
    pub const ALL: [GenomadDiskStatus; 7] = [
        GenomadDiskStatus::NotStarted, GenomadDiskStatus::DirectoryEmpty,
        GenomadDiskStatus::InProgressMaybe, GenomadDiskStatus::IncompleteNoSummary,
        GenomadDiskStatus::CompletedWithHits, GenomadDiskStatus::CompletedNoHits,
        GenomadDiskStatus::ErrorReading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenomadDiskStatus::NotStarted          => "not_started",
            GenomadDiskStatus::DirectoryEmpty      => "directory_empty",
            GenomadDiskStatus::InProgressMaybe     => "in_progress_maybe",
            GenomadDiskStatus::IncompleteNoSummary => "incomplete_no_summary",
            GenomadDiskStatus::CompletedWithHits   => "completed_with_hits",
            GenomadDiskStatus::CompletedNoHits     => "completed_no_hits",
            GenomadDiskStatus::ErrorReading        => "error_reading",
        }
    }

    pub fn to_standard(&self) -> ToolStatus {
        match self {
            GenomadDiskStatus::NotStarted          => ToolStatus::Pending,
            GenomadDiskStatus::DirectoryEmpty      => ToolStatus::Pending,
            GenomadDiskStatus::InProgressMaybe     => ToolStatus::Running,
            GenomadDiskStatus::IncompleteNoSummary => ToolStatus::Incomplete,
            GenomadDiskStatus::CompletedWithHits   => ToolStatus::Completed,
            GenomadDiskStatus::CompletedNoHits     => ToolStatus::CompletedNoHits,
            GenomadDiskStatus::ErrorReading        => ToolStatus::Error,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, GenomadDiskStatus::CompletedWithHits | GenomadDiskStatus::CompletedNoHits)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckvDiskStatus {
    NotStarted,
    DirectoryEmpty,
    InProgressMaybe,
    IncompleteNoQuality,
    QualityFileEmpty,
    CompletedNoResults,
    CompletedWithResults,
    ErrorReading,
}

impl CheckvDiskStatus {
    pub const ALL: [CheckvDiskStatus; 8] = [
        CheckvDiskStatus::NotStarted, CheckvDiskStatus::DirectoryEmpty,
        CheckvDiskStatus::InProgressMaybe, CheckvDiskStatus::IncompleteNoQuality,
        CheckvDiskStatus::QualityFileEmpty, CheckvDiskStatus::CompletedNoResults,
        CheckvDiskStatus::CompletedWithResults, CheckvDiskStatus::ErrorReading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckvDiskStatus::NotStarted           => "not_started",
            CheckvDiskStatus::DirectoryEmpty       => "directory_empty",
            CheckvDiskStatus::InProgressMaybe      => "in_progress_maybe",
            CheckvDiskStatus::IncompleteNoQuality  => "incomplete_no_quality",
            CheckvDiskStatus::QualityFileEmpty     => "quality_file_empty",
            CheckvDiskStatus::CompletedNoResults   => "completed_no_results",
            CheckvDiskStatus::CompletedWithResults => "completed_with_results",
            CheckvDiskStatus::ErrorReading         => "error_reading",
        }
    }

    pub fn to_standard(&self) -> ToolStatus {
        // CheckV finishing with an empty result table still counts as completed: the tool ran to
        // the end, it just had nothing to report for this sequence.
        match self {
            CheckvDiskStatus::NotStarted           => ToolStatus::Pending,
            CheckvDiskStatus::DirectoryEmpty       => ToolStatus::Pending,
            CheckvDiskStatus::InProgressMaybe      => ToolStatus::Running,
            CheckvDiskStatus::IncompleteNoQuality  => ToolStatus::Incomplete,
            CheckvDiskStatus::QualityFileEmpty     => ToolStatus::Incomplete,
            CheckvDiskStatus::CompletedNoResults   => ToolStatus::Completed,
            CheckvDiskStatus::CompletedWithResults => ToolStatus::Completed,
            CheckvDiskStatus::ErrorReading         => ToolStatus::Error,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CheckvDiskStatus::CompletedNoResults | CheckvDiskStatus::CompletedWithResults)
    }
}


pub fn genomad_dir(out_dir: &Path, seq_id: &str) -> PathBuf {
    out_dir.join(format!("{}_genomad", seq_id))
}


pub fn checkv_dir(out_dir: &Path, seq_id: &str) -> PathBuf {
    out_dir.join(format!("{}_checkv", seq_id))
}


pub fn probe_genomad(out_dir: &Path, seq_id: &str) -> GenomadDiskStatus {
    // Classifies a sequence's geNomad output directory from on-disk evidence alone. geNomad can
    // place its summary files in a few different spots, so the whole directory is walked and any
    // file whose name contains plasmid_summary or virus_summary counts.
    let tool_dir = genomad_dir(out_dir, seq_id);
    if !tool_dir.exists() {
        return GenomadDiskStatus::NotStarted;
    }
    let top_level = list_dir(&tool_dir);
    if top_level.is_empty() {
        return GenomadDiskStatus::DirectoryEmpty;
    }
    let summaries: Vec<PathBuf> = walk_files(&tool_dir).into_iter()
        .filter(|path| file_name_contains(path, "plasmid_summary") ||
                       file_name_contains(path, "virus_summary"))
        .collect();
    if summaries.is_empty() {
        if has_progress_evidence(&top_level) {
            return GenomadDiskStatus::InProgressMaybe;
        }
        return GenomadDiskStatus::IncompleteNoSummary;
    }
    let mut hits_found = false;
    for summary in &summaries {
        match data_line_count(summary) {
            Ok(count) => { if count > 0 { hits_found = true; break; } },
            Err(_) => return GenomadDiskStatus::ErrorReading,
        }
    }
    if hits_found { GenomadDiskStatus::CompletedWithHits }
             else { GenomadDiskStatus::CompletedNoHits }
}


pub fn probe_checkv(out_dir: &Path, seq_id: &str) -> CheckvDiskStatus {
    // Classifies a sequence's CheckV output directory from on-disk evidence alone. The file that
    // matters is quality_summary.tsv, wherever CheckV put it.
    let tool_dir = checkv_dir(out_dir, seq_id);
    if !tool_dir.exists() {
        return CheckvDiskStatus::NotStarted;
    }
    let top_level = list_dir(&tool_dir);
    if top_level.is_empty() {
        return CheckvDiskStatus::DirectoryEmpty;
    }
    let quality_file = walk_files(&tool_dir).into_iter()
        .find(|path| file_name_contains(path, "quality_summary"));
    let quality_file = match quality_file {
        Some(path) => path,
        None => {
            if has_progress_evidence(&top_level) {
                return CheckvDiskStatus::InProgressMaybe;
            }
            return CheckvDiskStatus::IncompleteNoQuality;
        },
    };
    match fs::metadata(&quality_file) {
        Ok(metadata) => { if metadata.len() == 0 { return CheckvDiskStatus::QualityFileEmpty; } },
        Err(_) => return CheckvDiskStatus::ErrorReading,
    }
    match data_line_count(&quality_file) {
        Ok(0) => CheckvDiskStatus::CompletedNoResults,
        Ok(_) => CheckvDiskStatus::CompletedWithResults,
        Err(_) => CheckvDiskStatus::ErrorReading,
    }
}


fn list_dir(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
        Err(_) => Vec::new(),
    }
}


fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    visit_dirs_for_files(dir, &mut files);
    files.sort();
    files
}


fn visit_dirs_for_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                visit_dirs_for_files(&path, files);
            } else {
                files.push(path);
            }
        }
    }
}


fn file_name_contains(path: &Path, pattern: &str) -> bool {
    path.file_name().is_some_and(|name| name.to_string_lossy().contains(pattern))
}


fn has_progress_evidence(files: &[PathBuf]) -> bool {
    // Log files and temporary files suggest a run that is (or was) underway.
    files.iter().any(|path| {
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_lowercase();
        name.ends_with(".log") || name.ends_with(".tmp") || name.contains("tmp")
    })
}


fn data_line_count(filename: &Path) -> std::io::Result<usize> {
    // Counts the lines of a TSV file beyond its header.
    let content = fs::read_to_string(filename)?;
    Ok(content.lines().count().saturating_sub(1))
}


pub struct StatusTable {
    rows: BTreeMap<String, (ToolStatus, ToolStatus)>,  // seq id -> (geNomad, CheckV)
}

impl StatusTable {
    pub fn new() -> Self {
        StatusTable { rows: BTreeMap::new() }
    }

    pub fn load(filename: &Path) -> Self {
        // Loads an existing status file, or returns an empty table if there isn't one yet.
        if !filename.exists() {
            return StatusTable::new();
        }
        let mut table = StatusTable::new();
        let content = match fs::read_to_string(filename) {
            Ok(content) => content,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}", filename.display(), e)),
        };
        for line in content.lines().skip(1) {
            if line.is_empty() { continue; }
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 3 {
                quit_with_error(&format!("{} has a malformed line: {}",
                                         filename.display(), line));
            }
            table.rows.insert(parts[0].to_string(),
                              (ToolStatus::from_str(parts[1]), ToolStatus::from_str(parts[2])));
        }
        table
    }

    pub fn save(&self, filename: &Path) {
        let mut content = String::new();
        content.push_str(STATUS_HEADER);
        content.push('\n');
        for (seq_id, (genomad, checkv)) in &self.rows {
            content.push_str(&format!("{}\t{}\t{}\n",
                                      seq_id, genomad.as_str(), checkv.as_str()));
        }
        let mut file = match File::create(filename) {
            Ok(file) => file,
            Err(e) => quit_with_error(&format!("failed to create {}\n{}",
                                               filename.display(), e)),
        };
        if let Err(e) = file.write_all(content.as_bytes()) {
            quit_with_error(&format!("failed to write {}\n{}", filename.display(), e));
        }
    }

    pub fn set(&mut self, seq_id: &str, genomad: ToolStatus, checkv: ToolStatus) {
        self.rows.insert(seq_id.to_string(), (genomad, checkv));
    }

    pub fn get(&self, seq_id: &str) -> Option<(ToolStatus, ToolStatus)> {
        self.rows.get(seq_id).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &(ToolStatus, ToolStatus))> {
        self.rows.iter()
    }
}

impl Default for StatusTable {
    fn default() -> Self { Self::new() }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::make_test_file;
    use crate::misc::create_dir;
    use tempfile::tempdir;

    #[test]
    fn test_mapping_tables_are_total() {
        // Every disk status must map onto the standard vocabulary, with the reading-error states
        // landing on error.
        for disk in GenomadDiskStatus::ALL {
            let standard = disk.to_standard();
            assert!(!standard.as_str().is_empty());
        }
        for disk in CheckvDiskStatus::ALL {
            let standard = disk.to_standard();
            assert!(!standard.as_str().is_empty());
        }
        assert_eq!(GenomadDiskStatus::ErrorReading.to_standard(), ToolStatus::Error);
        assert_eq!(CheckvDiskStatus::ErrorReading.to_standard(), ToolStatus::Error);
    }

    #[test]
    fn test_genomad_mapping_values() {
        assert_eq!(GenomadDiskStatus::NotStarted.to_standard(), ToolStatus::Pending);
        assert_eq!(GenomadDiskStatus::DirectoryEmpty.to_standard(), ToolStatus::Pending);
        assert_eq!(GenomadDiskStatus::InProgressMaybe.to_standard(), ToolStatus::Running);
        assert_eq!(GenomadDiskStatus::IncompleteNoSummary.to_standard(), ToolStatus::Incomplete);
        assert_eq!(GenomadDiskStatus::CompletedWithHits.to_standard(), ToolStatus::Completed);
        assert_eq!(GenomadDiskStatus::CompletedNoHits.to_standard(), ToolStatus::CompletedNoHits);
    }

    #[test]
    fn test_checkv_mapping_values() {
        assert_eq!(CheckvDiskStatus::NotStarted.to_standard(), ToolStatus::Pending);
        assert_eq!(CheckvDiskStatus::DirectoryEmpty.to_standard(), ToolStatus::Pending);
        assert_eq!(CheckvDiskStatus::InProgressMaybe.to_standard(), ToolStatus::Running);
        assert_eq!(CheckvDiskStatus::IncompleteNoQuality.to_standard(), ToolStatus::Incomplete);
        assert_eq!(CheckvDiskStatus::QualityFileEmpty.to_standard(), ToolStatus::Incomplete);
        assert_eq!(CheckvDiskStatus::CompletedNoResults.to_standard(), ToolStatus::Completed);
        assert_eq!(CheckvDiskStatus::CompletedWithResults.to_standard(), ToolStatus::Completed);
    }

    #[test]
    fn test_tool_status_from_str_defaults_to_error() {
        assert_eq!(ToolStatus::from_str("completed"), ToolStatus::Completed);
        assert_eq!(ToolStatus::from_str("completed_no_hits"), ToolStatus::CompletedNoHits);
        assert_eq!(ToolStatus::from_str("nonsense"), ToolStatus::Error);
        assert_eq!(ToolStatus::from_str(""), ToolStatus::Error);
    }

    #[test]
    fn test_probe_genomad() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path();

        assert_eq!(probe_genomad(out_dir, "s1"), GenomadDiskStatus::NotStarted);

        create_dir(&genomad_dir(out_dir, "s1"));
        assert_eq!(probe_genomad(out_dir, "s1"), GenomadDiskStatus::DirectoryEmpty);

        make_test_file(&genomad_dir(out_dir, "s1").join("genomad.log"), "running\n");
        assert_eq!(probe_genomad(out_dir, "s1"), GenomadDiskStatus::InProgressMaybe);

        create_dir(&genomad_dir(out_dir, "s2"));
        make_test_file(&genomad_dir(out_dir, "s2").join("other_output.txt"), "x\n");
        assert_eq!(probe_genomad(out_dir, "s2"), GenomadDiskStatus::IncompleteNoSummary);

        // A summary with only a header line means the run finished without hits.
        create_dir(&genomad_dir(out_dir, "s3").join("s3_summary"));
        make_test_file(&genomad_dir(out_dir, "s3").join("s3_summary")
                           .join("s3_virus_summary.tsv"),
                       "seq_name\tlength\ttopology\n");
        assert_eq!(probe_genomad(out_dir, "s3"), GenomadDiskStatus::CompletedNoHits);

        make_test_file(&genomad_dir(out_dir, "s3").join("s3_summary")
                           .join("s3_plasmid_summary.tsv"),
                       "seq_name\tlength\ttopology\ns3\t1000\tlinear\n");
        assert_eq!(probe_genomad(out_dir, "s3"), GenomadDiskStatus::CompletedWithHits);
    }

    #[test]
    fn test_probe_checkv() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path();

        assert_eq!(probe_checkv(out_dir, "s1"), CheckvDiskStatus::NotStarted);

        create_dir(&checkv_dir(out_dir, "s1"));
        assert_eq!(probe_checkv(out_dir, "s1"), CheckvDiskStatus::DirectoryEmpty);

        make_test_file(&checkv_dir(out_dir, "s1").join("tmp_working"), "x\n");
        assert_eq!(probe_checkv(out_dir, "s1"), CheckvDiskStatus::InProgressMaybe);

        create_dir(&checkv_dir(out_dir, "s2"));
        make_test_file(&checkv_dir(out_dir, "s2").join("completeness.tsv"), "x\n");
        assert_eq!(probe_checkv(out_dir, "s2"), CheckvDiskStatus::IncompleteNoQuality);

        make_test_file(&checkv_dir(out_dir, "s2").join("quality_summary.tsv"), "");
        assert_eq!(probe_checkv(out_dir, "s2"), CheckvDiskStatus::QualityFileEmpty);

        make_test_file(&checkv_dir(out_dir, "s2").join("quality_summary.tsv"),
                       "contig_id\tcheckv_quality\n");
        assert_eq!(probe_checkv(out_dir, "s2"), CheckvDiskStatus::CompletedNoResults);

        make_test_file(&checkv_dir(out_dir, "s2").join("quality_summary.tsv"),
                       "contig_id\tcheckv_quality\ns2\tHigh-quality\n");
        assert_eq!(probe_checkv(out_dir, "s2"), CheckvDiskStatus::CompletedWithResults);
    }

    #[test]
    fn test_status_table_round_trip() {
        let dir = tempdir().unwrap();
        let status_file = dir.path().join(STATUS_FILE_NAME);
        let mut table = StatusTable::new();
        table.set("s2", ToolStatus::Completed, ToolStatus::Completed);
        table.set("s1", ToolStatus::CompletedNoHits, ToolStatus::Failed);
        table.save(&status_file);

        let loaded = StatusTable::load(&status_file);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("s1"), Some((ToolStatus::CompletedNoHits, ToolStatus::Failed)));
        assert_eq!(loaded.get("s2"), Some((ToolStatus::Completed, ToolStatus::Completed)));

        // Rows come back sorted by sequence id.
        let ids: Vec<&String> = loaded.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_status_table_load_missing_file() {
        let dir = tempdir().unwrap();
        let table = StatusTable::load(&dir.path().join("missing.tsv"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_status_table_unknown_status_becomes_error() {
        let dir = tempdir().unwrap();
        let status_file = dir.path().join(STATUS_FILE_NAME);
        make_test_file(&status_file,
                       "sequence_id\tgeNomad_status\tcheckV_status\ns1\tweird\tcompleted\n");
        let table = StatusTable::load(&status_file);
        assert_eq!(table.get("s1"), Some((ToolStatus::Error, ToolStatus::Completed)));
    }
}
