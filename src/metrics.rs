// This file contains the code for reading and writing Votukit's YAML files of metrics.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::io::Write;
use std::path::Path;


#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PipelineMetrics {
    pub input_sequence_count: u32,
    pub viral_sequence_count: u32,
    pub viral_sequence_fraction: f64,
    pub reference_sequence_count: u32,
    pub combined_sequence_count: u32,
    pub predicted_gene_count: u32,
    pub alignment_count: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self { Self::default() }

    pub fn calculate_fraction(&mut self) {
        if self.input_sequence_count > 0 {
            self.viral_sequence_fraction =
                self.viral_sequence_count as f64 / self.input_sequence_count as f64;
        }
    }

    pub fn save_to_yaml(&self, filename: &Path) { save_yaml(filename, self).unwrap(); }
}


#[derive(Serialize, Deserialize, Debug, Default)]
pub struct BatchMetrics {
    pub batch_sequence_count: u32,
    pub batch_skipped_genomad: u32,
    pub batch_skipped_checkv: u32,
    pub genomad_completed: u32,
    pub genomad_completed_no_hits: u32,
    pub genomad_incomplete: u32,
    pub genomad_failed: u32,
    pub genomad_error: u32,
    pub checkv_completed: u32,
    pub checkv_incomplete: u32,
    pub checkv_failed: u32,
    pub checkv_error: u32,
}

impl BatchMetrics {
    pub fn new() -> Self { Self::default() }

    pub fn save_to_yaml(&self, filename: &Path) { save_yaml(filename, self).unwrap(); }
}


#[derive(Serialize, Deserialize, Debug, Default)]
pub struct AuditMetrics {
    pub audit_total_sequences: u32,
    pub audit_expected_sequences: u32,
    pub audit_unexpected_sequences: u32,
    pub audit_fully_completed: u32,
    pub audit_not_started: u32,
    pub audit_in_progress: u32,
}

impl AuditMetrics {
    pub fn new() -> Self { Self::default() }

    pub fn save_to_yaml(&self, filename: &Path) { save_yaml(filename, self).unwrap(); }
}


fn save_yaml<T: Serialize>(yaml_filename: &Path, data: T) -> io::Result<()> {
    let yaml_string = serde_yaml::to_string(&data).unwrap();
    let mut file = File::create(yaml_filename)?;
    file.write_all(yaml_string.as_bytes())?;
    Ok(())
}


// This macro adds get_val_by_name and get_field_names methods to the metric structs.
macro_rules! impl_metrics_helpers {
    ($struct_name:ty) => {
        impl $struct_name {
            pub fn get_val_by_name(&self, name: &str) -> Option<String> {
                serde_json::to_value(self).ok()?.get(name).map(|v| v.to_string())
            }
            pub fn get_field_names() -> Vec<String> {
                let mut field_names: Vec<String> = match serde_json::to_value(Self::default())
                    .expect("serialisation failed").as_object()
                {
                    Some(map) => map.keys().cloned().collect(),
                    None => Vec::new(),
                };
                field_names.sort();
                field_names
            }
        }
    };
}
impl_metrics_helpers!(PipelineMetrics);
impl_metrics_helpers!(BatchMetrics);
impl_metrics_helpers!(AuditMetrics);


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_almost_eq;
    use tempfile::tempdir;

    #[test]
    fn test_calculate_fraction() {
        let mut metrics = PipelineMetrics::new();
        metrics.input_sequence_count = 200;
        metrics.viral_sequence_count = 50;
        metrics.calculate_fraction();
        assert_almost_eq(metrics.viral_sequence_fraction, 0.25, 1e-8);

        let mut metrics = PipelineMetrics::new();
        metrics.calculate_fraction();
        assert_almost_eq(metrics.viral_sequence_fraction, 0.0, 1e-8);
    }

    #[test]
    fn test_get_val_by_name() {
        let mut metrics = BatchMetrics::new();
        metrics.genomad_completed = 12;
        assert_eq!(metrics.get_val_by_name("genomad_completed"), Some("12".to_string()));
        assert_eq!(metrics.get_val_by_name("abc"), None);
    }

    #[test]
    fn test_get_field_names() {
        let names = AuditMetrics::get_field_names();
        assert!(names.contains(&"audit_total_sequences".to_string()));
        assert!(names.contains(&"audit_fully_completed".to_string()));
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_save_to_yaml() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("audit.yaml");
        let mut metrics = AuditMetrics::new();
        metrics.audit_total_sequences = 3;
        metrics.save_to_yaml(&yaml);
        let content = std::fs::read_to_string(&yaml).unwrap();
        assert!(content.contains("audit_total_sequences: 3"));
    }
}
