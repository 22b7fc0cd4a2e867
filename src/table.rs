// This file contains the code for the votukit table subcommand.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::metrics::{AuditMetrics, BatchMetrics, PipelineMetrics};
use crate::misc::{check_if_dir_exists, format_float_sigfigs, quit_with_error};


pub fn table(run_dir: Option<PathBuf>, name: String, fields: String, sigfigs: usize) {
    check_settings(&run_dir, sigfigs);
    let fields = parse_fields(fields);
    if let Some(run_dir) = run_dir {
        print_values(&run_dir, name, fields, sigfigs);
    } else {
        print_header(fields);
    }
}


fn check_settings(run_dir: &Option<PathBuf>, sigfigs: usize) {
    if let Some(dir) = run_dir.as_ref() {
        check_if_dir_exists(dir);
    }
    if sigfigs == 0 {
        quit_with_error("--sigfigs must be 1 or greater");
    }
}


fn parse_fields(comma_delimited_fields: String) -> Vec<String> {
    let fields = comma_delimited_fields.replace(" ", "").split(',')
                                       .map(|s| s.to_string()).collect();
    let mut valid_fields = HashSet::new();
    valid_fields.extend(PipelineMetrics::get_field_names());
    valid_fields.extend(BatchMetrics::get_field_names());
    valid_fields.extend(AuditMetrics::get_field_names());
    for field in &fields {
        if !valid_fields.contains(field) {
            quit_with_error(&format!("{} is not a valid field name", field));
        }
    }
    fields
}


fn print_header(fields: Vec<String>) {
    println!("name\t{}", fields.join("\t"));
}


fn print_values(run_dir: &Path, name: String, fields: Vec<String>, sigfigs: usize) {
    if name.contains('\t') {
        quit_with_error("--name cannot contain tab characters")
    }
    print!("{}", name);

    let yaml_files = find_all_yaml_files(run_dir);
    let pipeline_yaml = get_one_copy_yaml(&yaml_files, "pipeline.yaml");
    let batch_yaml = get_one_copy_yaml(&yaml_files, "batch.yaml");
    let audit_yaml = get_one_copy_yaml(&yaml_files, "audit.yaml");

    let mut map: HashMap<String, Value> = HashMap::new();
    if let Some(path) = pipeline_yaml { map.extend(load_yaml_to_map(&path)); }
    if let Some(path) = batch_yaml    { map.extend(load_yaml_to_map(&path)); }
    if let Some(path) = audit_yaml    { map.extend(load_yaml_to_map(&path)); }

    for field in fields {
        print!("\t");
        if let Some(value) = map.get(&field) {
            print!("{}", format_value(value, sigfigs));
        }
    }
    println!();
}


fn load_yaml_to_map(yaml_path: &Path) -> HashMap<String, Value> {
    let content = fs::read_to_string(yaml_path)
        .unwrap_or_else(|_| quit_with_error("Could not read YAML file"));
    serde_yaml::from_str(&content)
        .unwrap_or_else(|_| quit_with_error("Failed to parse YAML file"))
}


fn find_all_yaml_files(run_dir: &Path) -> Vec<PathBuf> {
    let mut yaml_files = Vec::new();
    visit_dirs_for_yaml_files(run_dir, &mut yaml_files);
    yaml_files.sort();
    yaml_files
}


fn visit_dirs_for_yaml_files(dir: &Path, yaml_files: &mut Vec<PathBuf>) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                visit_dirs_for_yaml_files(&path, yaml_files);
            } else if path.extension().is_some_and(|ext| ext == "yaml") {
                yaml_files.push(path);
            }
        }
    }
}


fn get_one_copy_yaml(yaml_files: &[PathBuf], filename: &str) -> Option<PathBuf> {
    // Returns the YAML file in the given path with a matching filename. No match is okay and one
    // match is okay, but multiple matches will result in an error.
    let found_files = yaml_files.iter()
        .filter(|path| path.file_name().is_some_and(|name| name == filename)).collect::<Vec<_>>();
    match found_files.len() {
        0 => None,
        1 => Some(found_files[0].clone()),
        _ => quit_with_error(&format!("Multiple {} files found", filename)),
    }
}


fn format_value(value: &Value, sigfigs: usize) -> String {
    // This function formats serde_yaml::Value types. Sequences are formatted with square brackets
    // and commas (no spaces). Mappings are formatted with curly brackets, colons and commas (no
    // spaces).
    match value {
        Value::Number(n) => format_number(n, sigfigs),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Sequence(s) => format_sequence(s, sigfigs),
        Value::Mapping(m) => format_mapping(m, sigfigs),
        _ => String::new(),
    }
}


fn format_number(n: &serde_yaml::Number, sigfigs: usize) -> String {
    if n.is_i64() || n.is_u64()      { n.to_string() }
    else if let Some(f) = n.as_f64() { format_float_sigfigs(f, sigfigs) }
    else                             { n.to_string() }
}


fn format_sequence(s: &[Value], sigfigs: usize) -> String {
    format!("[{}]", s.iter().map(|v| format_value(v, sigfigs)).collect::<Vec<_>>().join(","))
}


fn format_mapping(m: &serde_yaml::Mapping, sigfigs: usize) -> String {
    format!("{{{}}}",
            m.iter().map(|(k, v)| format!("{}:{}",
                                          format_value(k, sigfigs),
                                          format_value(v, sigfigs))).collect::<Vec<_>>().join(","))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_get_one_copy_yaml() {
        let yaml_files = vec![PathBuf::from("dir/pipeline.yaml"),
                              PathBuf::from("dir/batch.yaml"),
                              PathBuf::from("dir/audit.yaml"),
                              PathBuf::from("dir2/batch.yaml")];
        assert_eq!(get_one_copy_yaml(&yaml_files, "pipeline.yaml"),
                   Some(PathBuf::from("dir/pipeline.yaml")));
        assert_eq!(get_one_copy_yaml(&yaml_files, "missing.yaml"), None);
        assert!(panic::catch_unwind(|| {
            get_one_copy_yaml(&yaml_files, "batch.yaml");
        }).is_err());
    }

    #[test]
    fn test_parse_fields() {
        assert_eq!(parse_fields("viral_sequence_count,genomad_completed".to_string()),
                   vec!["viral_sequence_count", "genomad_completed"]);
        assert_eq!(parse_fields("audit_fully_completed, audit_not_started".to_string()),
                   vec!["audit_fully_completed", "audit_not_started"]);
        assert!(panic::catch_unwind(|| {
            parse_fields("viral_sequence_count,abc".to_string());
        }).is_err());
    }

    #[test]
    fn test_format_value_simple() {
        assert_eq!(format_value(&Value::Number(serde_yaml::Number::from(12)), 2), "12");
        assert_eq!(format_value(&Value::Number(serde_yaml::Number::from(1.2)), 1), "1");
        assert_eq!(format_value(&Value::Number(serde_yaml::Number::from(1.2)), 2), "1.2");
        assert_eq!(format_value(&Value::Number(serde_yaml::Number::from(1.2)), 4), "1.200");
        assert_eq!(format_value(&Value::String("abc".to_string()), 2), "abc");
        assert_eq!(format_value(&Value::Bool(true), 2), "true");
    }

    #[test]
    fn test_format_value_sequence() {
        let v1 = Value::Number(serde_yaml::Number::from(12));
        let v2 = Value::Number(serde_yaml::Number::from(1.2));
        let v3 = Value::String("abc".to_string());
        let seq = Value::Sequence(vec![v1, v2, v3]);
        assert_eq!(format_value(&seq, 2), "[12,1.2,abc]");
    }

    #[test]
    fn test_format_value_mapping() {
        let v1 = Value::Number(serde_yaml::Number::from(12));
        let v2 = Value::Number(serde_yaml::Number::from(1.2));
        let mut map = serde_yaml::Mapping::new();
        map.insert(v1, v2);
        assert_eq!(format_value(&Value::Mapping(map), 2), "{12:1.2}");
    }
}
