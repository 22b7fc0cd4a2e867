// This file contains the code for the votukit clades subcommand: split an iTOL family
// annotation file into per-family taxon lists, keeping only taxa that are present in a Newick
// tree.

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
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::log::{section_header, explanation};
use crate::misc::{check_if_dir_is_not_dir, check_if_file_exists, create_dir, open_maybe_gzipped,
                  quit_with_error};


pub fn clades(annotations: PathBuf, tree: PathBuf, out_dir: PathBuf, min_taxa: usize) {
    check_settings(&annotations, &tree, &out_dir, min_taxa);
    starting_message();
    print_settings(&annotations, &tree, &out_dir, min_taxa);
    create_dir(&out_dir);

    let tree_taxa = load_tree_taxa(&tree);
    eprintln!("Taxa in tree: {}", tree_taxa.len());
    let family_to_taxa = load_family_annotations(&annotations);
    eprintln!("Families annotated: {}", family_to_taxa.len());
    eprintln!();

    let written = write_family_files(&family_to_taxa, &tree_taxa, &out_dir, min_taxa);
    finished_message(&out_dir, written);
}


fn check_settings(annotations: &Path, tree: &Path, out_dir: &Path, min_taxa: usize) {
    check_if_file_exists(annotations);
    check_if_file_exists(tree);
    check_if_dir_is_not_dir(out_dir);
    if min_taxa < 1 { quit_with_error("--min_taxa cannot be less than 1"); }
}


fn starting_message() {
    section_header("Starting votukit clades");
    explanation("This command reads family assignments from an iTOL annotation file, keeps the \
                 taxa that actually occur in the tree and writes one taxon-list file per family \
                 that is large enough.");
}


fn print_settings(annotations: &Path, tree: &Path, out_dir: &Path, min_taxa: usize) {
    eprintln!("Settings:");
    eprintln!("  --annotations {}", annotations.display());
    eprintln!("  --tree {}", tree.display());
    eprintln!("  --out_dir {}", out_dir.display());
    eprintln!("  --min_taxa {}", min_taxa);
    eprintln!();
}


fn finished_message(out_dir: &Path, written: usize) {
    section_header("Finished!");
    eprintln!("Clade files written to {}: {}", out_dir.display(), written);
    eprintln!();
}


pub fn load_tree_taxa(tree: &Path) -> HashSet<String> {
    // Extracts the leaf labels of a Newick tree. Quotes are stripped first, then every name
    // that sits between an opening bracket or comma and its branch-length colon is a leaf.
    let content = match fs::read_to_string(tree) {
        Ok(content) => content,
        Err(e) => quit_with_error(&format!("failed to read {}\n{}", tree.display(), e)),
    };
    extract_tree_taxa(&content)
}


pub fn extract_tree_taxa(newick: &str) -> HashSet<String> {
    let cleaned = newick.replace(['"', '\''], "");
    let leaf_re = Regex::new(r"[(,]([^:(),]+):").unwrap();
    leaf_re.captures_iter(&cleaned)
        .map(|captures| captures[1].to_string())
        .collect()
}


pub fn load_family_annotations(annotations: &Path) -> BTreeMap<String, Vec<String>> {
    // Parses the iTOL annotation file: everything before the DATA line is preamble, after it
    // each line is tab-separated with the taxon id in the first column and the family in the
    // third.
    let mut family_to_taxa: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut inside_data = false;
    for line in open_maybe_gzipped(annotations).lines() {
        let text = match line {
            Ok(text) => text,
            Err(e) => quit_with_error(&format!("failed to read {}\n{}",
                                               annotations.display(), e)),
        };
        let text = text.trim();
        if text == "DATA" {
            inside_data = true;
            continue;
        }
        if !inside_data || text.is_empty() { continue; }
        let parts: Vec<&str> = text.split('\t').collect();
        if parts.len() < 3 { continue; }
        let taxon_id = parts[0].to_string();
        let family = parts[2].trim().to_string();
        family_to_taxa.entry(family).or_default().push(taxon_id);
    }
    family_to_taxa
}


fn write_family_files(family_to_taxa: &BTreeMap<String, Vec<String>>,
                      tree_taxa: &HashSet<String>, out_dir: &Path, min_taxa: usize) -> usize {
    let mut written = 0;
    for (family, taxa) in family_to_taxa {
        let present: Vec<&String> = taxa.iter().filter(|taxon| tree_taxa.contains(*taxon))
            .collect();
        if present.len() < min_taxa {
            eprintln!("{}", format!("{}: skipped ({} of {} taxa in tree, {} required)",
                                    family, present.len(), taxa.len(), min_taxa).dimmed());
            continue;
        }
        let filename = out_dir.join(format!("{}.txt", sanitise_family_name(family)));
        let mut content = String::new();
        for taxon in &present {
            content.push_str(taxon);
            content.push('\n');
        }
        let mut file = match File::create(&filename) {
            Ok(file) => file,
            Err(e) => quit_with_error(&format!("failed to create {}\n{}",
                                               filename.display(), e)),
        };
        if let Err(e) = file.write_all(content.as_bytes()) {
            quit_with_error(&format!("failed to write {}\n{}", filename.display(), e));
        }
        eprintln!("{}", format!("{}: {} taxa written to {}",
                                family, present.len(), filename.display()).green());
        written += 1;
    }
    written
}


pub fn sanitise_family_name(family: &str) -> String {
    // Family names become file names, so path separators and whitespace are replaced.
    family.chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tree_taxa() {
        let newick = "((taxon1:0.1,taxon2:0.2):0.05,(taxon3:0.3,'taxon 4':0.4):0.1);";
        let taxa = extract_tree_taxa(newick);
        assert!(taxa.contains("taxon1"));
        assert!(taxa.contains("taxon2"));
        assert!(taxa.contains("taxon3"));
        assert!(taxa.contains("taxon 4"));  // quotes are stripped before matching
        assert_eq!(taxa.len(), 4);
    }

    #[test]
    fn test_load_family_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let annotations = dir.path().join("itol.txt");
        crate::tests::make_test_file(&annotations,
            "DATASET_COLORSTRIP\nSEPARATOR TAB\nDATA\n\
             t1\t#ff0000\tSiphoviridae\n\
             t2\t#ff0000\tSiphoviridae\n\
             t3\t#00ff00\tMyoviridae\n\
             short_line\n");
        let families = load_family_annotations(&annotations);
        assert_eq!(families.len(), 2);
        assert_eq!(families["Siphoviridae"], vec!["t1", "t2"]);
        assert_eq!(families["Myoviridae"], vec!["t3"]);
    }

    #[test]
    fn test_annotations_before_data_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let annotations = dir.path().join("itol.txt");
        crate::tests::make_test_file(&annotations,
            "t0\t#ffffff\tIgnoredFamily\nDATA\nt1\t#ff0000\tRealFamily\n");
        let families = load_family_annotations(&annotations);
        assert_eq!(families.len(), 1);
        assert!(families.contains_key("RealFamily"));
    }

    #[test]
    fn test_sanitise_family_name() {
        assert_eq!(sanitise_family_name("Siphoviridae"), "Siphoviridae");
        assert_eq!(sanitise_family_name("Group A/B"), "Group_A_B");
    }
}
