// This is the main file of Votukit and where execution starts. It mainly handles the CLI and
// then calls into other files to run whichever subcommand the user chose.

// Copyright 2025 Ryan Wick (rrwick@gmail.com)
// https://github.com/rrwick/Votukit

// This file is part of Votukit. Votukit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. Votukit is
// distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with Votukit. If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;
use clap::{Parser, Subcommand, crate_version};

mod alignment;
mod audit;
mod batch;
mod clades;
mod compare;
mod external;
mod heatmap;
mod log;
mod metrics;
mod misc;
mod overlap;
mod pipeline;
mod plot;
mod status;
mod table;
mod vogmap;


#[derive(Parser)]
#[clap(name = "Votukit",
       version = concat!("v", crate_version!()),
       about = "a toolkit for vOTU classification pipelines and aligner benchmarking\n\
                Documenation: https://github.com/rrwick/Votukit/wiki",
       before_help = concat!(r#"__      __   _         _    _ _ "#, "\n",
                             r#"\ \    / /  | |       | |  (_) |  "#, "\n",
                             r#" \ \  / /__ | |_ _   _| | ___| |_ "#, "\n",
                             r#"  \ \/ / _ \| __| | | | |/ / | __|"#, "\n",
                             r#"   \  / (_) | |_| |_| |   <| | |_ "#, "\n",
                             r#"    \/ \___/ \__|\__,_|_|\_\_|\__|"#))]
#[command(author, version, long_about = None, disable_help_subcommand = true,
          propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {

    /// run the vOTU preparation pipeline: extract, combine, Prodigal, MMseqs2 all-vs-all
    Pipeline {
        /// Benchmark TSV containing the OTU sequences (required)
        #[clap(short = 'i', long = "in_tsv", required = true)]
        in_tsv: PathBuf,

        /// FASTA file of reference sequences to include (required)
        #[clap(short = 'r', long = "reference", required = true)]
        reference: PathBuf,

        /// Output directory
        #[clap(short = 'o', long = "out_dir", default_value = "votu_analysis")]
        out_dir: PathBuf,

        /// Number of CPU threads for MMseqs2
        #[clap(short = 't', long = "threads", default_value = "8")]
        threads: usize,

        /// E-value cutoff for the all-vs-all search
        #[clap(short = 'e', long = "evalue", default_value = "1e-5")]
        evalue: f64,

        /// Maximum hits to keep per query sequence
        #[clap(long = "max_seqs", default_value = "10000")]
        max_seqs: u32,
    },

    /// classify each benchmark sequence with geNomad and CheckV, resuming from disk
    Batch {
        /// Benchmark TSV with sequence ids and sequences (required)
        #[clap(short = 'i', long = "in_tsv", required = true)]
        in_tsv: PathBuf,

        /// Output directory for per-sequence results and the status file
        #[clap(short = 'o', long = "out_dir", default_value = "output_analysis")]
        out_dir: PathBuf,

        /// geNomad database directory (required)
        #[clap(long = "genomad_db", required = true)]
        genomad_db: PathBuf,

        /// CheckV database directory (required)
        #[clap(long = "checkv_db", required = true)]
        checkv_db: PathBuf,

        /// Number of sequences to process in parallel
        #[clap(short = 't', long = "threads", default_value = "10")]
        threads: usize,
    },

    /// rebuild the status file from on-disk evidence and report batch progress
    Audit {
        /// Benchmark TSV with the expected sequence ids (required)
        #[clap(short = 'i', long = "in_tsv", required = true)]
        in_tsv: PathBuf,

        /// Batch output directory to audit
        #[clap(short = 'o', long = "out_dir", default_value = "output_analysis")]
        out_dir: PathBuf,
    },

    /// compare alignment tables from different aligners: stats, Venn diagram, distributions
    Compare {
        /// Alignment tables from two or three aligners (two or three required)
        #[clap(short = 'a', long = "alignments", required = true, num_args = 2..)]
        alignments: Vec<PathBuf>,

        /// Comma-delimited aligner names, one per table
        #[clap(short = 'n', long = "names", hide_default_value = true,
               help = "Comma-delimited aligner names, one per table [default: file stems]")]
        names: Option<String>,

        /// Directory where plots will be saved
        #[clap(short = 'o', long = "out_dir", default_value = "plots")]
        out_dir: PathBuf,

        /// Width (in pixels) of the plot images
        #[clap(long = "res", default_value = "1200")]
        res: u32,
    },

    /// count the aligned-pair overlap of two large tables and draw an UpSet plot
    Overlap {
        /// First alignment table - its pairs are held in memory (required)
        #[clap(long = "in1", required = true)]
        in1: PathBuf,

        /// Second alignment table - streamed, never fully loaded (required)
        #[clap(long = "in2", required = true)]
        in2: PathBuf,

        /// Comma-delimited names for the two aligners
        #[clap(short = 'n', long = "names", hide_default_value = true,
               help = "Comma-delimited names for the two aligners [default: file stems]")]
        names: Option<String>,

        /// File path where the UpSet plot PNG will be saved
        #[clap(short = 'o', long = "out_png", default_value = "plots/upset_plot.png")]
        out_png: PathBuf,

        /// Width (in pixels) of the plot image
        #[clap(long = "res", default_value = "1000")]
        res: u32,
    },

    /// draw a clustered heatmap from a square distance-matrix CSV
    Heatmap {
        /// Square labelled distance matrix in CSV format (required)
        #[clap(short = 'm', long = "matrix", required = true)]
        matrix: PathBuf,

        /// File path where the heatmap PNG will be saved (required)
        #[clap(short = 'o', long = "out_png", required = true)]
        out_png: PathBuf,

        /// Size (in pixels) of the heatmap image
        #[clap(long = "res", default_value = "1000")]
        res: u32,
    },

    /// draw a vOTU x VOG count heatmap from a protein-to-VOG membership TSV
    Vogmap {
        /// Two-column TSV of protein id and VOG cluster (required)
        #[clap(short = 'i', long = "in_tsv", required = true)]
        in_tsv: PathBuf,

        /// File path where the heatmap PNG will be saved (required)
        #[clap(short = 'o', long = "out_png", required = true)]
        out_png: PathBuf,

        /// Number of top vOTUs and VOGs to keep
        #[clap(long = "top", default_value = "150")]
        top: usize,

        /// Size (in pixels) of the heatmap image
        #[clap(long = "res", default_value = "1000")]
        res: u32,
    },

    /// extract per-family taxon list files from an iTOL annotation and a Newick tree
    Clades {
        /// iTOL annotation file with family assignments (required)
        #[clap(short = 'a', long = "annotations", required = true)]
        annotations: PathBuf,

        /// Newick tree whose taxa define what is kept (required)
        #[clap(short = 't', long = "tree", required = true)]
        tree: PathBuf,

        /// Directory where the per-family files will be saved
        #[clap(short = 'o', long = "out_dir", default_value = "families")]
        out_dir: PathBuf,

        /// Minimum taxa (present in the tree) for a family file to be written
        #[clap(long = "min_taxa", default_value = "20")]
        min_taxa: usize,
    },

    /// create TSV line from YAML files
    Table {
        /// Votukit run directory (if absent, a header line will be output)
        #[clap(short = 'd', long = "run_dir")]
        run_dir: Option<PathBuf>,

        /// Sample name
        #[clap(short = 'n', long = "name", default_value = "", hide_default_value = true,
               help = "Sample name [default: blank]")]
        name: String,

        /// Comma-delimited list of YAML fields to include
        #[clap(short = 'f', long = "fields",
               default_value = "input_sequence_count, viral_sequence_count, \
                                predicted_gene_count, alignment_count, genomad_completed, \
                                genomad_completed_no_hits, genomad_failed, checkv_completed, \
                                checkv_failed, audit_fully_completed, audit_not_started, \
                                audit_in_progress")]
        fields: String,

        /// Significant figures to use for floating point numbers
        #[clap(short = 's', long = "sigfigs", default_value = "3")]
        sigfigs: usize,
    },
}


fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Pipeline { in_tsv, reference, out_dir, threads, evalue, max_seqs }) => {
            pipeline::pipeline(in_tsv, reference, out_dir, threads, evalue, max_seqs);
        },
        Some(Commands::Batch { in_tsv, out_dir, genomad_db, checkv_db, threads }) => {
            batch::batch(in_tsv, out_dir, genomad_db, checkv_db, threads);
        },
        Some(Commands::Audit { in_tsv, out_dir }) => {
            audit::audit(in_tsv, out_dir);
        },
        Some(Commands::Compare { alignments, names, out_dir, res }) => {
            compare::compare(alignments, names, out_dir, res);
        },
        Some(Commands::Overlap { in1, in2, names, out_png, res }) => {
            overlap::overlap(in1, in2, names, out_png, res);
        },
        Some(Commands::Heatmap { matrix, out_png, res }) => {
            heatmap::heatmap(matrix, out_png, res);
        },
        Some(Commands::Vogmap { in_tsv, out_png, top, res }) => {
            vogmap::vogmap(in_tsv, out_png, top, res);
        },
        Some(Commands::Clades { annotations, tree, out_dir, min_taxa }) => {
            clades::clades(annotations, tree, out_dir, min_taxa);
        },
        Some(Commands::Table { run_dir, name, fields, sigfigs }) => {
            table::table(run_dir, name, fields, sigfigs);
        },
        None => {}
    }
}
