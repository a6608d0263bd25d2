//! Command-line argument definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Dropwatch - Build dropout features and labels from administrative tables and score them
#[derive(Parser, Debug)]
#[command(name = "dropwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every stage and score each labeled row against the frozen model
    Score(RunArgs),

    /// Run every stage up to labeling and export the training matrix
    Prepare(RunArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Score(_) => "score",
            Commands::Prepare(_) => "prepare",
        }
    }

    pub fn run_args(&self) -> &RunArgs {
        match self {
            Commands::Score(args) | Commands::Prepare(args) => args,
        }
    }
}

/// The four canonical relations plus the optional enrollment roster.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Course grades table (CSV or Parquet)
    #[arg(long)]
    pub grades: PathBuf,

    /// Per-cycle summaries table (CSV or Parquet)
    #[arg(long)]
    pub summaries: PathBuf,

    /// Per-cycle personal/enrollment records (CSV or Parquet)
    #[arg(long)]
    pub personal: PathBuf,

    /// Admission records (CSV or Parquet)
    #[arg(long)]
    pub admissions: PathBuf,

    /// Enrollment roster for the latest cycle.
    /// When given, it decides the labels of the second-to-last global cycle.
    #[arg(long)]
    pub roster: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Directory holding columns.csv, scaler.json, model.json and subject_categories.csv
    #[arg(short, long, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Subject lookup CSV (class,category). Defaults to <artifacts>/subject_categories.csv
    #[arg(long)]
    pub subject_categories: Option<PathBuf>,

    /// Continue with an empty subject lookup when it cannot be read.
    /// Every class then maps to "Otro" and the run is reported as degraded.
    #[arg(long, default_value = "false")]
    pub allow_missing_vocabulary: bool,

    /// Output file path (CSV or Parquet, determined by extension).
    /// Defaults to the personal table's directory with a '_scored' or '_prepared' suffix.
    #[arg(short, long, value_parser = validate_table_path)]
    pub output: Option<PathBuf>,

    /// Processing report path (JSON). Defaults to the output path with a '_report.json' suffix
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Package the output table and report into a single zip archive
    #[arg(long, default_value = "false")]
    pub bundle: bool,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl RunArgs {
    /// Get the output path, deriving it from the personal table if not explicitly provided.
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            derive_sibling(&self.inputs.personal, suffix, "csv")
        })
    }

    /// Get the report path, deriving it from the output path if not explicitly provided.
    pub fn report_path(&self, output: &Path) -> PathBuf {
        self.report.clone().unwrap_or_else(|| {
            let parent = output.parent().unwrap_or_else(|| Path::new("."));
            let stem = output
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            parent.join(format!("{}_report.json", stem))
        })
    }

    /// Zip archive path next to the output table.
    pub fn bundle_path(&self, output: &Path) -> PathBuf {
        output.with_extension("zip")
    }
}

fn derive_sibling(input: &Path, suffix: &str, default_extension: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(default_extension);
    parent.join(format!("{}_{}.{}", stem, suffix, extension))
}

/// Validator for output table paths
fn validate_table_path(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("csv") | Some("parquet") => Ok(path),
        _ => Err(format!(
            "output must end in .csv or .parquet, got '{}'",
            s
        )),
    }
}
