//! Processing report for one batch run
//!
//! Collects the row funnel, label statistics, scoring outcome and every
//! recoverable issue, and exports them as JSON (optionally bundled with the
//! output table into a zip archive).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{FilterStep, Issue, LabelStats, Rejections};

/// Row counts for one input relation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InputSummary {
    pub rows: usize,
    pub rejected: Rejections,
}

/// Everything a caller needs to audit one run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    pub timestamp: String,
    pub dropwatch_version: String,
    pub inputs: BTreeMap<String, InputSummary>,
    pub filters: Vec<FilterStep>,
    pub grade_groups: usize,
    pub panel_rows: usize,
    pub encoded_features: usize,
    pub labeled_rows: usize,
    pub label: LabelStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_columns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_kind: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub risk_counts: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
}

impl Default for ProcessingReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingReport {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            dropwatch_version: env!("CARGO_PKG_VERSION").to_string(),
            inputs: BTreeMap::new(),
            filters: Vec::new(),
            grade_groups: 0,
            panel_rows: 0,
            encoded_features: 0,
            labeled_rows: 0,
            label: LabelStats::default(),
            schema_columns: None,
            model_kind: None,
            risk_counts: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    pub fn record_input(&mut self, table: &str, rows: usize, rejected: Rejections) {
        self.inputs
            .insert(table.to_string(), InputSummary { rows, rejected });
    }

    /// Issues of one kind, e.g. `"missing_feature"`.
    pub fn issues_of_kind(&self, kind: &str) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|issue| {
                serde_json::to_value(issue)
                    .ok()
                    .and_then(|v| v.get("kind").and_then(|k| k.as_str()).map(|k| k == kind))
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Export the processing report to a JSON file
pub fn export_processing_report(report: &ProcessingReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize processing report to JSON")?;

    std::fs::write(output_path, json).with_context(|| {
        format!(
            "Failed to write processing report to {}",
            output_path.display()
        )
    })?;

    Ok(())
}

/// Package the output table and its report into a zip archive.
///
/// The individual files are removed once the archive is written.
pub fn package_outputs(table_path: &Path, report_path: &Path, zip_path: &Path) -> Result<()> {
    use std::io::{Read, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut add_file_to_zip = |path: &Path, default_name: &str| -> Result<()> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(default_name);
        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
        Ok(())
    };

    add_file_to_zip(table_path, "scored.csv")?;
    add_file_to_zip(report_path, "processing_report.json")?;

    zip.finish().context("Failed to finalize zip file")?;

    std::fs::remove_file(table_path).ok();
    std::fs::remove_file(report_path).ok();

    Ok(())
}
