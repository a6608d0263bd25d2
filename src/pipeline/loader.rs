//! Table loader and writer for CSV and Parquet files

use std::borrow::Cow;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Decode CSV bytes, falling back to Windows-1252 for legacy exports.
/// Returns the text and whether the fallback was used.
pub fn decode_csv_bytes(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text.trim_start_matches('\u{feff}')), false),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            (text, true)
        }
    }
}

/// Load a table from a file (CSV or Parquet based on extension).
///
/// `infer_schema_length` of 0 scans the full CSV for type inference.
pub fn load_table(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let df = match extension(path).as_str() {
        "csv" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
            let (text, _) = decode_csv_bytes(&bytes);
            let schema_length = if infer_schema_length == 0 {
                None
            } else {
                Some(infer_schema_length)
            };
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(schema_length)
                .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
                .finish()
                .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?
        }
        "parquet" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open Parquet file: {}", path.display()))?;
            ParquetReader::new(file)
                .finish()
                .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?
        }
        other => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            other
        ),
    };
    Ok(df)
}

/// Save a table to file (CSV or Parquet based on extension)
pub fn save_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "csv" => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        other => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            other
        ),
    }

    Ok(())
}
