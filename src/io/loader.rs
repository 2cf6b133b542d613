//! Record loading from CSV and TSV files.

use indexmap::{IndexMap, IndexSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::ManuscriptRecord;

/// Errors raised while reading the input file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported input format '{0}' (expected .csv, .tsv or .txt)")]
    UnsupportedFormat(String),

    #[error("Input file has no header row")]
    MissingHeader,

    #[error("Text column '{0}' not found in header")]
    MissingTextColumn(String),

    #[error("Malformed input: {0}")]
    Csv(#[from] csv::Error),
}

/// Input layout, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "tsv" | "txt" => Ok(InputFormat::Tsv),
            _ => Err(LoadError::UnsupportedFormat(extension)),
        }
    }

    fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(true);
        match self {
            InputFormat::Csv => {
                builder.delimiter(b',');
            }
            InputFormat::Tsv => {
                // Plain tab-split lines: no quoting, short rows allowed.
                builder.delimiter(b'\t').quoting(false).flexible(true);
            }
        }
        builder
    }
}

/// Input columns plus the records parsed under them.
///
/// `columns` survives a header-only file, so writers can still reproduce
/// the original layout.
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub columns: Vec<String>,
    pub records: Vec<ManuscriptRecord>,
}

/// Load manuscript records from `path`.
///
/// Record ids are 1-based row numbers. The text column is matched without
/// regard to case; when its value names an existing file, that file's
/// contents become the record text.
pub fn load_records(path: &Path, text_column: &str) -> Result<Vec<ManuscriptRecord>, LoadError> {
    Ok(load_table(path, text_column)?.records)
}

/// Like [`load_records`], keeping the column list.
pub fn load_table(path: &Path, text_column: &str) -> Result<RecordTable, LoadError> {
    let format = InputFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let table = parse_table(&content, format, text_column)?;
    info!("Loaded {} records from {}", table.records.len(), path.display());
    Ok(table)
}

/// Parse already-read input content.
pub fn parse_records(
    content: &str,
    format: InputFormat,
    text_column: &str,
) -> Result<Vec<ManuscriptRecord>, LoadError> {
    Ok(parse_table(content, format, text_column)?.records)
}

/// Like [`parse_records`], keeping the column list.
pub fn parse_table(
    content: &str,
    format: InputFormat,
    text_column: &str,
) -> Result<RecordTable, LoadError> {
    let mut reader = format.reader_builder().from_reader(content.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.iter().all(|column| column.trim().is_empty()) {
        return Err(LoadError::MissingHeader);
    }

    let wanted = text_column.to_lowercase();
    let text_index = header
        .iter()
        .rposition(|column| column.to_lowercase() == wanted)
        .ok_or_else(|| LoadError::MissingTextColumn(text_column.to_string()))?;

    let columns = unique_columns(header);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row_values = result?;

        let data: IndexMap<String, String> = columns
            .iter()
            .zip(row_values.iter())
            .map(|(column, value)| (column.clone(), value.to_string()))
            .collect();

        let raw_text = row_values.get(text_index).unwrap_or("");
        let text = resolve_text(raw_text);

        records.push(ManuscriptRecord::new((row + 1).to_string(), data, text));
    }

    Ok(RecordTable { columns, records })
}

/// Suffix repeated header names (`title`, `title_2`, ...) so no column is lost.
fn unique_columns(header: Vec<String>) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::with_capacity(header.len());
    for column in header {
        let mut name = column.clone();
        let mut n = 2;
        while seen.contains(&name) {
            name = format!("{}_{}", column, n);
            n += 1;
        }
        if name != column {
            warn!("Duplicate column '{}' renamed to '{}'", column, name);
        }
        seen.insert(name);
    }
    seen.into_iter().collect()
}

/// Substitute file contents when the value is a path to an existing file.
fn resolve_text(value: &str) -> String {
    if value.trim().is_empty() {
        return value.to_string();
    }

    let candidate = Path::new(value);
    if !candidate.exists() {
        return value.to_string();
    }

    match fs::read_to_string(candidate) {
        Ok(content) => {
            debug!("Read manuscript text from {}", candidate.display());
            content
        }
        Err(e) => {
            warn!("Could not read text file {}: {}", candidate.display(), e);
            value.to_string()
        }
    }
}
