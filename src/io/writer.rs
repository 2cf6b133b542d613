//! Result serialization.

use indexmap::IndexSet;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::OutputFormat;
use crate::models::{ManuscriptRecord, ScreeningRun};

/// Prefix for tag columns in CSV output
pub const TAG_COLUMN_PREFIX: &str = "tag_";

/// Errors raised while writing results
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Write error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `run` to `path` in the requested format.
pub fn write_results(run: &ScreeningRun, path: &Path, format: OutputFormat) -> Result<(), OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match format {
        OutputFormat::Csv => write_csv(run, file)?,
        OutputFormat::Json => write_json(run, BufWriter::new(file))?,
    }

    tracing::info!("Results saved to {}", path.display());
    Ok(())
}

/// Pretty-printed JSON document with counters and records.
pub fn write_json<W: Write>(run: &ScreeningRun, mut writer: W) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut writer, run)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// CSV with original columns, one column per tag key, then status columns.
pub fn write_csv<W: Write>(run: &ScreeningRun, writer: W) -> Result<(), OutputError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    let columns = original_columns(run);
    let tag_keys = tag_keys(&run.records);

    let header = columns
        .iter()
        .cloned()
        .chain(tag_keys.iter().map(|key| format!("{}{}", TAG_COLUMN_PREFIX, key)))
        .chain(["include".to_string(), "exclusion_reason".to_string()]);
    csv_writer.write_record(header)?;

    for record in &run.records {
        let row = columns
            .iter()
            .map(|column| {
                record
                    .original_data()
                    .get(column)
                    .cloned()
                    .unwrap_or_default()
            })
            .chain(tag_keys.iter().map(|key| {
                record.tag(key).map(tag_cell).unwrap_or_default()
            }))
            .chain([
                record.is_included().to_string(),
                record.exclusion_reason().unwrap_or_default().to_string(),
            ]);
        csv_writer.write_record(row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Loaded header columns, then any others in first-seen order across records.
fn original_columns(run: &ScreeningRun) -> IndexSet<String> {
    run.columns
        .iter()
        .cloned()
        .chain(
            run.records
                .iter()
                .flat_map(|record| record.original_data().keys().cloned()),
        )
        .collect()
}

/// Distinct tag keys in first-seen order.
fn tag_keys(records: &[ManuscriptRecord]) -> IndexSet<String> {
    records
        .iter()
        .flat_map(|record| record.tags().keys().cloned())
        .collect()
}

/// Strings are written raw, everything else as JSON text.
fn tag_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
