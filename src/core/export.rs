//! Tabular export of tracked scans.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::error::TrackerError;
use super::models::ScanJob;

/// Written in place of an absent payload or timestamp.
pub const EMPTY_MARKER: &str = "-";

const CSV_HEADER: [&str; 5] = ["Domain", "Status", "CreatedAt", "CompletedAt", "Result"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// Pick a format from a file extension, if it is one we write.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// One exported line, every field already rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportRow {
    pub domain: String,
    pub status: String,
    pub created_at: String,
    pub completed_at: String,
    pub result: String,
}

/// Render jobs as rows, keeping their order.
pub fn export(jobs: &[ScanJob]) -> Vec<ExportRow> {
    jobs.iter()
        .map(|job| ExportRow {
            domain: job.domain.clone(),
            status: job.status.to_string(),
            created_at: format_time(Some(job.created_at)),
            completed_at: format_time(job.completed_at),
            result: result_text(job.result.as_ref()),
        })
        .collect()
}

/// Compact text for an opaque result payload.
pub fn result_text(result: Option<&Value>) -> String {
    match result {
        None | Some(Value::Null) => EMPTY_MARKER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| EMPTY_MARKER.to_string())
}

pub fn write_csv<W: Write>(rows: &[ExportRow], mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;
    for row in rows {
        let fields = [
            &row.domain,
            &row.status,
            &row.created_at,
            &row.completed_at,
            &row.result,
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    writer.flush()
}

pub fn write_json<W: Write>(rows: &[ExportRow], mut writer: W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writeln!(writer)?;
    writer.flush()
}

/// Write `jobs` to `path` in `format`. Returns the number of rows written.
pub fn export_to_file(
    path: &Path,
    jobs: &[ScanJob],
    format: ExportFormat,
) -> Result<usize, TrackerError> {
    let rows = export(jobs);
    let file = std::fs::File::create(path)
        .map_err(|e| TrackerError::Export(format!("{}: {}", path.display(), e)))?;
    let writer = std::io::BufWriter::new(file);

    match format {
        ExportFormat::Csv => write_csv(&rows, writer),
        ExportFormat::Json => write_json(&rows, writer),
    }
    .map_err(|e| TrackerError::Export(format!("{}: {}", path.display(), e)))?;

    Ok(rows.len())
}

/// Quote a CSV field when it holds a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
