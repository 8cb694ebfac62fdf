//! Output formatting and persistence for audit reports.
//!
//! Supports JSON serialization (optionally gzip-compressed) and a CSV
//! summary that grows by one row per audited file and run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::audits::{AuditReport, FileReport};

/// Logs the report as pretty-printed JSON.
pub fn print_json(report: &AuditReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Writes the full report as pretty JSON, gzip-compressed when `gzip` is set.
pub fn write_report(path: impl AsRef<Path>, report: &AuditReport, gzip: bool) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file =
        File::create(path).with_context(|| format!("creating report {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if gzip {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, report)?;
        writer = encoder.finish()?;
    } else {
        serde_json::to_writer_pretty(&mut writer, report)?;
    }
    writer.flush()?;

    info!(path = %path.display(), gzip, "Report written");
    Ok(())
}

/// One CSV line per audited file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub timestamp: DateTime<Utc>,
    pub file: String,
    pub file_status: String,
    pub overall_status: String,
    pub total_rows: usize,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub warning_checks: usize,
    pub error_checks: usize,
    pub critical_checks: usize,
    pub mean_score: Option<f64>,
}

impl SummaryRow {
    pub fn from_file(timestamp: DateTime<Utc>, file: &FileReport) -> Self {
        Self {
            timestamp,
            file: file.file.clone(),
            file_status: file.status.as_str().to_string(),
            overall_status: file.summary.overall_status.as_str().to_string(),
            total_rows: file.total_rows,
            total_checks: file.summary.total_checks,
            passed_checks: file.summary.passed_checks,
            warning_checks: file.summary.warning_checks,
            error_checks: file.summary.error_checks,
            critical_checks: file.summary.critical_checks,
            mean_score: file.mean_score(),
        }
    }
}

/// Appends one [`SummaryRow`] per file of `report` to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summary(path: impl AsRef<Path>, report: &AuditReport) -> Result<()> {
    let path = path.as_ref();
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV summary");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening summary {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for file in &report.files {
        writer.serialize(SummaryRow::from_file(report.generated_at, file))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audits::{AuditEngine, FileStatus};
    use crate::table::TableStore;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;

    fn report() -> AuditReport {
        AuditEngine::default().run_all(&TableStore::new())
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&report()).unwrap();
    }

    #[test]
    fn test_write_report_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        write_report(&path, &report(), false).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["files_critical"], 5);
        assert_eq!(value["files"][0]["status"], "missing");
    }

    #[test]
    fn test_write_report_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json.gz");
        write_report(&path, &report(), true).unwrap();

        let mut json = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["statistics"].is_object());
    }

    #[test]
    fn test_append_summary_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let report = report();

        append_summary(&path, &report).unwrap();
        append_summary(&path, &report).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.starts_with("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 runs of one row per file
        assert_eq!(content.lines().count(), 1 + 2 * report.files.len());
    }

    #[test]
    fn test_summary_row_from_missing_file() {
        let report = report();
        let file = &report.files[0];
        assert_eq!(file.status, FileStatus::Missing);

        let row = SummaryRow::from_file(report.generated_at, file);
        assert_eq!(row.file_status, "missing");
        assert_eq!(row.overall_status, "critical");
        assert_eq!(row.mean_score, None);
    }
}
