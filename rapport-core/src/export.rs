//! On-demand export of the current report set as a downloadable document.

use chrono::NaiveDate;
use serde::Serialize;

use rapport_data::{DataError, ReportRecord, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(DataError::Validation(format!(
                "unknown export format: {}",
                other
            ))),
        }
    }
}

/// A generated export, ready to be offered as a file download.
#[derive(Debug, Clone, Serialize)]
pub struct ExportFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub content: String,
}

const CSV_COLUMNS: [&str; 14] = [
    "id",
    "date",
    "agent_name",
    "client_name",
    "software",
    "site",
    "intervention_type",
    "object",
    "duration",
    "status",
    "is_validated",
    "validated_by_name",
    "validated_at",
    "created_at",
];

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(report: &ReportRecord) -> String {
    let validated = if report.is_validated { "oui" } else { "non" };
    let fields: [&str; 14] = [
        &report.id,
        &report.date,
        &report.agent_name,
        &report.client_name,
        &report.software,
        &report.site,
        &report.intervention_type,
        &report.object,
        &report.duration,
        report.status.as_str(),
        validated,
        report.validated_by_name.as_deref().unwrap_or(""),
        report.validated_at.as_deref().unwrap_or(""),
        &report.created_at,
    ];
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn reports_to_csv(reports: &[ReportRecord]) -> String {
    let mut lines = Vec::with_capacity(reports.len() + 1);
    lines.push(CSV_COLUMNS.join(","));
    for report in reports {
        lines.push(csv_row(report));
    }
    lines.join("\n")
}

/// Serialize the report set for download. `stamp` dates the filename
/// (`export_reports_YYYY-MM-DD.<ext>`); an empty set is an error so the
/// UI can tell the user there was nothing to export.
pub fn export_reports(
    reports: &[ReportRecord],
    format: ExportFormat,
    stamp: NaiveDate,
) -> Result<ExportFile> {
    if reports.is_empty() {
        return Err(DataError::Validation("no data to export".to_string()));
    }

    let (content, mime_type, extension) = match format {
        ExportFormat::Json => (
            serde_json::to_string_pretty(reports)
                .map_err(|e| DataError::Backend(e.to_string()))?,
            "application/json",
            "json",
        ),
        ExportFormat::Csv => (
            reports_to_csv(reports),
            "text/csv;charset=utf-8",
            "csv",
        ),
    };

    Ok(ExportFile {
        filename: format!("export_reports_{}.{}", stamp.format("%Y-%m-%d"), extension),
        mime_type,
        content,
    })
}
