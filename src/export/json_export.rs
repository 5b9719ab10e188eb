//! JSON export of experiment reports.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::experiment::ExperimentReport;

/// Report wrapped with export metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportExport {
    /// RFC 3339 export timestamp
    pub exported_at: String,
    /// Crate version that wrote the file
    pub version: String,
    pub report: ExperimentReport,
}

impl ReportExport {
    fn now(report: &ExperimentReport) -> Self {
        Self {
            exported_at: Local::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            report: report.clone(),
        }
    }
}

/// Export a report to `exports/report_YYYYMMDD_HHMMSS.json`.
///
/// Returns the path to the saved file.
pub fn export_report_json(report: &ExperimentReport) -> Result<PathBuf> {
    let dir = PathBuf::from("exports");
    std::fs::create_dir_all(&dir)?;

    let filename = format!("report_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
    let path = dir.join(filename);
    export_report_json_to(report, &path)?;
    Ok(path)
}

/// Export a report to a specific file.
pub fn export_report_json_to(report: &ExperimentReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &ReportExport::now(report))?;

    log::info!("JSON report exported: {}", path.display());
    Ok(())
}
