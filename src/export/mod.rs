//! Export of experiment results.
//!
//! Provides CSV trajectory export and JSON report export.

mod csv_export;
mod json_export;

pub use csv_export::{trajectory_header, CsvTrajectoryExporter};
pub use json_export::{export_report_json, export_report_json_to, ReportExport};
