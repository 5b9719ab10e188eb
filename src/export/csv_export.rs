//! CSV export of population trajectories.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Local;

use crate::dynamics::Trajectory;

/// Column names: `time`, `tcell_0..`, `treg_0..`.
pub fn trajectory_header(num_tcell: usize, num_treg: usize) -> Vec<String> {
    std::iter::once("time".to_string())
        .chain((0..num_tcell).map(|i| format!("tcell_{}", i)))
        .chain((0..num_treg).map(|a| format!("treg_{}", a)))
        .collect()
}

/// CSV writer for one trajectory
pub struct CsvTrajectoryExporter {
    writer: csv::Writer<File>,
    /// Width of every state row
    width: usize,
    rows: usize,
    path: PathBuf,
}

impl CsvTrajectoryExporter {
    /// Create an exporter under `exports/` with a timestamped filename.
    pub fn new(num_tcell: usize, num_treg: usize) -> Result<Self> {
        let dir = PathBuf::from("exports");
        std::fs::create_dir_all(&dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("trajectory_{}.csv", timestamp));
        Self::create(path, num_tcell, num_treg)
    }

    /// Create an exporter writing to `path`.
    pub fn create<P: AsRef<Path>>(path: P, num_tcell: usize, num_treg: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::Writer::from_writer(File::create(&path)?);
        writer.write_record(trajectory_header(num_tcell, num_treg))?;

        log::info!("CSV export started: {}", path.display());

        Ok(Self {
            writer,
            width: num_tcell + num_treg,
            rows: 0,
            path,
        })
    }

    /// Append one `(t, state)` row.
    pub fn record(&mut self, t: f64, state: &[f64]) -> Result<()> {
        if state.len() != self.width {
            bail!(
                "state has {} entries, CSV header has {}",
                state.len(),
                self.width
            );
        }
        let row = std::iter::once(t)
            .chain(state.iter().copied())
            .map(|v| v.to_string());
        self.writer.write_record(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Append every sample of `trajectory`.
    pub fn record_trajectory(&mut self, trajectory: &Trajectory) -> Result<()> {
        for (t, state) in trajectory.times.iter().zip(trajectory.states.iter()) {
            self.record(*t, state)?;
        }
        Ok(())
    }

    /// Flush and return the output path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        log::info!(
            "CSV export completed: {} rows to {}",
            self.rows,
            self.path.display()
        );
        Ok(self.path)
    }
}
