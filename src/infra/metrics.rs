// ============================================================
// Layer 6 — Progress Logger
// ============================================================
// The built-in ProgressSink. After every batch it:
//   1. emits one tracing event in the classic char-rnn format
//        "120/2500 (epoch 0), train_loss = 2.314, time/batch = 0.012"
//   2. appends one row to progress.csv in the save directory
//
// Example CSV output:
//   iteration,epoch,batch,learning_rate,loss,seconds
//   1,0,0,0.002000,4.174387,0.012113
//   2,0,1,0.002000,4.120911,0.011874
//
// Reporting is a side effect only. A failed CSV write is logged
// as a warning and training carries on.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::{Progress, ProgressSink};
use crate::infra::artifacts::PROGRESS_FILE;

const CSV_HEADER: &str = "iteration,epoch,batch,learning_rate,loss,seconds";

/// Logs every batch to tracing and to a CSV file.
pub struct ProgressLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl ProgressLogger {
    /// Create a logger writing to `{dir}/progress.csv`.
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run keeps appending to the same file.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;

        let csv_path = dir.join(PROGRESS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")
                .with_context(|| format!("Cannot write '{}'", csv_path.display()))?;
            tracing::debug!("Created progress CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Return the path to the progress CSV file
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn append(&self, p: &Progress) -> std::io::Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{},{},{:.6},{:.6},{:.6}",
            p.iteration,
            p.epoch,
            p.global_batch,
            p.learning_rate,
            p.loss,
            p.elapsed.as_secs_f64(),
        )
    }
}

impl ProgressSink for ProgressLogger {
    fn observe(&mut self, p: &Progress) {
        tracing::info!(
            "{}/{} (epoch {}), train_loss = {:.3}, time/batch = {:.3}",
            p.global_batch,
            p.total_batches,
            p.epoch,
            p.loss,
            p.elapsed.as_secs_f64(),
        );

        if let Err(e) = self.append(p) {
            tracing::warn!("Cannot append to '{}': {}", self.csv_path.display(), e);
        }
    }
}
