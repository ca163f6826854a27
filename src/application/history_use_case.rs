// ============================================================
// Layer 2 — HistoryUseCase
// ============================================================
// Reads back the loss segments of a run directory and
// summarises them. Read-only: nothing in the directory is
// created or modified.
//
// A segment "gap" means a losses-{k} file that does not cover
// exactly the iterations since the previous segment. For a run
// that was resumed from somewhere other than its own latest
// checkpoint this is expected, so gaps are reported as warnings,
// not errors.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::infra::checkpoint::{CheckpointStore, LossHistory, SegmentGap};

/// Summary of a run directory's recorded losses.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReport {
    pub dir:         PathBuf,
    pub checkpoints: Vec<u64>,
    pub history:     LossHistory,
    pub gaps:        Vec<SegmentGap>,
}

impl HistoryReport {
    pub fn total(&self) -> usize {
        self.history.segments.iter().map(|s| s.losses.len()).sum()
    }

    pub fn first_loss(&self) -> Option<f64> {
        self.history.segments.iter().flat_map(|s| s.losses.first()).next().copied()
    }

    pub fn last_loss(&self) -> Option<f64> {
        self.history.segments.iter().rev().flat_map(|s| s.losses.last()).next().copied()
    }

    pub fn mean_loss(&self) -> Option<f64> {
        let all = self.history.flatten();
        if all.is_empty() {
            return None;
        }
        Some(all.iter().sum::<f64>() / all.len() as f64)
    }
}

pub struct HistoryUseCase {
    dir:    PathBuf,
    origin: u64,
}

impl HistoryUseCase {
    /// `origin` is the iteration the oldest segment starts after.
    pub fn new(dir: impl AsRef<Path>, origin: u64) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), origin }
    }

    pub fn execute(&self) -> Result<HistoryReport> {
        let store       = CheckpointStore::open(&self.dir);
        let checkpoints = store.checkpoints()?;
        let history     = store.loss_history()?;
        let gaps        = history.gaps(self.origin);

        for gap in &gaps {
            tracing::warn!(
                "losses-{} holds {} values but covers {} iterations",
                gap.iteration,
                gap.found,
                gap.expected
            );
        }

        Ok(HistoryReport { dir: self.dir.clone(), checkpoints, history, gaps })
    }
}
