// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores training checkpoints.
//
// What gets saved per checkpoint (in this order):
//   1. model.ckpt-{k}.bin  — opaque weight blob from the model
//   2. losses-{k}.json     — losses since the previous checkpoint
//   3. iterations.json     — the running iteration counter
//   4. checkpoint.json     — index of completed checkpoints
//
// The index goes last: a crash anywhere before it leaves the
// previous checkpoint as "the" current one, with its weights,
// counter and losses still consistent.
//
// Older checkpoints are never deleted. `latest` in the index
// moves forward; everything else stays addressable by iteration.
//
// The config snapshot and vocabulary are written here too, once
// per run, but they are READ by the resume validator: they have
// to be checked before any weights are loaded.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::TrainError;
use crate::domain::vocab::Vocabulary;
use crate::infra::artifacts::{
    loss_tag, write_atomic, write_json_atomic, ArtifactLayout, CheckpointIndex,
};

/// One checkpoint as produced by the training loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    /// Iteration counter at the time of the checkpoint
    pub iteration: u64,
    /// Opaque model weights
    pub weights: Vec<u8>,
    /// Losses recorded since the previous checkpoint
    pub losses: Vec<f64>,
}

/// What a resume needs back: where to continue counting, and
/// the weights to continue from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCheckpoint {
    pub iteration: u64,
    pub weights:   Vec<u8>,
}

// ─── Loss History ─────────────────────────────────────────────────────────────
/// Losses flushed at one checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LossSegment {
    /// Iteration at which the segment was flushed
    pub iteration: u64,
    pub losses:    Vec<f64>,
}

/// A segment whose length does not match the iterations it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentGap {
    pub iteration: u64,
    pub expected:  u64,
    pub found:     usize,
}

/// Every loss segment in a directory, ordered by iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossHistory {
    pub segments: Vec<LossSegment>,
}

impl LossHistory {
    /// All losses in training order
    pub fn flatten(&self) -> Vec<f64> {
        self.segments.iter().flat_map(|s| s.losses.iter().copied()).collect()
    }

    /// Segments that do not exactly cover the iterations since the
    /// previous segment. `origin` is the iteration the first segment
    /// starts after: 0 for a fresh run.
    pub fn gaps(&self, origin: u64) -> Vec<SegmentGap> {
        let mut prev = origin;
        let mut out  = Vec::new();
        for seg in &self.segments {
            let expected = seg.iteration.saturating_sub(prev);
            if seg.losses.len() as u64 != expected {
                out.push(SegmentGap {
                    iteration: seg.iteration,
                    expected,
                    found: seg.losses.len(),
                });
            }
            prev = seg.iteration;
        }
        out
    }
}

// ─── CheckpointStore ──────────────────────────────────────────────────────────
/// Reads and writes the artifacts of one run directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    layout: ArtifactLayout,
}

impl CheckpointStore {
    /// Create the store, creating the directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create save directory '{}'", dir.display()))?;
        Ok(Self::open(dir))
    }

    /// Open an existing directory without touching the filesystem.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self { layout: ArtifactLayout::new(dir) }
    }

    pub fn dir(&self) -> &Path {
        self.layout.dir()
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Persist the run's configuration snapshot.
    ///
    /// Must happen before the first training step.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        write_json_atomic(&self.layout.config(), cfg)?;
        tracing::debug!("Saved training config to '{}'", self.layout.config().display());
        Ok(())
    }

    /// Persist the vocabulary alongside the config snapshot.
    pub fn save_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        write_json_atomic(&self.layout.vocab(), vocab)?;
        tracing::debug!("Saved vocabulary ({} symbols)", vocab.len());
        Ok(())
    }

    /// Write one checkpoint and make it the current one.
    pub fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let k = record.iteration;

        write_atomic(&self.layout.weights(k), &record.weights)
            .with_context(|| format!("Failed to save weights for iteration {k}"))?;
        write_json_atomic(&self.layout.losses(k), &record.losses)
            .with_context(|| format!("Failed to save loss segment for iteration {k}"))?;
        write_json_atomic(&self.layout.iterations(), &k)
            .context("Failed to update iteration counter")?;

        let index = match self.read_index()? {
            Some(existing) => existing.with(k),
            None           => CheckpointIndex::first(k),
        };
        write_json_atomic(&self.layout.index(), &index)
            .context("Failed to update checkpoint index")?;

        tracing::info!(
            "model saved to '{}' (iteration {}, {} losses)",
            self.layout.weights(k).display(),
            k,
            record.losses.len()
        );
        Ok(())
    }

    /// Read the checkpoint index, `None` if no checkpoint was ever completed.
    pub fn read_index(&self) -> Result<Option<CheckpointIndex>> {
        let path = self.layout.index();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_json(&path)?))
    }

    /// Iterations of every completed checkpoint, ascending.
    pub fn checkpoints(&self) -> Result<Vec<u64>> {
        Ok(self.read_index()?.map(|idx| idx.all).unwrap_or_default())
    }

    /// Load the weights saved at a specific iteration.
    pub fn load(&self, iteration: u64) -> Result<LoadedCheckpoint> {
        let path = self.layout.weights(iteration);
        if !path.is_file() {
            return Err(TrainError::MissingArtifact {
                artifact: "model checkpoint",
                path,
            }
            .into());
        }

        let weights = fs::read(&path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

        tracing::info!("Loaded checkpoint '{}'", path.display());
        Ok(LoadedCheckpoint { iteration, weights })
    }

    /// Load the current (most recent) checkpoint.
    pub fn load_latest(&self) -> Result<LoadedCheckpoint> {
        let index = self.read_index()?.ok_or_else(|| TrainError::NoCheckpoint {
            dir: self.dir().to_path_buf(),
        })?;
        self.load(index.latest)
    }

    /// Read the loss segment of every completed checkpoint, ordered
    /// by iteration.
    ///
    /// Only iterations listed in the index count: a `losses-{k}` file
    /// left behind by an interrupted save is skipped. Ordering is
    /// numeric: `losses-10` comes before `losses-100`.
    pub fn loss_history(&self) -> Result<LossHistory> {
        let dir = self.dir();
        let completed = self.checkpoints()?;
        let mut tagged: Vec<(u64, PathBuf)> = Vec::new();

        for entry in fs::read_dir(dir)
            .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
        {
            let entry = entry?;
            let name  = entry.file_name();
            let Some(tag) = loss_tag(&name.to_string_lossy()) else {
                continue;
            };
            if completed.contains(&tag) {
                tagged.push((tag, entry.path()));
            } else {
                tracing::warn!("Ignoring '{}': not a completed checkpoint", entry.path().display());
            }
        }
        tagged.sort_by_key(|(tag, _)| *tag);

        let mut segments = Vec::with_capacity(tagged.len());
        for (iteration, path) in tagged {
            let losses: Vec<f64> = read_json(&path)?;
            segments.push(LossSegment { iteration, losses });
        }
        Ok(LossHistory { segments })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&s)
        .with_context(|| format!("Cannot parse '{}'", path.display()))
}
