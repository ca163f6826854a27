// ============================================================
// Layer 3 — Core Traits (Collaborator Boundaries)
// ============================================================
// The orchestrator only ever talks to these three traits:
//
//   BatchSource   → yields (input, target) batches, rewindable
//   Model         → one forward/backward step, weight snapshots
//   ProgressSink  → receives one observation per batch
//
// Built-in implementations:
//   - CharBatcher     (Layer 4) implements BatchSource
//   - CharModel       (Layer 5) implements Model
//   - ProgressLogger  (Layer 6) implements ProgressSink
//
// Tests swap in scripted fakes for all three.

use std::time::Duration;

use anyhow::Result;

use crate::domain::error::StepError;

// ─── Batch ────────────────────────────────────────────────────────────────────
/// One training batch of token ids, stored row-major.
///
/// `inputs[r * seq_length + t]` is token `t` of row `r`;
/// `targets` has the same layout and holds the next token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub inputs:     Vec<usize>,
    pub targets:    Vec<usize>,
    pub batch_size: usize,
    pub seq_length: usize,
}

impl Batch {
    /// Iterate over `(input, target)` token pairs
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.inputs.iter().copied().zip(self.targets.iter().copied())
    }
}

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A rewindable stream of batches covering one epoch.
pub trait BatchSource {
    /// Number of batches in one full pass
    fn num_batches(&self) -> usize;

    /// Move the cursor back to the first batch
    fn reset_cursor(&mut self);

    /// Next batch, or `None` once the epoch is exhausted
    fn next_batch(&mut self) -> Option<Batch>;
}

// ─── Model ────────────────────────────────────────────────────────────────────
/// The trainable model, seen only through its narrow capabilities.
pub trait Model {
    /// Run forward + backward + update on one batch and return its loss.
    fn step(&mut self, batch: &Batch, learning_rate: f64) -> Result<f64, StepError>;

    /// Serialise all weights into an opaque blob
    fn snapshot_weights(&self) -> Result<Vec<u8>>;

    /// Replace all weights with a blob produced by `snapshot_weights`
    fn restore_weights(&mut self, blob: &[u8]) -> Result<()>;
}

// ─── ProgressSink ─────────────────────────────────────────────────────────────
/// What the orchestrator reports after every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Zero-based epoch index (restarts at 0 on resume)
    pub epoch: usize,
    /// Batch index across all epochs of this run
    pub global_batch: usize,
    /// Total number of batches this run will process
    pub total_batches: usize,
    /// Iteration counter after this batch
    pub iteration: u64,
    /// Learning rate applied to this batch
    pub learning_rate: f64,
    pub loss: f64,
    /// Wall-clock time spent on this batch
    pub elapsed: Duration,
}

/// Receives progress observations. Purely a side effect:
/// nothing it does can influence the training loop.
pub trait ProgressSink {
    fn observe(&mut self, progress: &Progress);
}

/// A sink that drops every observation.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn observe(&mut self, _progress: &Progress) {}
}
