// ============================================================
// Layer 5 — Training Loop
// ============================================================
// The orchestrator. Owns the run state (iteration counter and
// the losses since the last checkpoint) and sequences:
//
//   for epoch e in 0..num_epochs:
//       lr = learning_rate * decay_rate^e
//       rewind the batch source
//       for each batch:
//           iteration += 1
//           loss = model.step(batch, lr)
//           record loss, report progress
//           if iteration % save_interval == 0 or last batch of run:
//               save (iteration, weights, losses) and clear losses
//
// On resume the iteration counter continues from the checkpoint,
// but the epoch index (and with it the learning-rate schedule)
// starts again at 0.

use anyhow::{Context, Result};
use std::time::Instant;

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::TrainError;
use crate::domain::traits::{BatchSource, Model, Progress, ProgressSink};
use crate::infra::checkpoint::{CheckpointRecord, CheckpointStore};

/// Learning rate for a zero-based epoch.
pub fn learning_rate_for_epoch(base: f64, decay_rate: f64, epoch: usize) -> f64 {
    base * decay_rate.powi(epoch as i32)
}

/// Whether the batch that just finished must be checkpointed.
pub fn should_checkpoint(iteration: u64, save_interval: u64, is_final_batch: bool) -> bool {
    is_final_batch || (save_interval > 0 && iteration % save_interval == 0)
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Iteration counter after the last batch
    pub final_iteration: u64,
    /// Iterations at which a checkpoint was written, in order
    pub checkpoints: Vec<u64>,
    pub last_loss: Option<f64>,
}

pub struct Trainer<'a> {
    cfg:       &'a TrainConfig,
    store:     &'a CheckpointStore,
    iteration: u64,
    /// Losses since the last checkpoint
    losses:    Vec<f64>,
}

impl<'a> Trainer<'a> {
    pub fn new(cfg: &'a TrainConfig, store: &'a CheckpointStore) -> Self {
        Self { cfg, store, iteration: 0, losses: Vec::new() }
    }

    /// Continue counting from a loaded checkpoint.
    pub fn resume_at(mut self, iteration: u64) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Run every epoch. Aborts on the first failed step; the last
    /// checkpoint written before that is left as the recovery point.
    pub fn run<S, M, P>(&mut self, source: &mut S, model: &mut M, sink: &mut P) -> Result<RunOutcome>
    where
        S: BatchSource + ?Sized,
        M: Model + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let cfg         = self.cfg;
        let num_batches = source.num_batches();
        let total       = cfg.num_epochs * num_batches;

        let mut outcome = RunOutcome {
            final_iteration: self.iteration,
            checkpoints:     Vec::new(),
            last_loss:       None,
        };

        if total == 0 {
            tracing::warn!(
                "Nothing to train: {} epochs x {} batches",
                cfg.num_epochs,
                num_batches
            );
            return Ok(outcome);
        }

        tracing::info!(
            "Training {} epochs x {} batches, starting after iteration {}",
            cfg.num_epochs,
            num_batches,
            self.iteration
        );

        for epoch in 0..cfg.num_epochs {
            let lr = learning_rate_for_epoch(cfg.learning_rate, cfg.decay_rate, epoch);
            source.reset_cursor();
            tracing::debug!("Epoch {} learning rate {:.6}", epoch, lr);

            for b in 0..num_batches {
                let batch = source
                    .next_batch()
                    .ok_or(TrainError::BatchSourceExhausted { epoch, batch: b })?;

                self.iteration += 1;
                let start = Instant::now();
                let loss = model.step(&batch, lr).map_err(|err| TrainError::StepFailure {
                    iteration: self.iteration,
                    epoch,
                    source: err,
                })?;
                let elapsed = start.elapsed();

                self.losses.push(loss);
                outcome.last_loss = Some(loss);

                sink.observe(&Progress {
                    epoch,
                    global_batch:  epoch * num_batches + b,
                    total_batches: total,
                    iteration:     self.iteration,
                    learning_rate: lr,
                    loss,
                    elapsed,
                });

                let is_final = epoch + 1 == cfg.num_epochs && b + 1 == num_batches;
                if should_checkpoint(self.iteration, cfg.save_interval, is_final) {
                    self.checkpoint(model)?;
                    outcome.checkpoints.push(self.iteration);
                }
            }
        }

        outcome.final_iteration = self.iteration;
        tracing::info!("Training complete at iteration {}", self.iteration);
        Ok(outcome)
    }

    /// Persist the current state and start a new loss segment.
    fn checkpoint<M: Model + ?Sized>(&mut self, model: &M) -> Result<()> {
        let weights = model
            .snapshot_weights()
            .with_context(|| format!("Cannot snapshot weights at iteration {}", self.iteration))?;

        let record = CheckpointRecord {
            iteration: self.iteration,
            weights,
            losses: std::mem::take(&mut self.losses),
        };
        self.store.save(&record)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::StepError;
    use crate::domain::traits::{Batch, NullSink};
    use tempfile::TempDir;

    // ── Fakes ─────────────────────────────────────────────────────────────────

    /// Yields `n` one-token batches whose input is the batch index.
    struct FakeSource {
        n:      usize,
        cursor: usize,
        resets: usize,
    }

    impl FakeSource {
        fn new(n: usize) -> Self {
            Self { n, cursor: 0, resets: 0 }
        }
    }

    impl BatchSource for FakeSource {
        fn num_batches(&self) -> usize {
            self.n
        }
        fn reset_cursor(&mut self) {
            self.cursor = 0;
            self.resets += 1;
        }
        fn next_batch(&mut self) -> Option<Batch> {
            if self.cursor >= self.n {
                return None;
            }
            self.cursor += 1;
            Some(Batch {
                inputs:     vec![self.cursor - 1],
                targets:    vec![self.cursor],
                batch_size: 1,
                seq_length: 1,
            })
        }
    }

    /// Returns scripted losses (0.5 * call number) and records every rate.
    #[derive(Default)]
    struct FakeModel {
        calls:   u64,
        rates:   Vec<f64>,
        fail_at: Option<u64>,
    }

    impl Model for FakeModel {
        fn step(&mut self, _batch: &Batch, learning_rate: f64) -> Result<f64, StepError> {
            self.calls += 1;
            if self.fail_at == Some(self.calls) {
                return Err(StepError::NonFiniteLoss(f64::NAN));
            }
            self.rates.push(learning_rate);
            Ok(self.calls as f64 * 0.5)
        }
        fn snapshot_weights(&self) -> Result<Vec<u8>> {
            Ok(self.calls.to_le_bytes().to_vec())
        }
        fn restore_weights(&mut self, blob: &[u8]) -> Result<()> {
            let bytes: [u8; 8] = blob.try_into()?;
            self.calls = u64::from_le_bytes(bytes);
            Ok(())
        }
    }

    /// Records every iteration it is told about.
    #[derive(Default)]
    struct RecordingSink {
        iterations: Vec<u64>,
    }

    impl ProgressSink for RecordingSink {
        fn observe(&mut self, p: &Progress) {
            self.iterations.push(p.iteration);
        }
    }

    fn config(num_epochs: usize, save_interval: u64) -> TrainConfig {
        TrainConfig {
            num_epochs,
            save_interval,
            learning_rate: 0.1,
            decay_rate: 0.5,
            ..TrainConfig::default()
        }
    }

    // ── Schedule ──────────────────────────────────────────────────────────────

    #[test]
    fn test_learning_rate_decays_per_epoch() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(3, 100);
        let mut model = FakeModel::default();

        Trainer::new(&cfg, &store)
            .run(&mut FakeSource::new(4), &mut model, &mut NullSink)
            .unwrap();

        assert_eq!(model.rates.len(), 12);
        for (i, lr) in model.rates.iter().enumerate() {
            let expected = 0.1 * 0.5f64.powi((i / 4) as i32);
            assert!((lr - expected).abs() < 1e-12, "batch {i}: {lr} != {expected}");
        }
    }

    #[test]
    fn test_source_rewound_every_epoch() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(3, 100);
        let mut source = FakeSource::new(4);

        Trainer::new(&cfg, &store)
            .run(&mut source, &mut FakeModel::default(), &mut NullSink)
            .unwrap();
        assert_eq!(source.resets, 3);
    }

    // ── Checkpoint cadence ────────────────────────────────────────────────────

    #[test]
    fn test_single_final_checkpoint_when_interval_is_large() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(1, 1000);

        let outcome = Trainer::new(&cfg, &store)
            .run(&mut FakeSource::new(10), &mut FakeModel::default(), &mut NullSink)
            .unwrap();

        assert_eq!(outcome.checkpoints, vec![10]);
        assert_eq!(store.checkpoints().unwrap(), vec![10]);
    }

    #[test]
    fn test_checkpoints_every_interval_across_epochs() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(3, 5);

        let outcome = Trainer::new(&cfg, &store)
            .run(&mut FakeSource::new(10), &mut FakeModel::default(), &mut NullSink)
            .unwrap();

        assert_eq!(outcome.checkpoints, vec![5, 10, 15, 20, 25, 30]);
        assert_eq!(outcome.final_iteration, 30);
    }

    #[test]
    fn test_final_batch_checkpointed_off_interval() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(2, 3);

        let outcome = Trainer::new(&cfg, &store)
            .run(&mut FakeSource::new(7), &mut FakeModel::default(), &mut NullSink)
            .unwrap();

        assert_eq!(outcome.checkpoints, vec![3, 6, 9, 12, 14]);
    }

    #[test]
    fn test_loss_segments_partition_history() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(2, 4);

        Trainer::new(&cfg, &store)
            .run(&mut FakeSource::new(5), &mut FakeModel::default(), &mut NullSink)
            .unwrap();

        let history = store.loss_history().unwrap();
        let expected: Vec<f64> = (1..=10).map(|i| i as f64 * 0.5).collect();
        assert_eq!(history.flatten(), expected);
        assert!(history.gaps(0).is_empty());
    }

    // ── Resume ────────────────────────────────────────────────────────────────

    #[test]
    fn test_resume_continues_iteration_counter() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();

        let first = config(1, 5);
        let mut model = FakeModel::default();
        Trainer::new(&first, &store)
            .run(&mut FakeSource::new(10), &mut model, &mut NullSink)
            .unwrap();

        let loaded = store.load_latest().unwrap();
        assert_eq!(loaded.iteration, 10);

        let mut resumed_model = FakeModel::default();
        resumed_model.restore_weights(&loaded.weights).unwrap();

        let second = config(2, 5);
        let mut sink = RecordingSink::default();
        let outcome = Trainer::new(&second, &store)
            .resume_at(loaded.iteration)
            .run(&mut FakeSource::new(10), &mut resumed_model, &mut sink)
            .unwrap();

        assert_eq!(sink.iterations, (11..=30).collect::<Vec<u64>>());
        assert_eq!(outcome.checkpoints, vec![15, 20, 25, 30]);

        // The learning-rate schedule restarts at epoch 0 after a resume
        assert!((resumed_model.rates[0] - 0.1).abs() < 1e-12);

        let history = store.loss_history().unwrap();
        assert_eq!(history.flatten().len(), 30);
        assert!(history.gaps(0).is_empty());
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[test]
    fn test_step_failure_aborts_and_keeps_last_checkpoint() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(1, 5);
        let mut model = FakeModel { fail_at: Some(7), ..FakeModel::default() };

        let err = Trainer::new(&cfg, &store)
            .run(&mut FakeSource::new(10), &mut model, &mut NullSink)
            .unwrap_err();

        match err.downcast_ref::<TrainError>() {
            Some(TrainError::StepFailure { iteration, epoch, .. }) => {
                assert_eq!(*iteration, 7);
                assert_eq!(*epoch, 0);
            }
            other => panic!("expected StepFailure, got {other:?}"),
        }
        assert_eq!(model.calls, 7);
        assert_eq!(store.checkpoints().unwrap(), vec![5]);
        assert_eq!(store.load_latest().unwrap().iteration, 5);
    }

    #[test]
    fn test_short_source_is_reported() {
        struct Lying(FakeSource);
        impl BatchSource for Lying {
            fn num_batches(&self) -> usize { self.0.n + 1 }
            fn reset_cursor(&mut self) { self.0.reset_cursor() }
            fn next_batch(&mut self) -> Option<Batch> { self.0.next_batch() }
        }

        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(1, 100);

        let err = Trainer::new(&cfg, &store)
            .run(&mut Lying(FakeSource::new(3)), &mut FakeModel::default(), &mut NullSink)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::BatchSourceExhausted { epoch: 0, batch: 3 })
        ));
    }

    #[test]
    fn test_empty_source_trains_nothing() {
        let dir   = TempDir::new().unwrap();
        let store = CheckpointStore::create(dir.path()).unwrap();
        let cfg   = config(3, 5);

        let outcome = Trainer::new(&cfg, &store)
            .resume_at(40)
            .run(&mut FakeSource::new(0), &mut FakeModel::default(), &mut NullSink)
            .unwrap();

        assert_eq!(outcome.final_iteration, 40);
        assert!(outcome.checkpoints.is_empty());
    }

    #[test]
    fn test_should_checkpoint_rule() {
        assert!(should_checkpoint(10, 5, false));
        assert!(!should_checkpoint(11, 5, false));
        assert!(should_checkpoint(11, 5, true));
        assert!(should_checkpoint(3, 0, true));
        assert!(!should_checkpoint(3, 0, false));
    }
}
