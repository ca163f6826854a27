// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Validate the requested config      (this layer)
//   Step 2: Load the corpus                    (Layer 4 - data)
//   Step 3: Build the vocabulary               (Layer 3 - domain)
//   Step 4: Build the batcher                  (Layer 4 - data)
//   Step 5: Validate the resume directory      (Layer 6 - infra)
//   Step 6: Save config + vocabulary           (Layer 6 - infra)
//   Step 7: Build the model, restore weights   (Layer 5 - ml)
//   Step 8: Run the training loop              (Layer 5 - ml)
//
// Steps 1-5 can only fail; nothing is written until they pass.
// In particular no weights are loaded before the resume
// directory has been fully validated.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{batcher::CharBatcher, loader::CorpusLoader};
use crate::domain::error::TrainError;
use crate::domain::model_kind::ModelKind;
use crate::domain::traits::Model;
use crate::domain::vocab::Vocabulary;
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::ProgressLogger,
    resume::{ResumeHandle, ResumeValidator},
};
use crate::ml::{
    model::CharModel,
    trainer::{RunOutcome, Trainer},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// The run's configuration snapshot. Serialised to config.json
// before the first step and compared against on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub save_dir:       String,
    pub model_kind:     ModelKind,
    pub hidden_size:    usize,
    pub num_layers:     usize,
    /// Derived from the corpus, never from the command line
    pub vocab_size:     usize,
    pub batch_size:     usize,
    pub seq_length:     usize,
    pub num_epochs:     usize,
    pub save_interval:  u64,
    pub gradient_clip:  f64,
    pub learning_rate:  f64,
    pub decay_rate:     f64,
    pub init_from:      Option<String>,
    pub init_iteration: Option<u64>,
    pub seed:           u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/tinyshakespeare".to_string(),
            save_dir:       "save".to_string(),
            model_kind:     ModelKind::Lstm,
            hidden_size:    128,
            num_layers:     2,
            vocab_size:     0,
            batch_size:     64,
            seq_length:     50,
            num_epochs:     50,
            save_interval:  1000,
            gradient_clip:  5.0,
            learning_rate:  0.002,
            decay_rate:     0.97,
            init_from:      None,
            init_iteration: None,
            seed:           42,
        }
    }
}

impl TrainConfig {
    /// Reject values the training loop cannot work with.
    pub fn validate(&self) -> Result<(), TrainError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> TrainError {
            TrainError::InvalidConfig { field, reason: reason.into() }
        }

        let positive = [
            ("hidden_size", self.hidden_size),
            ("num_layers",  self.num_layers),
            ("batch_size",  self.batch_size),
            ("seq_length",  self.seq_length),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be positive"));
            }
        }
        if self.save_interval == 0 {
            return Err(invalid("save_interval", "must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", format!("{} is not a positive number", self.learning_rate)));
        }
        if !(self.gradient_clip.is_finite() && self.gradient_clip > 0.0) {
            return Err(invalid("gradient_clip", format!("{} is not a positive number", self.gradient_clip)));
        }
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(invalid("decay_rate", format!("{} is outside (0, 1]", self.decay_rate)));
        }
        if self.init_iteration.is_some() && self.init_from.is_none() {
            return Err(invalid("init_iteration", "requires init_from"));
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<RunOutcome> {
        // ── Step 1: Validate the requested config ─────────────────────────────
        let mut cfg = self.config.clone();
        cfg.validate()?;

        // ── Steps 2-4: Corpus → vocabulary → batches ──────────────────────────
        let text  = CorpusLoader::new(&cfg.data_dir).load()?;
        let vocab = Vocabulary::from_corpus(&text);
        cfg.vocab_size = vocab.len();
        tracing::info!("Vocabulary has {} symbols", cfg.vocab_size);

        let mut batcher = CharBatcher::new(&vocab.encode(&text), cfg.batch_size, cfg.seq_length)?;

        // ── Step 5: Validate the resume directory ─────────────────────────────
        // Runs to completion before anything is written or loaded.
        let handle = match &cfg.init_from {
            Some(dir) => Some(ResumeValidator::new(dir).validate(&cfg, &vocab)?),
            None      => None,
        };
        let in_place = match &handle {
            Some(h) => same_directory(h.dir(), Path::new(&cfg.save_dir))?,
            None    => false,
        };
        if let Some(h) = &handle {
            check_branch_point(h, cfg.init_iteration, in_place)?;
        }

        // ── Step 6: Save config + vocabulary ──────────────────────────────────
        // Kept as-is when resuming in place: the snapshot belongs
        // to the run that created the directory.
        let store = CheckpointStore::create(&cfg.save_dir)?;
        if in_place {
            tracing::info!("Resuming in place; keeping existing config snapshot and vocabulary");
        } else {
            store.save_config(&cfg)?;
            store.save_vocabulary(&vocab)?;
        }

        // ── Step 7: Build the model, restore weights ──────────────────────────
        let mut model = CharModel::from_config(&cfg);
        let start_iteration = match &handle {
            Some(h) => restore(h, cfg.init_iteration, &mut model)?,
            None    => 0,
        };

        // ── Step 8: Run the training loop ─────────────────────────────────────
        let mut sink = ProgressLogger::new(store.dir())?;
        Trainer::new(&cfg, &store)
            .resume_at(start_iteration)
            .run(&mut batcher, &mut model, &mut sink)
    }
}

/// Load the selected checkpoint into the model, returning its iteration.
fn restore<M: Model>(handle: &ResumeHandle, at: Option<u64>, model: &mut M) -> Result<u64> {
    let loaded = handle.load(at)?;
    model.restore_weights(&loaded.weights).with_context(|| {
        format!("Cannot restore weights of iteration {} from '{}'", loaded.iteration, handle.dir().display())
    })?;
    tracing::info!(
        "Resumed from iteration {}; the epoch schedule restarts at epoch 0",
        loaded.iteration
    );
    Ok(loaded.iteration)
}

/// An in-place resume continues from the latest checkpoint. Branching
/// from an older one needs a different save_dir.
fn check_branch_point(handle: &ResumeHandle, at: Option<u64>, in_place: bool) -> Result<(), TrainError> {
    let selected = handle.select(at)?;
    if in_place && selected != handle.latest() {
        return Err(TrainError::InvalidConfig {
            field:  "init_iteration",
            reason: format!(
                "checkpoint {} is older than the latest ({}) in '{}'; \
                 resume from it into a different save_dir",
                selected,
                handle.latest(),
                handle.dir().display()
            ),
        });
    }
    Ok(())
}

/// `b` may not exist yet, in which case it is a different directory.
fn same_directory(a: &Path, b: &Path) -> Result<bool> {
    if !b.exists() {
        return Ok(false);
    }
    let a = fs::canonicalize(a).with_context(|| format!("Cannot resolve '{}'", a.display()))?;
    let b = fs::canonicalize(b).with_context(|| format!("Cannot resolve '{}'", b.display()))?;
    Ok(a == b)
}
