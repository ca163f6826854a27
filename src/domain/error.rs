// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure that stops a run has its own variant so the
// operator is told WHICH artifact or field was the problem.
//
//   Before training:  MissingArtifact, CorruptArtifact,
//                     NoCheckpoint, ConfigMismatch,
//                     VocabularyMismatch, InvalidConfig,
//                     EmptyCorpus
//   During training:  StepFailure, BatchSourceExhausted
//
// None of these are retried. The application layer carries
// them inside anyhow::Error, so callers can still downcast.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::vocab::VocabMismatch;

/// Failures of the training / resume core.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("{artifact} is missing: '{}'", path.display())]
    MissingArtifact {
        artifact: &'static str,
        path:     PathBuf,
    },

    #[error("{artifact} at '{}' cannot be parsed: {reason}", path.display())]
    CorruptArtifact {
        artifact: &'static str,
        path:     PathBuf,
        reason:   String,
    },

    #[error("no checkpoint found in '{}'", dir.display())]
    NoCheckpoint { dir: PathBuf },

    #[error("command line argument and saved model disagree on '{field}' (saved: {saved}, requested: {requested})")]
    ConfigMismatch {
        field:     &'static str,
        saved:     String,
        requested: String,
    },

    #[error("{}", vocab_message(.0))]
    VocabularyMismatch(VocabMismatch),

    #[error("invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        field:  &'static str,
        reason: String,
    },

    #[error("corpus is too small to form a single batch of {batch_size}x{seq_length}")]
    EmptyCorpus {
        batch_size: usize,
        seq_length: usize,
    },

    #[error("model step failed at iteration {iteration} (epoch {epoch})")]
    StepFailure {
        iteration: u64,
        epoch:     usize,
        #[source]
        source:    StepError,
    },

    #[error("batch source ran dry at batch {batch} of epoch {epoch}")]
    BatchSourceExhausted { epoch: usize, batch: usize },
}

fn vocab_message(kind: &VocabMismatch) -> &'static str {
    match kind {
        VocabMismatch::SymbolSet    => "data and loaded model disagree on character set",
        VocabMismatch::IdAssignment => "data and loaded model disagree on dictionary mappings",
    }
}

/// Failures raised by a model while computing one step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StepError {
    #[error("loss is not finite ({0})")]
    NonFiniteLoss(f64),

    #[error("token id {id} is outside the vocabulary of {vocab_size}")]
    TokenOutOfRange { id: usize, vocab_size: usize },

    #[error("input has {inputs} tokens but target has {targets}")]
    ShapeMismatch { inputs: usize, targets: usize },

    #[error("batch contains no tokens")]
    EmptyBatch,
}
