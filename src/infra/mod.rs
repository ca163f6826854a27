// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the artifact directory:
//
//   artifacts.rs  — file names inside a run directory and the
//                   temp-file + rename write used for all of them
//
//   checkpoint.rs — CheckpointStore: writes config, vocabulary
//                   and checkpoints; loads weights by iteration;
//                   reads back the loss history
//
//   resume.rs     — ResumeValidator: checks that a previous run's
//                   directory is complete and compatible before
//                   any weight is loaded
//
//   metrics.rs    — ProgressLogger: per-batch tracing events and
//                   a progress.csv file
//
// The domain and ML layers never open files themselves.

/// Artifact file names and atomic writes
pub mod artifacts;

/// Checkpoint saving and loading
pub mod checkpoint;

/// Resume compatibility checks
pub mod resume;

/// Per-batch progress logging
pub mod metrics;
