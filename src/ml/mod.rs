// ============================================================
// Layer 5 — ML Layer
// ============================================================
// The numeric side of a run and the loop that drives it.
//
//   trainer.rs — the training orchestrator: epochs, batches,
//                learning-rate decay, checkpoint cadence, resume
//                continuation. Knows the model only through the
//                Model trait, so it is tested with scripted fakes.
//
//   model.rs   — CharModel, the built-in Model: a factorised
//                bigram cell with clipped SGD and a self-describing
//                weight blob.

/// Training loop with checkpointing and resume support
pub mod trainer;

/// Built-in character model
pub mod model;
