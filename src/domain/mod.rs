// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define what a
// training run IS, independent of how it is stored or computed.
//
// Rules for this layer:
//   - NO file I/O
//   - NO numeric model code
//   - Only plain data types, traits and the error taxonomy
//
// Everything else in the crate speaks in these terms:
//   - the orchestrator drives a `Model` over a `BatchSource`
//   - the resume validator compares `Vocabulary` values
//   - every failure surfaces as a named `TrainError`

// Closed set of recurrent cell families
pub mod model_kind;

// Character vocabulary: ordered symbols + symbol → id mapping
pub mod vocab;

// Collaborator traits: Model, BatchSource, ProgressSink
pub mod traits;

// Error taxonomy shared by every layer
pub mod error;
