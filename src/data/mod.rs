// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Turns a plain text corpus into training batches.
//
//   {data_dir}/input.txt
//       │
//       ▼
//   loader       → reads the corpus into one String
//       │
//       ▼
//   Vocabulary   → (Layer 3) char → id mapping
//       │
//       ▼
//   CharBatcher  → fixed [batch_size, seq_length] batches,
//                  implements the BatchSource trait
//
// The orchestrator never sees text, only the BatchSource trait.

/// Reads the training corpus from disk
pub mod loader;

/// Splits the encoded corpus into rewindable batches
pub mod batcher;
