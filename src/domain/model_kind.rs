// ============================================================
// Layer 3 — ModelKind
// ============================================================
// The model family selector. A resumed run must use the same
// family as the run that produced its checkpoint, so this is one
// of the three fields compared by the resume validator.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Recurrent cell family used by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Plain Elman recurrent cell
    Rnn,
    /// Gated recurrent unit
    Gru,
    /// Long short-term memory
    Lstm,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Rnn  => "rnn",
            ModelKind::Gru  => "gru",
            ModelKind::Lstm => "lstm",
        };
        f.write_str(name)
    }
}
