// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `history`
// and all their configurable flags.

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::model_kind::ModelKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a character model, optionally resuming a previous run
    Train(TrainArgs),

    /// Summarise the recorded losses of a run directory
    History(HistoryArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing input.txt
    #[arg(long, default_value = "data/tinyshakespeare")]
    pub data_dir: String,

    /// Directory to store checkpoints, config and vocabulary
    #[arg(long, default_value = "save")]
    pub save_dir: String,

    /// Recurrent cell type
    #[arg(long = "model", value_enum, default_value_t = ModelKind::Lstm)]
    pub model_kind: ModelKind,

    /// Size of the hidden state
    #[arg(long, default_value_t = 128)]
    pub hidden_size: usize,

    /// Number of stacked layers
    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Characters per training sequence
    #[arg(long, default_value_t = 50)]
    pub seq_length: usize,

    #[arg(long, default_value_t = 50)]
    pub num_epochs: usize,

    /// Checkpoint every N iterations (the last batch is always saved)
    #[arg(long = "save-every", default_value_t = 1000)]
    pub save_interval: u64,

    /// Clip gradients to this global norm
    #[arg(long = "grad-clip", default_value_t = 5.0)]
    pub gradient_clip: f64,

    #[arg(long, default_value_t = 0.002)]
    pub learning_rate: f64,

    /// Learning rate multiplier applied once per epoch
    #[arg(long, default_value_t = 0.97)]
    pub decay_rate: f64,

    /// Continue training from the run saved in this directory.
    /// It must contain config.json, chars_vocab.json,
    /// iterations.json, checkpoint.json and the weight files.
    #[arg(long)]
    pub init_from: Option<String>,

    /// Resume from this checkpoint instead of the latest one
    #[arg(long, requires = "init_from")]
    pub init_iteration: Option<u64>,

    /// Seed for weight initialisation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            save_dir:       a.save_dir,
            model_kind:     a.model_kind,
            hidden_size:    a.hidden_size,
            num_layers:     a.num_layers,
            vocab_size:     0,
            batch_size:     a.batch_size,
            seq_length:     a.seq_length,
            num_epochs:     a.num_epochs,
            save_interval:  a.save_interval,
            gradient_clip:  a.gradient_clip,
            learning_rate:  a.learning_rate,
            decay_rate:     a.decay_rate,
            init_from:      a.init_from,
            init_iteration: a.init_iteration,
            seed:           a.seed,
        }
    }
}

/// All arguments for the `history` command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Run directory to inspect
    #[arg(long, default_value = "save")]
    pub dir: String,

    /// Iteration the oldest loss segment starts after
    #[arg(long, default_value_t = 0)]
    pub origin: u64,
}
