// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// The entry point for all user interaction. Parses arguments
// with clap and delegates to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains a model, fresh or resumed
//   2. `history` — prints the loss history of a run directory

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, HistoryArgs, TrainArgs};

use crate::application::{
    history_use_case::HistoryUseCase,
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "rnn-trainer",
    version = "0.1.0",
    about = "Train a character-level sequence model with resumable checkpoints."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::History(args) => run_history(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    match &args.init_from {
        Some(dir) => tracing::info!("Resuming from '{}', saving to '{}'", dir, args.save_dir),
        None      => tracing::info!("Training on '{}', saving to '{}'", args.data_dir, args.save_dir),
    }

    let outcome = TrainUseCase::new(args.into()).execute()?;

    match outcome.last_loss {
        Some(loss) => println!(
            "Training complete at iteration {} (last loss {:.3}, {} checkpoint(s) written).",
            outcome.final_iteration,
            loss,
            outcome.checkpoints.len()
        ),
        None => println!("Nothing was trained; iteration {}.", outcome.final_iteration),
    }
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    let report = HistoryUseCase::new(&args.dir, args.origin).execute()?;

    println!("Run directory : {}", report.dir.display());
    println!("Checkpoints   : {:?}", report.checkpoints);
    println!("Segments      : {}", report.history.segments.len());
    println!("Losses        : {}", report.total());
    if let (Some(first), Some(last), Some(mean)) =
        (report.first_loss(), report.last_loss(), report.mean_loss())
    {
        println!("First / last  : {:.4} / {:.4}", first, last);
        println!("Mean          : {:.4}", mean);
    }
    if !report.gaps.is_empty() {
        println!("Gaps          : {}", report.gaps.len());
    }
    Ok(())
}
