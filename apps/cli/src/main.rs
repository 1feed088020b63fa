//! kdtrain CLI - fine-tune a student classifier with knowledge distillation
//!
//! Provides the `kdtrain-cli` command: `train` runs the epoch loop with
//! checkpointing and resumption, `synth` writes a toy dataset, and `inspect`
//! summarizes a checkpoint file.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::types::{InspectArgs, SynthArgs, TrainArgs};

/// kdtrain - knowledge-distillation training loop
#[derive(Parser, Debug)]
#[command(
    name = "kdtrain-cli",
    author,
    version,
    about = "Fine-tune a student classifier with knowledge distillation",
    long_about = "Trains a dense student network on JSONL classification data, optionally distilling from a\nteacher checkpoint, with per-epoch checkpoints, best-model tracking and resumption."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a student model
    ///
    /// Reads `<dataset>/train.jsonl` and `<dataset>/val.jsonl`, runs the
    /// train / validate / checkpoint loop and saves the final model.
    Train(Box<TrainArgs>),

    /// Write a synthetic Gaussian-blob dataset
    Synth(SynthArgs),

    /// Summarize a checkpoint file
    Inspect(InspectArgs),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Train(train_args) => commands::train::execute(*train_args),
        Command::Synth(synth_args) => commands::synth::execute(synth_args),
        Command::Inspect(inspect_args) => commands::inspect::execute(inspect_args),
    }
}
