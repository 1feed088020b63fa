//! Argument types for the kdtrain CLI commands.

use clap::Args;
use kdtrain_backend::{Architecture, LossType};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Dataset directory holding train.jsonl and val.jsonl
    #[arg(long)]
    pub dataset: PathBuf,

    /// Student architecture (linear, mlp-small, mlp-large)
    #[arg(long = "arch", alias = "topology", default_value = "mlp-small")]
    pub arch: Architecture,

    /// Teacher architecture
    #[arg(long, default_value = "mlp-large")]
    pub teacher: Architecture,

    /// Checkpoint holding the trained teacher weights
    #[arg(long)]
    pub teacher_checkpoint: Option<PathBuf>,

    /// Distill from the teacher while training
    #[arg(long)]
    pub distillation: bool,

    /// Mini-batch size
    #[arg(short = 'b', long, default_value_t = 128)]
    pub batch_size: usize,

    /// Background batch-assembly workers (0 assembles inline)
    #[arg(short = 'j', long, default_value_t = 4)]
    pub workers: usize,

    /// Number of total epochs to run
    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Manual epoch number (useful on restarts)
    #[arg(long, default_value_t = 0)]
    pub start_epoch: usize,

    /// Initial learning rate [default: 0.001]
    #[arg(long, alias = "learning-rate")]
    pub lr: Option<f64>,

    /// Momentum [default: 0.1]
    #[arg(long)]
    pub momentum: Option<f64>,

    /// Nesterov momentum [default: true]
    #[arg(long)]
    pub nesterov: Option<bool>,

    /// Weight decay [default: 0.001]
    #[arg(long, alias = "wd")]
    pub weight_decay: Option<f64>,

    /// Print frequency in batches
    #[arg(short = 'p', long, default_value_t = 10)]
    pub print_freq: usize,

    /// Path to the latest checkpoint to resume from
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Distillation temperature [default: 1.0]
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Student and teacher-student loss types [default: CE KL]
    #[arg(long, num_args = 2)]
    pub loss_types: Option<Vec<LossType>>,

    /// Student and teacher-student loss weights, summing to 1.0 [default: 0.5 0.5]
    #[arg(long, num_args = 2)]
    pub loss_weights: Option<Vec<f32>>,

    /// Directory for the final saved model
    #[arg(long, default_value = "saved_results")]
    pub output_model: PathBuf,

    /// Root under which runs/<run-id>/ checkpoints are written
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Run name (defaults to the student architecture)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Seed for weight initialization and shuffling
    #[arg(long, default_value_t = 5143)]
    pub seed: u64,

    /// Log per-epoch scalars to runs/<run-id>/scalars.jsonl
    #[arg(long, alias = "tensorboard")]
    pub scalars: bool,

    /// TOML file with [optimizer] and [distillation] sections
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SynthArgs {
    /// Output directory for train.jsonl and val.jsonl
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub classes: usize,

    #[arg(long, default_value_t = 8)]
    pub features: usize,

    #[arg(long, default_value_t = 128)]
    pub train_per_class: usize,

    #[arg(long, default_value_t = 32)]
    pub val_per_class: usize,

    /// Standard deviation of samples around their class centre
    #[arg(long, default_value_t = 1.0)]
    pub spread: f32,

    #[arg(long, default_value_t = 5143)]
    pub seed: u64,

    /// Attach teacher logits computed by this checkpoint to every record
    #[arg(long)]
    pub teacher_checkpoint: Option<PathBuf>,

    /// Architecture of --teacher-checkpoint
    #[arg(long, default_value = "mlp-large")]
    pub teacher: Architecture,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Checkpoint file (checkpoint.json or model_best.json)
    pub checkpoint: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
