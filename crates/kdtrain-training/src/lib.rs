//! kdtrain training core
//!
//! Backend-agnostic pieces of a distillation fine-tuning run:
//! - Collaborator contracts (`Model`, `Criterion`, `Optimizer`, `LrScheduler`,
//!   `CompressionHooks`, `BatchSource`)
//! - Metric tracking (`MetricAccumulator`, `top_k_accuracy`)
//! - Checkpointing (`CheckpointManager`, `RunLayout`)
//! - The train / validate / checkpoint loop (`TrainingOrchestrator`)

pub mod accuracy;
pub mod artifacts;
pub mod batch;
pub mod checkpoint;
pub mod epoch;
pub mod error;
pub mod hooks;
pub mod layout;
pub mod meter;
pub mod model;
pub mod options;
pub mod orchestrator;
pub mod progress;
pub mod validation;

pub use accuracy::{top1_accuracy, top_k_accuracy};
pub use artifacts::{make_artifact, sha256_file, ArtifactKind, RunManifest, TrainingArtifact};
pub use batch::{Batch, BatchIter, BatchSource, Target, VecBatchSource};
pub use checkpoint::{CheckpointManager, CheckpointRecord, SavedCheckpoint, TrainingState};
pub use epoch::{EpochStats, TrainEpochRunner, TrainingSession};
pub use error::{TrainingError, TrainingResult};
pub use hooks::{CompressionHooks, PlainTraining};
pub use layout::RunLayout;
pub use meter::{MeterSnapshot, MetricAccumulator};
pub use model::{ConstantLr, Criterion, Loss, LrScheduler, Model, Optimizer, ParamTensor, Parameter, StateDict};
pub use options::TrainingOptions;
pub use orchestrator::{update_best, EpochRecord, ResumePoint, RunOutcome, TrainingOrchestrator};
pub use progress::{FanoutProgressSink, LogProgressSink, ProgressEvent, ProgressSink, ScalarLogSink, ScalarRecord};
pub use validation::ValidationRunner;
