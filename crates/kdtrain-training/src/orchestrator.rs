//! Epoch loop: train, validate, pick the best model, checkpoint.

use crate::batch::BatchSource;
use crate::checkpoint::{CheckpointManager, CheckpointRecord, TrainingState};
use crate::epoch::{EpochStats, TrainEpochRunner, TrainingSession};
use crate::error::{TrainingError, TrainingResult};
use crate::options::TrainingOptions;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::validation::ValidationRunner;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the epoch loop starts and which score it has to beat.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub start_epoch: usize,
    pub best_score: f64,
    pub resumed_from: Option<PathBuf>,
}

impl ResumePoint {
    #[must_use]
    pub fn fresh(start_epoch: usize) -> Self {
        Self { start_epoch, best_score: 0.0, resumed_from: None }
    }
}

/// Outcome of one epoch as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub train: EpochStats,
    pub val_top1: f64,
    pub is_best: bool,
    pub best_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub state: TrainingState,
    pub history: Vec<EpochRecord>,
}

/// Returns `(is_best, new_best)` for a validation score.
pub fn update_best(best_score: f64, score: f64) -> (bool, f64) {
    (score > best_score, score.max(best_score))
}

pub struct TrainingOrchestrator<'a> {
    run_id: String,
    arch: Option<String>,
    options: TrainingOptions,
    checkpoints: CheckpointManager,
    progress: &'a dyn ProgressSink,
}

impl<'a> TrainingOrchestrator<'a> {
    pub fn new(
        run_id: impl Into<String>,
        options: TrainingOptions,
        checkpoints: CheckpointManager,
        progress: &'a dyn ProgressSink,
    ) -> TrainingResult<Self> {
        options.validate()?;
        Ok(Self { run_id: run_id.into(), arch: None, options, checkpoints, progress })
    }

    /// Record the architecture name in every checkpoint written.
    #[must_use]
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    #[must_use]
    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    #[must_use]
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Seed the start epoch and best score from `path`, restoring weights into the session.
    ///
    /// A path that does not exist only warns; training then starts from scratch.
    pub fn resume(&self, path: Option<&Path>, session: &mut TrainingSession<'_>) -> TrainingResult<ResumePoint> {
        let fresh = ResumePoint::fresh(self.options.start_epoch);
        let Some(path) = path else {
            return Ok(fresh);
        };

        let record = match CheckpointManager::load(path) {
            Ok(record) => record,
            Err(TrainingError::NotFound(_)) => {
                warn!("=> no checkpoint found at '{}'", path.display());
                return Ok(fresh);
            }
            Err(e) => return Err(e),
        };

        info!("=> loading checkpoint '{}'", path.display());
        session.model.load_state(&record.state_dict)?;
        if let Some(optimizer_state) = &record.optimizer {
            session.optimizer.load_state(optimizer_state)?;
        }
        info!("=> loaded checkpoint '{}' (epoch {})", path.display(), record.epoch);

        Ok(ResumePoint {
            start_epoch: record.epoch,
            best_score: record.best_prec1,
            resumed_from: Some(path.to_path_buf()),
        })
    }

    pub fn run(
        &self,
        session: &mut TrainingSession<'_>,
        train_data: &mut dyn BatchSource,
        val_data: &mut dyn BatchSource,
        start: &ResumePoint,
    ) -> TrainingResult<RunOutcome> {
        let trainer = TrainEpochRunner::new(self.options.print_freq, self.progress);
        let validator = ValidationRunner::new(self.options.print_freq, self.progress);

        let mut state = TrainingState {
            epoch: start.start_epoch,
            best_score: start.best_score,
            model_state: session.model.state(),
            optimizer_state: Some(session.optimizer.state()),
        };
        let mut history = Vec::new();

        self.progress.on_event(&ProgressEvent::RunStarted {
            run_id: self.run_id.clone(),
            start_epoch: start.start_epoch,
            epochs: self.options.epochs,
            best_score: start.best_score,
        });

        for epoch in start.start_epoch..self.options.epochs {
            session.hooks.on_epoch_begin(epoch);
            let train = trainer.run(session, train_data, epoch)?;
            session.hooks.on_epoch_end();

            let val_top1 = validator.run(&mut *session.model, val_data, epoch)?;
            let (is_best, best_score) = update_best(state.best_score, val_top1);

            state = TrainingState {
                epoch: epoch + 1,
                best_score,
                model_state: session.model.state(),
                optimizer_state: Some(session.optimizer.state()),
            };
            let saved = self
                .checkpoints
                .save(&CheckpointRecord::from_state(&state, self.arch.as_deref()), is_best)?;

            self.progress.on_event(&ProgressEvent::EpochFinished {
                epoch,
                train_loss: train.loss,
                train_top1: train.top1,
                learning_rate: train.learning_rate,
                val_top1,
                is_best,
                best_score,
            });
            self.progress.on_event(&ProgressEvent::CheckpointSaved { epoch, path: saved.latest, is_best });

            history.push(EpochRecord { train, val_top1, is_best, best_score });
        }

        self.progress.on_event(&ProgressEvent::RunFinished {
            run_id: self.run_id.clone(),
            best_score: state.best_score,
        });

        Ok(RunOutcome { state, history })
    }
}
