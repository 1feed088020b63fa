//! Durable snapshots of training progress.
//!
//! Each save overwrites the run's "latest" slot. When the epoch produced a new
//! best validation score the freshly written file is also copied, byte for
//! byte, into the "best" slot.

use crate::error::{TrainingError, TrainingResult};
use crate::layout::RunLayout;
use crate::model::StateDict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything needed to continue a run. `epoch` is the next epoch to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub epoch: usize,
    pub best_score: f64,
    pub model_state: StateDict,
    pub optimizer_state: Option<StateDict>,
}

/// On-disk checkpoint format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub epoch: usize,
    pub state_dict: StateDict,
    pub best_prec1: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<StateDict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl CheckpointRecord {
    #[must_use]
    pub fn from_state(state: &TrainingState, arch: Option<&str>) -> Self {
        Self {
            epoch: state.epoch,
            state_dict: state.model_state.clone(),
            best_prec1: state.best_score,
            optimizer: state.optimizer_state.clone(),
            arch: arch.map(str::to_string),
            saved_at: Some(Utc::now()),
        }
    }

    #[must_use]
    pub fn into_state(self) -> TrainingState {
        TrainingState {
            epoch: self.epoch,
            best_score: self.best_prec1,
            model_state: self.state_dict,
            optimizer_state: self.optimizer,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.state_dict.values().map(|t| t.values.len()).sum()
    }
}

/// Paths touched by one [`CheckpointManager::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCheckpoint {
    pub latest: PathBuf,
    pub best: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    layout: RunLayout,
}

impl CheckpointManager {
    #[must_use]
    pub fn new(layout: RunLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn save(&self, record: &CheckpointRecord, is_best: bool) -> TrainingResult<SavedCheckpoint> {
        self.layout.ensure_dirs()?;

        let latest = self.layout.checkpoint_path();
        std::fs::write(&latest, serde_json::to_vec_pretty(record)?)?;
        debug!(path = %latest.display(), epoch = record.epoch, "checkpoint written");

        let best = if is_best {
            let best = self.layout.best_checkpoint_path();
            std::fs::copy(&latest, &best)?;
            debug!(path = %best.display(), best_prec1 = record.best_prec1, "best checkpoint updated");
            Some(best)
        } else {
            None
        };

        Ok(SavedCheckpoint { latest, best })
    }

    pub fn load(path: &Path) -> TrainingResult<CheckpointRecord> {
        if !path.is_file() {
            return Err(TrainingError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| TrainingError::Checkpoint(format!("failed to parse {}: {e}", path.display())))
    }
}
