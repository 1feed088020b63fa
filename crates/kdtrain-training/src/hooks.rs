//! Lifecycle callbacks for compression (distillation) libraries.

use crate::error::TrainingResult;
use crate::model::{Loss, Model};
use ndarray::ArrayView2;
use std::path::{Path, PathBuf};

/// File name used by [`CompressionHooks::save`] when a hook does not override it.
pub const MODEL_FILE: &str = "model.json";

/// Narrow capability interface the training loop calls into.
///
/// All callbacks default to no-ops. `on_after_compute_loss` is where a
/// distillation hook blends the supervised loss with a teacher term.
pub trait CompressionHooks: Send {
    fn name(&self) -> &'static str;

    fn on_epoch_begin(&mut self, _epoch: usize) {}

    fn on_step_begin(&mut self, _step: usize) {}

    fn on_after_compute_loss(
        &mut self,
        _inputs: ArrayView2<'_, f32>,
        _outputs: ArrayView2<'_, f32>,
        loss: Loss,
        _teacher_logits: Option<ArrayView2<'_, f32>>,
    ) -> TrainingResult<Loss> {
        Ok(loss)
    }

    fn on_step_end(&mut self) {}

    fn on_epoch_end(&mut self) {}

    /// Write the final model artifact(s) into `output_dir`.
    fn save(&self, model: &dyn Model, output_dir: &Path) -> TrainingResult<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(MODEL_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(&model.state())?)?;
        Ok(vec![path])
    }
}

/// Hooks for a run without distillation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTraining;

impl CompressionHooks for PlainTraining {
    fn name(&self) -> &'static str {
        "plain"
    }
}
