use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout for one training run.
///
/// Default layout is `<output_root>/runs/<run_id>/...`
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a layout for `run_id` under an output root.
    #[must_use]
    pub fn for_run(output_root: &Path, run_id: &str) -> Self {
        Self::new(output_root.join("runs").join(run_id))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The "latest" slot, overwritten every epoch.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join("checkpoint.json")
    }

    /// The "best" slot, a byte copy of the latest checkpoint whenever it improved.
    #[must_use]
    pub fn best_checkpoint_path(&self) -> PathBuf {
        self.root.join("model_best.json")
    }

    #[must_use]
    pub fn scalars_path(&self) -> PathBuf {
        self.root.join("scalars.jsonl")
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
