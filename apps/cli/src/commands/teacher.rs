//! Loading a trained teacher network from a checkpoint.

use anyhow::{Context, Result, bail};
use kdtrain_backend::{Architecture, Mlp};
use kdtrain_training::{CheckpointManager, Model};
use rand::Rng;
use std::path::Path;

/// Rebuild `arch` and load the checkpoint's weights into it.
///
/// Checkpoints that record an architecture must match `arch`.
pub fn load_teacher<R: Rng + ?Sized>(
    arch: Architecture,
    path: &Path,
    features: usize,
    classes: usize,
    rng: &mut R,
) -> Result<Mlp> {
    let record = CheckpointManager::load(path)
        .with_context(|| format!("Failed to load teacher checkpoint: {}", path.display()))?;
    if let Some(saved_arch) = record.arch.as_deref() {
        if saved_arch != arch.as_str() {
            bail!("teacher checkpoint was trained as '{saved_arch}', not '{arch}' (pass --teacher {saved_arch})");
        }
    }
    let mut teacher = Mlp::new(arch, features, classes, rng)?;
    teacher
        .load_state(&record.state_dict)
        .with_context(|| format!("Teacher checkpoint does not fit {arch} with {features} features and {classes} classes"))?;
    Ok(teacher)
}
