use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "run_manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Model,
    LatestCheckpoint,
    BestCheckpoint,
    Scalars,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

/// Summary written next to the exported model once a run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub arch: String,
    #[serde(default)]
    pub teacher_arch: Option<String>,
    pub compression: String,
    pub epochs_completed: usize,
    pub best_prec1: f64,
    pub artifacts: Vec<TrainingArtifact>,
}

impl RunManifest {
    pub fn write(&self, output_dir: &Path) -> TrainingResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }

    pub fn read(path: &Path) -> TrainingResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(kind: ArtifactKind, path: PathBuf) -> TrainingResult<TrainingArtifact> {
    if !path.exists() {
        return Err(TrainingError::NotFound(path));
    }

    let hash = sha256_file(&path)?;
    Ok(TrainingArtifact { kind, path, sha256: hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_make_artifact_hashes_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.json");
        std::fs::write(&path, b"abc").unwrap();

        let artifact = make_artifact(ArtifactKind::Model, path).unwrap();
        assert_eq!(
            artifact.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_make_artifact_missing_path() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        let err = make_artifact(ArtifactKind::Scalars, missing.clone()).unwrap_err();
        assert!(matches!(err, TrainingError::NotFound(ref p) if *p == missing));
    }

    #[test]
    fn test_manifest_round_trip() {
        let temp = TempDir::new().unwrap();
        let manifest = RunManifest {
            run_id: "mlp-small".to_string(),
            created_at: Utc::now(),
            arch: "mlp-small".to_string(),
            teacher_arch: Some("mlp-large".to_string()),
            compression: "distillation".to_string(),
            epochs_completed: 3,
            best_prec1: 87.5,
            artifacts: vec![],
        };
        let path = manifest.write(temp.path()).unwrap();
        let read = RunManifest::read(&path).unwrap();
        assert_eq!(read.run_id, manifest.run_id);
        assert_eq!(read.best_prec1, 87.5);
        assert_eq!(read.teacher_arch.as_deref(), Some("mlp-large"));
    }
}
