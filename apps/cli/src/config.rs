//! Training configuration loading and merging.
//!
//! Precedence:
//! 1. CLI arguments
//! 2. `--config` TOML file (`[optimizer]`, `[distillation]`)
//! 3. Defaults

use crate::commands::types::TrainArgs;
use anyhow::{Context, Result};
use kdtrain_backend::{DistillationConfig, SgdConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub optimizer: SgdConfig,

    #[serde(default)]
    pub distillation: DistillationConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Optimizer and distillation settings after applying command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub optimizer: SgdConfig,
    pub distillation: DistillationConfig,
}

pub fn resolve(args: &TrainArgs) -> Result<ResolvedConfig> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    Ok(merge(file, args))
}

fn merge(file: FileConfig, args: &TrainArgs) -> ResolvedConfig {
    let FileConfig { mut optimizer, mut distillation } = file;

    if let Some(lr) = args.lr {
        optimizer.lr = lr;
    }
    if let Some(momentum) = args.momentum {
        optimizer.momentum = momentum;
    }
    if let Some(nesterov) = args.nesterov {
        optimizer.nesterov = nesterov;
    }
    if let Some(weight_decay) = args.weight_decay {
        optimizer.weight_decay = weight_decay;
    }

    if let Some(temperature) = args.temperature {
        distillation.temperature = temperature;
    }
    if let Some(loss_types) = &args.loss_types {
        distillation.loss_types.clone_from(loss_types);
    }
    if let Some(loss_weights) = &args.loss_weights {
        distillation.loss_weights.clone_from(loss_weights);
    }

    ResolvedConfig { optimizer, distillation }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use kdtrain_backend::LossType;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        train: TrainArgs,
    }

    fn args(extra: &[&str]) -> TrainArgs {
        let mut argv = vec!["kdtrain", "--dataset", "data"];
        argv.extend_from_slice(extra);
        Harness::parse_from(argv).train
    }

    #[test]
    fn test_defaults_without_file() {
        let resolved = resolve(&args(&[])).unwrap();
        assert_eq!(resolved.optimizer, SgdConfig::default());
        assert_eq!(resolved.distillation, DistillationConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [optimizer]
            lr = 0.1
            momentum = 0.9

            [distillation]
            temperature = 4.0
            loss_types = ["CE", "CE"]
            "#,
        )
        .unwrap();
        assert_eq!(file.optimizer.weight_decay, SgdConfig::default().weight_decay);
        assert_eq!(file.distillation.loss_weights, vec![0.5, 0.5]);

        let resolved = merge(file, &args(&["--lr", "0.05", "--loss-weights", "0.3", "0.7"]));
        assert_eq!(resolved.optimizer.lr, 0.05);
        assert_eq!(resolved.optimizer.momentum, 0.9);
        assert_eq!(resolved.distillation.temperature, 4.0);
        assert_eq!(resolved.distillation.loss_types, vec![LossType::CrossEntropy, LossType::CrossEntropy]);
        assert_eq!(resolved.distillation.loss_weights, vec![0.3, 0.7]);
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        assert!(toml::from_str::<FileConfig>("[scheduler]\nkind = 'step'\n").is_err());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = FileConfig::load(Path::new("/nonexistent/kdtrain.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
