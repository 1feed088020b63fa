//! Gaussian-blob classification data for smoke runs and tests.

use crate::dataset::Record;
use kdtrain_training::{TrainingError, TrainingResult};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobSpec {
    pub classes: usize,
    pub features: usize,
    pub train_per_class: usize,
    pub val_per_class: usize,
    /// Standard deviation of points around their class centre.
    pub spread: f32,
    pub seed: u64,
}

impl Default for BlobSpec {
    fn default() -> Self {
        Self { classes: 4, features: 8, train_per_class: 128, val_per_class: 32, spread: 1.0, seed: 5143 }
    }
}

#[derive(Debug, Clone)]
pub struct BlobSplits {
    pub train: Vec<Record>,
    pub val: Vec<Record>,
}

/// One centre per class drawn from N(0, 3²), points drawn around it from N(0, spread²).
pub fn generate_blobs(spec: &BlobSpec) -> TrainingResult<BlobSplits> {
    if spec.classes < 2 || spec.features == 0 {
        return Err(TrainingError::InvalidConfig("blobs need >= 2 classes and >= 1 feature".to_string()));
    }
    if spec.train_per_class == 0 || spec.val_per_class == 0 {
        return Err(TrainingError::InvalidConfig("blobs need >= 1 sample per class in each split".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let centre_dist = Normal::new(0.0_f32, 3.0).map_err(|e| TrainingError::InvalidConfig(e.to_string()))?;
    let noise = Normal::new(0.0_f32, spec.spread).map_err(|e| TrainingError::InvalidConfig(e.to_string()))?;

    let centres: Vec<Vec<f32>> = (0..spec.classes)
        .map(|_| (0..spec.features).map(|_| centre_dist.sample(&mut rng)).collect())
        .collect();

    let mut draw = |per_class: usize| {
        let mut records = Vec::with_capacity(per_class * spec.classes);
        for (label, centre) in centres.iter().enumerate() {
            for _ in 0..per_class {
                let features = centre.iter().map(|c| c + noise.sample(&mut rng)).collect();
                records.push(Record { features, label, teacher_logits: None });
            }
        }
        records.shuffle(&mut rng);
        records
    };

    let train = draw(spec.train_per_class);
    let val = draw(spec.val_per_class);
    Ok(BlobSplits { train, val })
}
