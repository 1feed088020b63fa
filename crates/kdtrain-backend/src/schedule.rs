use kdtrain_training::{LrScheduler, Optimizer, TrainingError, TrainingResult};
use std::f64::consts::PI;

/// Cosine annealing from `base_lr` down to zero over `t_max` scheduler steps.
///
/// Stepped once per batch, so `t_max` is usually `batches_per_epoch * epochs`.
#[derive(Debug, Clone)]
pub struct CosineAnnealingLr {
    base_lr: f64,
    t_max: usize,
    last_step: usize,
    last_lr: f64,
}

impl CosineAnnealingLr {
    pub fn new(base_lr: f64, t_max: usize) -> TrainingResult<Self> {
        if t_max == 0 {
            return Err(TrainingError::InvalidConfig("cosine schedule needs t_max >= 1".to_string()));
        }
        Ok(Self { base_lr, t_max, last_step: 0, last_lr: base_lr })
    }

    pub fn lr_at(&self, step: usize) -> f64 {
        let progress = step as f64 / self.t_max as f64;
        self.base_lr * (1.0 + (PI * progress).cos()) / 2.0
    }

    /// Jump to `step` (e.g. after resuming) and push that step's rate into `optimizer`.
    pub fn fast_forward(&mut self, step: usize, optimizer: &mut dyn Optimizer) {
        self.last_step = step;
        self.last_lr = self.lr_at(step);
        optimizer.set_learning_rate(self.last_lr);
    }

    pub fn last_step(&self) -> usize {
        self.last_step
    }
}

impl LrScheduler for CosineAnnealingLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.last_step += 1;
        self.last_lr = self.lr_at(self.last_step);
        optimizer.set_learning_rate(self.last_lr);
    }

    fn last_lr(&self) -> f64 {
        self.last_lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sgd::{Sgd, SgdConfig};

    #[test]
    fn test_endpoints_and_midpoint() {
        let schedule = CosineAnnealingLr::new(0.1, 10).unwrap();
        assert!((schedule.lr_at(0) - 0.1).abs() < 1e-12);
        assert!((schedule.lr_at(5) - 0.05).abs() < 1e-12);
        assert!(schedule.lr_at(10).abs() < 1e-12);
    }

    #[test]
    fn test_step_updates_optimizer() {
        let mut sgd = Sgd::new(SgdConfig { lr: 0.1, ..SgdConfig::default() }).unwrap();
        let mut schedule = CosineAnnealingLr::new(0.1, 4).unwrap();
        let mut rates = Vec::new();
        for _ in 0..4 {
            schedule.step(&mut sgd);
            rates.push(sgd.learning_rate());
        }
        assert!(rates.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(schedule.last_lr(), sgd.learning_rate());
        assert_eq!(schedule.last_step(), 4);
    }

    #[test]
    fn test_fast_forward_matches_stepping() {
        let mut sgd = Sgd::new(SgdConfig::default()).unwrap();
        let mut stepped = CosineAnnealingLr::new(0.001, 100).unwrap();
        for _ in 0..30 {
            stepped.step(&mut sgd);
        }
        let mut jumped = CosineAnnealingLr::new(0.001, 100).unwrap();
        jumped.fast_forward(30, &mut sgd);
        assert!((jumped.last_lr() - stepped.last_lr()).abs() < 1e-15);
        assert!((sgd.learning_rate() - stepped.last_lr()).abs() < 1e-15);
    }

    #[test]
    fn test_zero_horizon_is_rejected() {
        assert!(CosineAnnealingLr::new(0.1, 0).is_err());
    }
}
