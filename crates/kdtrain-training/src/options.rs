use crate::error::{TrainingError, TrainingResult};

/// Epoch range and logging cadence for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingOptions {
    /// Total number of epochs; the loop runs `start_epoch..epochs`.
    pub epochs: usize,
    /// First epoch to run when not resuming from a checkpoint.
    pub start_epoch: usize,
    /// Emit a progress line every N batches (and on the first).
    pub print_freq: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self { epochs: 100, start_epoch: 0, print_freq: 10 }
    }
}

impl TrainingOptions {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidConfig("epochs must be >= 1".to_string()));
        }
        if self.print_freq == 0 {
            return Err(TrainingError::InvalidConfig("print_freq must be >= 1".to_string()));
        }
        if self.start_epoch > self.epochs {
            return Err(TrainingError::InvalidConfig(format!(
                "start_epoch {} is past the last epoch {}",
                self.start_epoch, self.epochs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        TrainingOptions::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_epochs = TrainingOptions { epochs: 0, ..TrainingOptions::default() };
        assert!(zero_epochs.validate().is_err());

        let zero_freq = TrainingOptions { print_freq: 0, ..TrainingOptions::default() };
        assert!(zero_freq.validate().is_err());

        let late_start = TrainingOptions { epochs: 3, start_epoch: 4, print_freq: 1 };
        assert!(late_start.validate().is_err());
    }
}
