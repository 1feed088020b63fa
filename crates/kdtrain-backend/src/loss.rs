//! Softmax helpers and the supervised cross-entropy criterion.

use kdtrain_training::{Criterion, Loss, TrainingError, TrainingResult};
use ndarray::{Array2, ArrayView2};

/// Row-wise log-softmax, shifted by the row max for stability.
pub fn log_softmax(logits: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum = row.fold(0.0_f32, |acc, &v| acc + (v - max).exp()).ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

pub fn softmax(logits: ArrayView2<'_, f32>) -> Array2<f32> {
    log_softmax(logits).mapv(f32::exp)
}

/// Mean cross-entropy over the batch against integer class labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropy;

impl Criterion for CrossEntropy {
    fn compute(&self, logits: ArrayView2<'_, f32>, labels: &[usize]) -> TrainingResult<Loss> {
        let (rows, classes) = logits.dim();
        if rows == 0 {
            return Err(TrainingError::EmptyBatch);
        }
        if labels.len() != rows {
            return Err(TrainingError::Shape(format!("{} labels for {} rows of logits", labels.len(), rows)));
        }

        let log_probs = log_softmax(logits);
        let mut grad = log_probs.mapv(f32::exp);
        let mut total = 0.0_f32;
        for (row, &label) in labels.iter().enumerate() {
            if label >= classes {
                return Err(TrainingError::Shape(format!("label {label} out of range for {classes} classes")));
            }
            total -= log_probs[[row, label]];
            grad[[row, label]] -= 1.0;
        }

        let n = rows as f32;
        grad /= n;
        Ok(Loss { value: total / n, grad })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let probs = softmax(array![[1.0_f32, 2.0, 3.0], [1000.0, 1000.0, 1000.0]].view());
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((probs[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_logits_give_log_classes() {
        let loss = CrossEntropy.compute(Array2::zeros((2, 4)).view(), &[0, 3]).unwrap();
        assert!((loss.value - 4.0_f32.ln()).abs() < 1e-6);
        assert!((loss.grad[[0, 0]] - (0.25 - 1.0) / 2.0).abs() < 1e-6);
        assert!((loss.grad[[0, 1]] - 0.25 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let logits = array![[0.3_f32, -1.2, 0.8], [2.0, 0.1, -0.5]];
        let labels = [2, 0];
        let loss = CrossEntropy.compute(logits.view(), &labels).unwrap();

        let eps = 1e-3;
        for (i, j) in [(0, 0), (0, 2), (1, 1)] {
            let mut plus = logits.clone();
            plus[[i, j]] += eps;
            let mut minus = logits.clone();
            minus[[i, j]] -= eps;
            let numeric = (CrossEntropy.compute(plus.view(), &labels).unwrap().value
                - CrossEntropy.compute(minus.view(), &labels).unwrap().value)
                / (2.0 * eps);
            assert!((numeric - loss.grad[[i, j]]).abs() < 1e-3, "({i},{j}): {numeric} vs {}", loss.grad[[i, j]]);
        }
    }

    #[test]
    fn test_rejects_bad_labels() {
        let logits = Array2::zeros((2, 3));
        assert!(matches!(CrossEntropy.compute(logits.view(), &[0]), Err(TrainingError::Shape(_))));
        assert!(matches!(CrossEntropy.compute(logits.view(), &[0, 3]), Err(TrainingError::Shape(_))));
        assert!(matches!(CrossEntropy.compute(Array2::zeros((0, 3)).view(), &[]), Err(TrainingError::EmptyBatch)));
    }
}
