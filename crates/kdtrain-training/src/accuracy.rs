use crate::error::{TrainingError, TrainingResult};
use ndarray::ArrayView2;

/// Computes precision@k for each requested `k`, as a percentage in `[0, 100]`.
///
/// An example counts as correct for `k` when fewer than `k` classes outrank its
/// true label. Equal scores are ordered by class index, lower index first.
pub fn top_k_accuracy(scores: ArrayView2<'_, f32>, labels: &[usize], topk: &[usize]) -> TrainingResult<Vec<f64>> {
    let (rows, classes) = scores.dim();
    if rows == 0 {
        return Err(TrainingError::EmptyBatch);
    }
    if labels.len() != rows {
        return Err(TrainingError::Shape(format!(
            "{} labels for {} rows of scores",
            labels.len(),
            rows
        )));
    }
    if topk.iter().any(|&k| k == 0) {
        return Err(TrainingError::InvalidConfig("top-k values must be >= 1".to_string()));
    }

    let mut ranks = Vec::with_capacity(rows);
    for (row, &label) in scores.outer_iter().zip(labels) {
        if label >= classes {
            return Err(TrainingError::Shape(format!("label {label} out of range for {classes} classes")));
        }
        let target = row[label];
        let rank = row
            .iter()
            .enumerate()
            .filter(|&(class, &score)| score > target || (score == target && class < label))
            .count();
        ranks.push(rank);
    }

    Ok(topk
        .iter()
        .map(|&k| {
            let correct = ranks.iter().filter(|&&rank| rank < k).count();
            100.0 * correct as f64 / rows as f64
        })
        .collect())
}

/// Precision@1 of a batch.
pub fn top1_accuracy(scores: ArrayView2<'_, f32>, labels: &[usize]) -> TrainingResult<f64> {
    Ok(top_k_accuracy(scores, labels, &[1])?[0])
}
