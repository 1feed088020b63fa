use crate::error::{TrainingError, TrainingResult};
use ndarray::{Array2, ArrayView2};

/// Supervision attached to a batch. The variant is fixed when the batch is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Labeled(Vec<usize>),
    LabeledWithTeacherLogits { labels: Vec<usize>, teacher_logits: Array2<f32> },
}

impl Target {
    pub fn labels(&self) -> &[usize] {
        match self {
            Self::Labeled(labels) | Self::LabeledWithTeacherLogits { labels, .. } => labels,
        }
    }

    pub fn teacher_logits(&self) -> Option<ArrayView2<'_, f32>> {
        match self {
            Self::Labeled(_) => None,
            Self::LabeledWithTeacherLogits { teacher_logits, .. } => Some(teacher_logits.view()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Array2<f32>,
    pub target: Target,
}

impl Batch {
    /// Builds a batch, checking that every row has a label (and teacher logits, if given).
    pub fn new(inputs: Array2<f32>, target: Target) -> TrainingResult<Self> {
        let rows = inputs.nrows();
        if target.labels().len() != rows {
            return Err(TrainingError::Shape(format!(
                "{} labels for {} input rows",
                target.labels().len(),
                rows
            )));
        }
        if let Some(logits) = target.teacher_logits() {
            if logits.nrows() != rows {
                return Err(TrainingError::Shape(format!(
                    "{} teacher logit rows for {} input rows",
                    logits.nrows(),
                    rows
                )));
            }
        }
        Ok(Self { inputs, target })
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type BatchIter<'a> = Box<dyn Iterator<Item = TrainingResult<Batch>> + 'a>;

/// Ordered, finite stream of batches; one call to [`BatchSource::batches`] per pass.
pub trait BatchSource {
    fn num_batches(&self) -> usize;

    fn batches(&mut self, epoch: usize) -> BatchIter<'_>;
}

/// Fixed list of batches replayed in the same order on every pass.
#[derive(Debug, Clone, Default)]
pub struct VecBatchSource {
    batches: Vec<Batch>,
}

impl VecBatchSource {
    #[must_use]
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }
}

impl BatchSource for VecBatchSource {
    fn num_batches(&self) -> usize {
        self.batches.len()
    }

    fn batches(&mut self, _epoch: usize) -> BatchIter<'_> {
        Box::new(self.batches.iter().cloned().map(Ok))
    }
}
