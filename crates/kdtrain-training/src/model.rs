//! Collaborator contracts for the numerical side of training.
//!
//! The loop in this crate never touches weights directly: it drives a
//! [`Model`], a [`Criterion`], an [`Optimizer`] and an [`LrScheduler`] through
//! these traits. `kdtrain-backend` ships dense reference implementations.

use crate::error::{TrainingError, TrainingResult};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized tensor inside a [`StateDict`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl ParamTensor {
    #[must_use]
    pub fn from_array(array: &Array2<f32>) -> Self {
        Self { shape: array.shape().to_vec(), values: array.iter().copied().collect() }
    }

    pub fn to_array(&self) -> TrainingResult<Array2<f32>> {
        let &[rows, cols] = self.shape.as_slice() else {
            return Err(TrainingError::Shape(format!("expected a 2-d tensor, got shape {:?}", self.shape)));
        };
        Array2::from_shape_vec((rows, cols), self.values.clone())
            .map_err(|e| TrainingError::Shape(e.to_string()))
    }
}

/// Named weights, ordered by name so serialized checkpoints are stable.
pub type StateDict = BTreeMap<String, ParamTensor>;

/// Fetch a named tensor and check it against the expected shape.
pub fn take_tensor(state: &StateDict, name: &str, shape: (usize, usize)) -> TrainingResult<Array2<f32>> {
    let tensor = state
        .get(name)
        .ok_or_else(|| TrainingError::Checkpoint(format!("state dict is missing `{name}`")))?;
    let array = tensor.to_array()?;
    if array.dim() != shape {
        return Err(TrainingError::Shape(format!(
            "`{name}` has shape {:?}, model expects {:?}",
            array.dim(),
            shape
        )));
    }
    Ok(array)
}

/// Mutable view of one trainable tensor and its accumulated gradient.
#[derive(Debug)]
pub struct Parameter<'a> {
    pub name: String,
    pub value: &'a mut Array2<f32>,
    pub grad: &'a mut Array2<f32>,
}

pub trait Model: Send {
    fn name(&self) -> &str;

    fn train_mode(&mut self);

    fn eval_mode(&mut self);

    fn is_training(&self) -> bool;

    /// Training forward pass. May cache activations for [`Model::backward`].
    fn forward(&mut self, inputs: ArrayView2<'_, f32>) -> TrainingResult<Array2<f32>>;

    /// Inference pass. Borrowing immutably keeps it from touching weights.
    fn infer(&self, inputs: ArrayView2<'_, f32>) -> TrainingResult<Array2<f32>>;

    /// Accumulate parameter gradients given dL/d(outputs) of the last forward.
    fn backward(&mut self, grad_output: ArrayView2<'_, f32>) -> TrainingResult<()>;

    fn parameters(&mut self) -> Vec<Parameter<'_>>;

    fn num_parameters(&self) -> usize;

    fn state(&self) -> StateDict;

    fn load_state(&mut self, state: &StateDict) -> TrainingResult<()>;
}

/// Scalar loss plus its gradient with respect to the model outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Loss {
    pub value: f32,
    pub grad: Array2<f32>,
}

impl Loss {
    pub fn ensure_finite(&self) -> TrainingResult<()> {
        if self.value.is_finite() {
            Ok(())
        } else {
            Err(TrainingError::Collaborator(format!("loss diverged to {}", self.value)))
        }
    }
}

pub trait Criterion: Send {
    fn compute(&self, logits: ArrayView2<'_, f32>, labels: &[usize]) -> TrainingResult<Loss>;
}

pub trait Optimizer: Send {
    fn zero_grad(&mut self, model: &mut dyn Model) {
        for param in model.parameters() {
            param.grad.fill(0.0);
        }
    }

    fn step(&mut self, model: &mut dyn Model) -> TrainingResult<()>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);

    fn state(&self) -> StateDict;

    fn load_state(&mut self, state: &StateDict) -> TrainingResult<()>;
}

pub trait LrScheduler: Send {
    /// Advance one step and push the new rate into the optimizer.
    fn step(&mut self, optimizer: &mut dyn Optimizer);

    fn last_lr(&self) -> f64;
}

/// Scheduler that leaves the optimizer's rate untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantLr {
    lr: f64,
}

impl ConstantLr {
    #[must_use]
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl LrScheduler for ConstantLr {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.lr = optimizer.learning_rate();
    }

    fn last_lr(&self) -> f64 {
        self.lr
    }
}
