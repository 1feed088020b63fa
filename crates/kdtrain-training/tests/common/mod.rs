//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use kdtrain_training::{
    Batch, CompressionHooks, Criterion, Loss, Model, Optimizer, ParamTensor, Parameter, ProgressEvent,
    ProgressSink, StateDict, Target, TrainingError, TrainingResult, VecBatchSource,
};
use ndarray::{Array2, ArrayView2};
use std::collections::VecDeque;
use std::sync::Mutex;

pub const CLASSES: usize = 4;

/// Model whose validation accuracy follows a script, one entry per `eval_mode` call.
///
/// Column 0 of every input row carries the row's label so `infer` can decide
/// which rows to get right.
pub struct ScriptedModel {
    scores: VecDeque<f64>,
    current: f64,
    training: bool,
    weight: Array2<f32>,
    grad: Array2<f32>,
}

impl ScriptedModel {
    pub fn new(scores: &[f64]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            current: 0.0,
            training: true,
            weight: Array2::zeros((1, 1)),
            grad: Array2::zeros((1, 1)),
        }
    }

    pub fn weight(&self) -> f32 {
        self.weight[[0, 0]]
    }
}

fn one_hot_logits(inputs: ArrayView2<'_, f32>, correct_rows: usize) -> Array2<f32> {
    let mut logits = Array2::zeros((inputs.nrows(), CLASSES));
    for (i, row) in inputs.outer_iter().enumerate() {
        let label = row[0] as usize;
        let predicted = if i < correct_rows { label } else { (label + 1) % CLASSES };
        logits[[i, predicted]] = 1.0;
    }
    logits
}

impl Model for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn train_mode(&mut self) {
        self.training = true;
    }

    fn eval_mode(&mut self) {
        self.training = false;
        if let Some(next) = self.scores.pop_front() {
            self.current = next;
        }
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn forward(&mut self, inputs: ArrayView2<'_, f32>) -> TrainingResult<Array2<f32>> {
        Ok(one_hot_logits(inputs, inputs.nrows()))
    }

    fn infer(&self, inputs: ArrayView2<'_, f32>) -> TrainingResult<Array2<f32>> {
        let correct = (self.current / 100.0 * inputs.nrows() as f64).round() as usize;
        Ok(one_hot_logits(inputs, correct))
    }

    fn backward(&mut self, _grad_output: ArrayView2<'_, f32>) -> TrainingResult<()> {
        self.grad += 1.0;
        Ok(())
    }

    fn parameters(&mut self) -> Vec<Parameter<'_>> {
        vec![Parameter { name: "w".to_string(), value: &mut self.weight, grad: &mut self.grad }]
    }

    fn num_parameters(&self) -> usize {
        1
    }

    fn state(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("w".to_string(), ParamTensor::from_array(&self.weight));
        state
    }

    fn load_state(&mut self, state: &StateDict) -> TrainingResult<()> {
        self.weight = kdtrain_training::model::take_tensor(state, "w", (1, 1))?;
        Ok(())
    }
}

/// Constant unit loss with a zero gradient.
pub struct UnitCriterion;

impl Criterion for UnitCriterion {
    fn compute(&self, logits: ArrayView2<'_, f32>, _labels: &[usize]) -> TrainingResult<Loss> {
        Ok(Loss { value: 1.0, grad: Array2::zeros(logits.raw_dim()) })
    }
}

/// Plain gradient descent that also counts its steps.
pub struct CountingSgd {
    pub lr: f64,
    pub steps: usize,
}

impl CountingSgd {
    pub fn new(lr: f64) -> Self {
        Self { lr, steps: 0 }
    }
}

impl Optimizer for CountingSgd {
    fn step(&mut self, model: &mut dyn Model) -> TrainingResult<()> {
        for param in model.parameters() {
            param.value.scaled_add(-(self.lr as f32), &*param.grad);
        }
        self.steps += 1;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }

    fn state(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert(
            "steps".to_string(),
            ParamTensor { shape: vec![1, 1], values: vec![self.steps as f32] },
        );
        state
    }

    fn load_state(&mut self, state: &StateDict) -> TrainingResult<()> {
        let steps = state
            .get("steps")
            .and_then(|t| t.values.first())
            .ok_or_else(|| TrainingError::Checkpoint("missing optimizer steps".to_string()))?;
        self.steps = *steps as usize;
        Ok(())
    }
}

/// Records every hook invocation as a short string.
#[derive(Default)]
pub struct RecordingHooks {
    pub calls: Vec<String>,
}

impl CompressionHooks for RecordingHooks {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn on_epoch_begin(&mut self, epoch: usize) {
        self.calls.push(format!("epoch_begin:{epoch}"));
    }

    fn on_step_begin(&mut self, step: usize) {
        self.calls.push(format!("step_begin:{step}"));
    }

    fn on_after_compute_loss(
        &mut self,
        _inputs: ArrayView2<'_, f32>,
        _outputs: ArrayView2<'_, f32>,
        mut loss: Loss,
        teacher_logits: Option<ArrayView2<'_, f32>>,
    ) -> TrainingResult<Loss> {
        self.calls.push(format!("after_loss:teacher={}", teacher_logits.is_some()));
        loss.value *= 2.0;
        Ok(loss)
    }

    fn on_step_end(&mut self) {
        self.calls.push("step_end".to_string());
    }

    fn on_epoch_end(&mut self) {
        self.calls.push("epoch_end".to_string());
    }
}

/// Fails the loss adjustment of every step in `fail_epoch`.
pub struct FailingHooks {
    pub fail_epoch: usize,
    epoch: usize,
}

impl FailingHooks {
    pub fn new(fail_epoch: usize) -> Self {
        Self { fail_epoch, epoch: 0 }
    }
}

impl CompressionHooks for FailingHooks {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn on_epoch_begin(&mut self, epoch: usize) {
        self.epoch = epoch;
    }

    fn on_after_compute_loss(
        &mut self,
        _inputs: ArrayView2<'_, f32>,
        _outputs: ArrayView2<'_, f32>,
        loss: Loss,
        _teacher_logits: Option<ArrayView2<'_, f32>>,
    ) -> TrainingResult<Loss> {
        if self.epoch == self.fail_epoch {
            return Err(TrainingError::Collaborator(format!("teacher unavailable in epoch {}", self.epoch)));
        }
        Ok(loss)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn best_flags(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::EpochFinished { is_best, .. } => Some(is_best),
                _ => None,
            })
            .collect()
    }

    pub fn trained_epochs(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::EpochFinished { epoch, .. } => Some(epoch),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// `rows` examples of class `label`, with the label mirrored into column 0.
pub fn labeled_batch(rows: usize, label: usize) -> Batch {
    let inputs = Array2::from_elem((rows, 2), label as f32);
    Batch::new(inputs, Target::Labeled(vec![label; rows])).unwrap()
}

pub fn distill_batch(rows: usize, label: usize) -> Batch {
    let inputs = Array2::from_elem((rows, 2), label as f32);
    let teacher_logits = Array2::zeros((rows, CLASSES));
    Batch::new(inputs, Target::LabeledWithTeacherLogits { labels: vec![label; rows], teacher_logits }).unwrap()
}

pub fn source(batches: usize, rows: usize) -> VecBatchSource {
    VecBatchSource::new((0..batches).map(|i| labeled_batch(rows, i % CLASSES)).collect())
}
