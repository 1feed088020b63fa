//! Temperature-scaled knowledge distillation as a [`CompressionHooks`] implementation.

use crate::loss::{log_softmax, softmax};
use kdtrain_training::{CompressionHooks, Loss, MetricAccumulator, Model, TrainingError, TrainingResult};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossType {
    #[serde(rename = "CE")]
    CrossEntropy,
    #[serde(rename = "KL")]
    KlDivergence,
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CrossEntropy => "CE",
            Self::KlDivergence => "KL",
        })
    }
}

impl FromStr for LossType {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CE" => Ok(Self::CrossEntropy),
            "KL" => Ok(Self::KlDivergence),
            _ => Err(TrainingError::InvalidConfig(format!("unknown distillation loss type '{s}' (expected CE or KL)"))),
        }
    }
}

/// Distillation settings: softmax temperature, and for the (student, teacher-student)
/// loss pair their types and blending weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistillationConfig {
    pub temperature: f32,
    pub loss_types: Vec<LossType>,
    pub loss_weights: Vec<f32>,
}

impl Default for DistillationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            loss_types: vec![LossType::CrossEntropy, LossType::KlDivergence],
            loss_weights: vec![0.5, 0.5],
        }
    }
}

impl DistillationConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(TrainingError::InvalidConfig("temperature must be > 0".to_string()));
        }
        match self.loss_types.as_slice() {
            [LossType::CrossEntropy, _] => {}
            [_, _] => {
                return Err(TrainingError::InvalidConfig(
                    "the student loss (first loss type) must be CE".to_string(),
                ));
            }
            other => {
                return Err(TrainingError::InvalidConfig(format!(
                    "expected 2 loss types, got {}",
                    other.len()
                )));
            }
        }
        let &[student, teacher] = self.loss_weights.as_slice() else {
            return Err(TrainingError::InvalidConfig(format!(
                "expected 2 loss weights, got {}",
                self.loss_weights.len()
            )));
        };
        if student < 0.0 || teacher < 0.0 {
            return Err(TrainingError::InvalidConfig("loss weights must be >= 0".to_string()));
        }
        if (student + teacher - 1.0).abs() > 1e-6 {
            return Err(TrainingError::InvalidConfig(format!(
                "loss weights must sum to 1.0, got {}",
                student + teacher
            )));
        }
        Ok(())
    }

    pub fn teacher_student_loss(&self) -> LossType {
        self.loss_types[1]
    }
}

/// Teacher-student term and its gradient w.r.t. the student logits, both before T² scaling.
fn soft_target_loss(
    kind: LossType,
    student: ArrayView2<'_, f32>,
    teacher: ArrayView2<'_, f32>,
    temperature: f32,
) -> (f32, Array2<f32>) {
    let rows = student.nrows() as f32;
    let student_log_probs = log_softmax((&student / temperature).view());
    let teacher_log_probs = log_softmax((&teacher / temperature).view());
    let teacher_probs = teacher_log_probs.mapv(f32::exp);

    let cross = -(&teacher_probs * &student_log_probs).sum();
    let value = match kind {
        LossType::CrossEntropy => cross,
        LossType::KlDivergence => (&teacher_probs * &teacher_log_probs).sum() + cross,
    } / rows;

    // d/dz of either form is (p_student - p_teacher) / T per example
    let grad = (student_log_probs.mapv(f32::exp) - &teacher_probs) / (temperature * rows);
    (value, grad)
}

/// Blends the supervised loss with a teacher-student term:
/// `w0 * student_loss + w1 * T² * teacher_student_loss`.
///
/// Teacher logits attached to the batch are used as-is; otherwise the teacher
/// network is run in inference mode on the same inputs.
pub struct KnowledgeDistillation {
    teacher: Box<dyn Model>,
    config: DistillationConfig,
    teacher_student: MetricAccumulator,
}

impl KnowledgeDistillation {
    pub fn new(mut teacher: Box<dyn Model>, config: DistillationConfig) -> TrainingResult<Self> {
        config.validate()?;
        teacher.eval_mode();
        Ok(Self { teacher, config, teacher_student: MetricAccumulator::new() })
    }

    pub fn teacher(&self) -> &dyn Model {
        self.teacher.as_ref()
    }
}

impl CompressionHooks for KnowledgeDistillation {
    fn name(&self) -> &'static str {
        "distillation"
    }

    fn on_epoch_begin(&mut self, _epoch: usize) {
        self.teacher_student.reset();
    }

    fn on_after_compute_loss(
        &mut self,
        inputs: ArrayView2<'_, f32>,
        outputs: ArrayView2<'_, f32>,
        loss: Loss,
        teacher_logits: Option<ArrayView2<'_, f32>>,
    ) -> TrainingResult<Loss> {
        let inferred;
        let teacher_logits = match teacher_logits {
            Some(logits) => logits.reborrow(),
            None => {
                inferred = self.teacher.infer(inputs)?;
                inferred.view()
            }
        };
        if teacher_logits.dim() != outputs.dim() {
            return Err(TrainingError::Shape(format!(
                "teacher logits {:?} do not match student outputs {:?}",
                teacher_logits.dim(),
                outputs.dim()
            )));
        }

        let temperature = self.config.temperature;
        let (ts_value, ts_grad) =
            soft_target_loss(self.config.teacher_student_loss(), outputs, teacher_logits, temperature);
        self.teacher_student.update(f64::from(ts_value), outputs.nrows());

        let student_weight = self.config.loss_weights[0];
        let teacher_weight = self.config.loss_weights[1] * temperature * temperature;
        let value = student_weight * loss.value + teacher_weight * ts_value;
        let mut grad = loss.grad * student_weight;
        grad.scaled_add(teacher_weight, &ts_grad);
        Ok(Loss { value, grad })
    }

    fn on_epoch_end(&mut self) {
        if self.teacher_student.count() > 0 {
            debug!(
                loss = %self.config.teacher_student_loss(),
                average = self.teacher_student.average(),
                "teacher-student loss for epoch"
            );
        }
    }
}
