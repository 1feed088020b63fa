//! Stochastic gradient descent with momentum, Nesterov and L2 weight decay.

use kdtrain_training::model::take_tensor;
use kdtrain_training::{Model, Optimizer, ParamTensor, StateDict, TrainingError, TrainingResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MOMENTUM_PREFIX: &str = "momentum_buffer.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    pub lr: f64,
    pub momentum: f64,
    pub nesterov: bool,
    pub weight_decay: f64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self { lr: 0.001, momentum: 0.1, nesterov: true, weight_decay: 1e-3 }
    }
}

impl SgdConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(TrainingError::InvalidConfig("lr must be > 0".to_string()));
        }
        if !self.momentum.is_finite() || self.momentum < 0.0 {
            return Err(TrainingError::InvalidConfig("momentum must be >= 0".to_string()));
        }
        if !self.weight_decay.is_finite() || self.weight_decay < 0.0 {
            return Err(TrainingError::InvalidConfig("weight_decay must be >= 0".to_string()));
        }
        if self.nesterov && self.momentum == 0.0 {
            return Err(TrainingError::InvalidConfig("nesterov momentum requires momentum > 0".to_string()));
        }
        Ok(())
    }
}

/// Per-parameter update:
/// `d = g + wd * p`, `buf = momentum * buf + d`,
/// `p -= lr * (d + momentum * buf)` with Nesterov or `p -= lr * buf` without.
#[derive(Debug, Clone)]
pub struct Sgd {
    config: SgdConfig,
    lr: f64,
    buffers: BTreeMap<String, Array2<f32>>,
}

impl Sgd {
    pub fn new(config: SgdConfig) -> TrainingResult<Self> {
        config.validate()?;
        Ok(Self { lr: config.lr, config, buffers: BTreeMap::new() })
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, model: &mut dyn Model) -> TrainingResult<()> {
        let lr = self.lr as f32;
        let momentum = self.config.momentum as f32;
        let weight_decay = self.config.weight_decay as f32;

        for param in model.parameters() {
            let mut direction = param.grad.clone();
            if weight_decay != 0.0 {
                direction.scaled_add(weight_decay, &*param.value);
            }

            if momentum != 0.0 {
                let buf = self
                    .buffers
                    .entry(param.name.clone())
                    .or_insert_with(|| Array2::zeros(direction.raw_dim()));
                if buf.dim() != direction.dim() {
                    *buf = Array2::zeros(direction.raw_dim());
                }
                buf.mapv_inplace(|b| b * momentum);
                *buf += &direction;
                if self.config.nesterov {
                    direction.scaled_add(momentum, &*buf);
                } else {
                    direction.assign(&*buf);
                }
            }

            param.value.scaled_add(-lr, &direction);
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }

    fn state(&self) -> StateDict {
        self.buffers
            .iter()
            .map(|(name, buf)| (format!("{MOMENTUM_PREFIX}{name}"), ParamTensor::from_array(buf)))
            .collect()
    }

    fn load_state(&mut self, state: &StateDict) -> TrainingResult<()> {
        let mut buffers = BTreeMap::new();
        for (key, tensor) in state {
            let Some(name) = key.strip_prefix(MOMENTUM_PREFIX) else {
                return Err(TrainingError::Checkpoint(format!("unexpected optimizer state entry `{key}`")));
            };
            let shape = match tensor.shape.as_slice() {
                &[rows, cols] => (rows, cols),
                other => return Err(TrainingError::Shape(format!("momentum buffer `{name}` has shape {other:?}"))),
            };
            buffers.insert(name.to_string(), take_tensor(state, key, shape)?);
        }
        self.buffers = buffers;
        Ok(())
    }
}
