//! Dense ReLU classifiers used as student and teacher networks.

use kdtrain_training::model::take_tensor;
use kdtrain_training::{Model, ParamTensor, Parameter, StateDict, TrainingError, TrainingResult};
use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt;
use std::str::FromStr;

/// Named network shapes selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Linear,
    MlpSmall,
    MlpLarge,
}

impl Architecture {
    pub const ALL: [Self; 3] = [Self::Linear, Self::MlpSmall, Self::MlpLarge];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::MlpSmall => "mlp-small",
            Self::MlpLarge => "mlp-large",
        }
    }

    pub fn hidden_sizes(self) -> &'static [usize] {
        match self {
            Self::Linear => &[],
            Self::MlpSmall => &[64],
            Self::MlpLarge => &[256, 128],
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|arch| arch.as_str() == s).ok_or_else(|| {
            let known: Vec<_> = Self::ALL.iter().map(|a| a.as_str()).collect();
            TrainingError::InvalidConfig(format!("unknown architecture '{s}' (expected one of {})", known.join(", ")))
        })
    }
}

/// Fully connected layer, `y = x W + b`, with He-normal initialised weights.
#[derive(Debug, Clone)]
struct Dense {
    weight: Array2<f32>,
    bias: Array2<f32>,
    grad_weight: Array2<f32>,
    grad_bias: Array2<f32>,
}

impl Dense {
    fn new<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> TrainingResult<Self> {
        let std = (2.0 / fan_in as f32).sqrt();
        let normal = Normal::new(0.0, std).map_err(|e| TrainingError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            weight: Array2::from_shape_simple_fn((fan_in, fan_out), || normal.sample(&mut *rng)),
            bias: Array2::zeros((1, fan_out)),
            grad_weight: Array2::zeros((fan_in, fan_out)),
            grad_bias: Array2::zeros((1, fan_out)),
        })
    }

    fn apply(&self, inputs: ArrayView2<'_, f32>) -> Array2<f32> {
        inputs.dot(&self.weight) + &self.bias
    }
}

pub struct Mlp {
    arch: Architecture,
    in_features: usize,
    layers: Vec<Dense>,
    training: bool,
    /// Input of every layer from the last training forward pass.
    activations: Vec<Array2<f32>>,
}

impl Mlp {
    pub fn new<R: Rng + ?Sized>(
        arch: Architecture,
        in_features: usize,
        classes: usize,
        rng: &mut R,
    ) -> TrainingResult<Self> {
        if in_features == 0 || classes < 2 {
            return Err(TrainingError::InvalidConfig(format!(
                "{arch} needs at least one input feature and two classes (got {in_features} and {classes})"
            )));
        }

        let mut widths = vec![in_features];
        widths.extend_from_slice(arch.hidden_sizes());
        widths.push(classes);
        let layers = widths
            .windows(2)
            .map(|pair| Dense::new(pair[0], pair[1], rng))
            .collect::<TrainingResult<Vec<_>>>()?;

        Ok(Self { arch, in_features, layers, training: true, activations: Vec::new() })
    }

    fn check_inputs(&self, inputs: ArrayView2<'_, f32>) -> TrainingResult<()> {
        if inputs.ncols() == self.in_features {
            Ok(())
        } else {
            Err(TrainingError::Shape(format!(
                "{} expects {} features per row, got {}",
                self.arch,
                self.in_features,
                inputs.ncols()
            )))
        }
    }

    fn run(&self, inputs: ArrayView2<'_, f32>, mut record: impl FnMut(&Array2<f32>)) -> Array2<f32> {
        let last = self.layers.len() - 1;
        let mut x = inputs.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            record(&x);
            x = layer.apply(x.view());
            if i < last {
                x.mapv_inplace(|v| v.max(0.0));
            }
        }
        x
    }
}

impl Model for Mlp {
    fn name(&self) -> &str {
        self.arch.as_str()
    }

    fn train_mode(&mut self) {
        self.training = true;
    }

    fn eval_mode(&mut self) {
        self.training = false;
        self.activations.clear();
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn forward(&mut self, inputs: ArrayView2<'_, f32>) -> TrainingResult<Array2<f32>> {
        self.check_inputs(inputs)?;
        let mut activations = Vec::with_capacity(self.layers.len());
        let outputs = self.run(inputs, |x| activations.push(x.clone()));
        self.activations = activations;
        Ok(outputs)
    }

    fn infer(&self, inputs: ArrayView2<'_, f32>) -> TrainingResult<Array2<f32>> {
        self.check_inputs(inputs)?;
        Ok(self.run(inputs, |_| {}))
    }

    fn backward(&mut self, grad_output: ArrayView2<'_, f32>) -> TrainingResult<()> {
        if self.activations.len() != self.layers.len() {
            return Err(TrainingError::Collaborator("backward called without a training forward pass".to_string()));
        }

        let mut grad = grad_output.to_owned();
        for i in (0..self.layers.len()).rev() {
            let input = &self.activations[i];
            let layer = &mut self.layers[i];
            if grad.dim() != (input.nrows(), layer.weight.ncols()) {
                return Err(TrainingError::Shape(format!(
                    "gradient of shape {:?} does not match layer {i} output",
                    grad.dim()
                )));
            }
            layer.grad_weight += &input.t().dot(&grad);
            layer.grad_bias += &grad.sum_axis(Axis(0)).insert_axis(Axis(0));
            if i > 0 {
                let mut upstream = grad.dot(&layer.weight.t());
                // ReLU: inputs to layer i are the rectified outputs of layer i - 1
                upstream.zip_mut_with(input, |g, &a| {
                    if a <= 0.0 {
                        *g = 0.0;
                    }
                });
                grad = upstream;
            }
        }
        Ok(())
    }

    fn parameters(&mut self) -> Vec<Parameter<'_>> {
        let mut params = Vec::with_capacity(self.layers.len() * 2);
        for (i, layer) in self.layers.iter_mut().enumerate() {
            params.push(Parameter {
                name: format!("layers.{i}.weight"),
                value: &mut layer.weight,
                grad: &mut layer.grad_weight,
            });
            params.push(Parameter { name: format!("layers.{i}.bias"), value: &mut layer.bias, grad: &mut layer.grad_bias });
        }
        params
    }

    fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.weight.len() + l.bias.len()).sum()
    }

    fn state(&self) -> StateDict {
        let mut state = StateDict::new();
        for (i, layer) in self.layers.iter().enumerate() {
            state.insert(format!("layers.{i}.weight"), ParamTensor::from_array(&layer.weight));
            state.insert(format!("layers.{i}.bias"), ParamTensor::from_array(&layer.bias));
        }
        state
    }

    fn load_state(&mut self, state: &StateDict) -> TrainingResult<()> {
        let mut loaded = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let weight = take_tensor(state, &format!("layers.{i}.weight"), layer.weight.dim())?;
            let bias = take_tensor(state, &format!("layers.{i}.bias"), layer.bias.dim())?;
            loaded.push((weight, bias));
        }
        if state.len() != loaded.len() * 2 {
            return Err(TrainingError::Checkpoint(format!(
                "state dict has {} tensors, {} expects {}",
                state.len(),
                self.arch,
                loaded.len() * 2
            )));
        }
        for (layer, (weight, bias)) in self.layers.iter_mut().zip(loaded) {
            layer.weight = weight;
            layer.bias = bias;
        }
        Ok(())
    }
}
