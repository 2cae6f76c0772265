//! Feed-forward network evaluated from exported weights.
//!
//! The artifact is JSON:
//!
//! ```json
//! {
//!   "input_len": 187,
//!   "layers": [
//!     { "weights": [[...], ...], "bias": [...], "activation": "relu" },
//!     { "weights": [[...], ...], "bias": [...], "activation": "softmax" }
//!   ]
//! }
//! ```
//!
//! `weights` is row-major `[outputs][inputs]`.

use crate::error::{ClassifierError, ConfigurationError};
use crate::model::Classifier;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Softmax,
}

/// A fully connected layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

impl DenseLayer {
    fn outputs(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();

        match self.activation {
            Activation::Linear => {}
            Activation::Relu => out.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Softmax => softmax(&mut out),
        }
        out
    }
}

/// A dense network with a fixed input width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseModel {
    input_len: usize,
    layers: Vec<DenseLayer>,
}

impl DenseModel {
    /// Build a model, validating layer shapes.
    pub fn new(input_len: usize, layers: Vec<DenseLayer>) -> Result<Self, ConfigurationError> {
        if layers.is_empty() {
            return Err(ConfigurationError::InvalidModel("model has no layers".to_string()));
        }

        let mut width = input_len;
        for (i, layer) in layers.iter().enumerate() {
            if layer.outputs() == 0 {
                return Err(ConfigurationError::InvalidModel(format!("layer {i} has no outputs")));
            }
            if layer.weights.len() != layer.outputs() {
                return Err(ConfigurationError::LengthMismatch {
                    what: format!("layer {i} weight rows"),
                    expected: layer.outputs(),
                    actual: layer.weights.len(),
                });
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != width {
                    return Err(ConfigurationError::LengthMismatch {
                        what: format!("layer {i} weight row {r}"),
                        expected: width,
                        actual: row.len(),
                    });
                }
                if let Some(index) = row.iter().position(|v| !v.is_finite()) {
                    return Err(ConfigurationError::NonFinite {
                        what: format!("layer {i} weight row {r}"),
                        index,
                    });
                }
            }
            if let Some(index) = layer.bias.iter().position(|v| !v.is_finite()) {
                return Err(ConfigurationError::NonFinite {
                    what: format!("layer {i} bias"),
                    index,
                });
            }
            width = layer.outputs();
        }

        Ok(Self { input_len, layers })
    }

    /// Load a model artifact and check it accepts windows of `window_length`.
    pub fn load(path: &Path, window_length: usize) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: DenseModel =
            serde_json::from_str(&content).map_err(|source| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if raw.input_len != window_length {
            return Err(ConfigurationError::LengthMismatch {
                what: "model input".to_string(),
                expected: window_length,
                actual: raw.input_len,
            });
        }

        Self::new(raw.input_len, raw.layers)
    }

    fn forward(&self, window: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(window.to_vec(), |acc, layer| layer.forward(&acc))
    }
}

impl Classifier for DenseModel {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn num_classes(&self) -> usize {
        self.layers.last().map(DenseLayer::outputs).unwrap_or(0)
    }

    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        batch
            .iter()
            .map(|window| {
                if window.len() != self.input_len {
                    return Err(ClassifierError::InputWidth {
                        expected: self.input_len,
                        actual: window.len(),
                    });
                }
                Ok(self.forward(window))
            })
            .collect()
    }
}

/// In-place numerically stable softmax.
fn softmax(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}
