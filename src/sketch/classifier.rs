use crate::sketch::model::{Prediction, Tensor, NUM_CLASSES};
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub trait Classifier: Send {
    fn predict(&mut self, input: &Tensor) -> Result<Prediction>;
}

/// One stage of a feed-forward network. Weights use the row-major layout of
/// the exporting framework: `[out][in][k][k]` for convolutions and
/// `[out][in]` for linear layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        #[serde(default)]
        padding: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    },
    Relu,
    MaxPool2d {
        size: usize,
    },
    Flatten,
    Linear {
        in_features: usize,
        out_features: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    },
}

impl Layer {
    fn validate(&self) -> Result<()> {
        match self {
            Layer::Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                weights,
                bias,
                ..
            } => {
                ensure!(*kernel_size > 0, "conv2d kernel size must be positive");
                let expected = out_channels * in_channels * kernel_size * kernel_size;
                ensure!(
                    weights.len() == expected,
                    "conv2d has {} weights, expected {expected}",
                    weights.len()
                );
                ensure!(
                    bias.len() == *out_channels,
                    "conv2d has {} biases, expected {out_channels}",
                    bias.len()
                );
            }
            Layer::MaxPool2d { size } => {
                ensure!(*size > 0, "max_pool2d size must be positive");
            }
            Layer::Linear {
                in_features,
                out_features,
                weights,
                bias,
            } => {
                let expected = in_features * out_features;
                ensure!(
                    weights.len() == expected,
                    "linear has {} weights, expected {expected}",
                    weights.len()
                );
                ensure!(
                    bias.len() == *out_features,
                    "linear has {} biases, expected {out_features}",
                    bias.len()
                );
            }
            Layer::Relu | Layer::Flatten => {}
        }
        Ok(())
    }

    fn forward(&self, input: Tensor) -> Result<Tensor> {
        match self {
            Layer::Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                padding,
                weights,
                bias,
            } => conv2d(
                &input,
                *in_channels,
                *out_channels,
                *kernel_size,
                *padding,
                weights,
                bias,
            ),
            Layer::Relu => {
                let mut output = input;
                for value in &mut output.data {
                    *value = value.max(0.0);
                }
                Ok(output)
            }
            Layer::MaxPool2d { size } => max_pool2d(&input, *size),
            Layer::Flatten => {
                let len = input.len();
                Tensor::new(len, 1, 1, input.data)
            }
            Layer::Linear {
                in_features,
                out_features,
                weights,
                bias,
            } => {
                ensure!(
                    input.len() == *in_features,
                    "linear expects {in_features} inputs, got {}",
                    input.len()
                );
                let data = (0..*out_features)
                    .map(|o| {
                        let row = &weights[o * in_features..(o + 1) * in_features];
                        row.iter()
                            .zip(&input.data)
                            .map(|(w, x)| w * x)
                            .sum::<f32>()
                            + bias[o]
                    })
                    .collect();
                Tensor::new(*out_features, 1, 1, data)
            }
        }
    }
}

fn conv2d(
    input: &Tensor,
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    padding: usize,
    weights: &[f32],
    bias: &[f32],
) -> Result<Tensor> {
    ensure!(
        input.channels == in_channels,
        "conv2d expects {in_channels} channels, got {}",
        input.channels
    );
    let padded_h = input.height + 2 * padding;
    let padded_w = input.width + 2 * padding;
    if padded_h < kernel_size || padded_w < kernel_size {
        bail!(
            "conv2d kernel {kernel_size} does not fit a {}x{} input",
            input.height,
            input.width
        );
    }
    let out_h = padded_h - kernel_size + 1;
    let out_w = padded_w - kernel_size + 1;
    let mut output = Tensor::zeros(out_channels, out_h, out_w);

    for o in 0..out_channels {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut acc = bias[o];
                for c in 0..in_channels {
                    let kernel_base = (o * in_channels + c) * kernel_size * kernel_size;
                    for ky in 0..kernel_size {
                        let iy = (oy + ky) as isize - padding as isize;
                        if iy < 0 || iy >= input.height as isize {
                            continue;
                        }
                        for kx in 0..kernel_size {
                            let ix = (ox + kx) as isize - padding as isize;
                            if ix < 0 || ix >= input.width as isize {
                                continue;
                            }
                            acc += weights[kernel_base + ky * kernel_size + kx]
                                * input.at(c, iy as usize, ix as usize);
                        }
                    }
                }
                output.data[(o * out_h + oy) * out_w + ox] = acc;
            }
        }
    }
    Ok(output)
}

fn max_pool2d(input: &Tensor, size: usize) -> Result<Tensor> {
    let out_h = input.height / size;
    let out_w = input.width / size;
    ensure!(
        out_h > 0 && out_w > 0,
        "max_pool2d window {size} larger than {}x{} input",
        input.height,
        input.width
    );
    let mut output = Tensor::zeros(input.channels, out_h, out_w);
    for c in 0..input.channels {
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut best = f32::NEG_INFINITY;
                for dy in 0..size {
                    for dx in 0..size {
                        best = best.max(input.at(c, oy * size + dy, ox * size + dx));
                    }
                }
                output.data[(c * out_h + oy) * out_w + ox] = best;
            }
        }
    }
    Ok(output)
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialModel {
    layers: Vec<Layer>,
}

impl SequentialModel {
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        ensure!(!layers.is_empty(), "model has no layers");
        for (index, layer) in layers.iter().enumerate() {
            layer
                .validate()
                .with_context(|| format!("invalid layer {index}"))?;
        }
        Ok(Self { layers })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read model file {}", path.display()))?;
        let model: SequentialModel = serde_json::from_str(&content)
            .with_context(|| format!("deserialize model file {}", path.display()))?;
        let model = Self::new(model.layers)
            .with_context(|| format!("validate model file {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            layers = model.layers.len(),
            "classifier model loaded"
        );
        Ok(model)
    }

    pub fn forward(&self, input: &Tensor) -> Result<Vec<f32>> {
        let mut activation = input.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            activation = layer
                .forward(activation)
                .with_context(|| format!("layer {index} forward pass"))?;
        }
        Ok(activation.data)
    }
}

impl Classifier for SequentialModel {
    fn predict(&mut self, input: &Tensor) -> Result<Prediction> {
        let logits = self.forward(input)?;
        ensure!(
            logits.len() == NUM_CLASSES,
            "model produced {} classes, expected {NUM_CLASSES}",
            logits.len()
        );
        let probabilities = softmax(&logits);
        let (digit, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (index, p)| {
                if p > best.1 {
                    (index, p)
                } else {
                    best
                }
            });
        ensure!(confidence.is_finite(), "model produced non-finite scores");
        Prediction::new(digit as i32, confidence.clamp(0.0, 1.0))
    }
}
