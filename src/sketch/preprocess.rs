use crate::sketch::model::{Grid, Tensor, MODEL_INPUT_SIZE};
use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;

pub const MNIST_MEAN: f32 = 0.1307;
pub const MNIST_STD: f32 = 0.3081;

pub trait Preprocessor: Send {
    fn process(&self, grid: &Grid) -> Result<Tensor>;
}

/// Bilinear downscale to 28x28, then the MNIST scaling used in training.
#[derive(Debug, Clone, Copy)]
pub struct MnistPreprocessor {
    size: u32,
    mean: f32,
    std: f32,
}

impl MnistPreprocessor {
    pub fn new() -> Self {
        Self {
            size: MODEL_INPUT_SIZE,
            mean: MNIST_MEAN,
            std: MNIST_STD,
        }
    }

    pub fn normalize(&self, value: u8) -> f32 {
        (value as f32 / 255.0 - self.mean) / self.std
    }
}

impl Default for MnistPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor for MnistPreprocessor {
    fn process(&self, grid: &Grid) -> Result<Tensor> {
        let image = GrayImage::from_raw(grid.width(), grid.height(), grid.pixels().to_vec())
            .ok_or_else(|| {
                anyhow!(
                    "canvas buffer does not match its {}x{} size",
                    grid.width(),
                    grid.height()
                )
            })?;
        let resized = imageops::resize(&image, self.size, self.size, FilterType::Triangle);
        let data = resized
            .as_raw()
            .iter()
            .map(|value| self.normalize(*value))
            .collect();
        Tensor::new(1, self.size as usize, self.size as usize, data)
    }
}
