use anyhow::{bail, Result};

pub const CANVAS_WIDTH: u32 = 280;
pub const CANVAS_HEIGHT: u32 = 280;
/// Pen width on the 280x280 canvas; downscaled 10:1 it stays legible at 28x28.
pub const STROKE_WIDTH: u32 = 20;
pub const MODEL_INPUT_SIZE: u32 = 28;
pub const NUM_CLASSES: usize = 10;

pub type Point = (i32, i32);

/// Single channel 8-bit bitmap, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize)],
        }
    }

    pub fn canvas() -> Self {
        Self::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn fill(&mut self, value: u8) {
        self.pixels.fill(value);
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|px| *px == 0)
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|px| **px != 0).count()
    }
}

/// Channel-major `f32` volume fed to a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != channels * height * width {
            bail!(
                "tensor data has {} values, expected {channels}x{height}x{width}",
                data.len()
            );
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn at(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[(channel * self.height + y) * self.width + x]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PenState {
    pub is_down: bool,
    pub last_point: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    digit: i32,
    confidence: f32,
}

impl Prediction {
    pub const NONE: Prediction = Prediction {
        digit: -1,
        confidence: 0.0,
    };

    pub fn new(digit: i32, confidence: f32) -> Result<Self> {
        if !(-1..NUM_CLASSES as i32).contains(&digit) {
            bail!("predicted class {digit} is outside the digit range");
        }
        if !(0.0..=1.0).contains(&confidence) {
            bail!("confidence {confidence} is outside [0, 1]");
        }
        Ok(Self { digit, confidence })
    }

    pub fn digit(&self) -> i32 {
        self.digit
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn is_none(&self) -> bool {
        self.digit == -1
    }
}

impl Default for Prediction {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_blank() {
        let grid = Grid::canvas();
        assert_eq!(grid.size(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert!(grid.is_blank());
        assert_eq!(grid.get(-1, 0), None);
        assert_eq!(grid.get(0, CANVAS_HEIGHT as i32), None);
    }

    #[test]
    fn prediction_rejects_out_of_range_values() {
        assert!(Prediction::new(10, 0.5).is_err());
        assert!(Prediction::new(-2, 0.5).is_err());
        assert!(Prediction::new(3, 1.01).is_err());
        assert!(Prediction::new(3, f32::NAN).is_err());
        let pred = Prediction::new(9, 1.0).expect("valid prediction");
        assert_eq!(pred.digit(), 9);
    }

    #[test]
    fn default_prediction_means_no_prediction_yet() {
        let pred = Prediction::default();
        assert!(pred.is_none());
        assert_eq!(pred.confidence(), 0.0);
    }
}
