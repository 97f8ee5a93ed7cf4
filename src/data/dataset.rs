use std::fmt;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Height × width × channels of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub const MNIST: ImageShape = ImageShape { height: 28, width: 28, channels: 1 };

    pub fn new(height: usize, width: usize, channels: usize) -> ImageShape {
        ImageShape { height, width, channels }
    }

    /// Number of values in one flattened image.
    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// One image tensor, flattened channel-major with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub shape: ImageShape,
    pub pixels: Vec<f64>,
}

impl Image {
    pub fn new(shape: ImageShape, pixels: Vec<f64>) -> Result<Image> {
        if pixels.len() != shape.len() {
            return Err(Error::shape("image pixels", shape.len(), pixels.len()));
        }
        Ok(Image { shape, pixels })
    }
}

/// Ordered, in-memory labeled dataset. Every image has `shape`; every label
/// is below `num_classes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    shape: ImageShape,
    num_classes: usize,
    images: Vec<Vec<f64>>,
    labels: Vec<usize>,
}

impl Dataset {
    pub fn new(
        shape: ImageShape,
        num_classes: usize,
        images: Vec<Vec<f64>>,
        labels: Vec<usize>,
    ) -> Result<Dataset> {
        if images.len() != labels.len() {
            return Err(Error::shape("dataset labels", images.len(), labels.len()));
        }
        if let Some((i, img)) = images.iter().enumerate().find(|(_, img)| img.len() != shape.len()) {
            return Err(Error::ShapeMismatch {
                context: "dataset image",
                expected: format!("{} values ({shape})", shape.len()),
                actual: format!("{} values at index {i}", img.len()),
            });
        }
        if let Some((i, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= num_classes) {
            return Err(Error::InvalidInput(format!(
                "label {label} at index {i} is out of range for {num_classes} classes"
            )));
        }
        Ok(Dataset { shape, num_classes, images, labels })
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image(&self, i: usize) -> &[f64] {
        &self.images[i]
    }

    pub fn label(&self, i: usize) -> usize {
        self.labels[i]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Returns a copy reordered by a seeded permutation. Batching is always
    /// in dataset order, so this is the only place order is randomized.
    pub fn shuffled(&self, seed: u64) -> Dataset {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        Dataset {
            shape: self.shape,
            num_classes: self.num_classes,
            images: order.iter().map(|&i| self.images[i].clone()).collect(),
            labels: order.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Keeps the first `len - n` examples and returns the last `n` as a new
    /// dataset. `n` is clamped to the dataset size.
    pub fn split_off(&mut self, n: usize) -> Dataset {
        let at = self.len().saturating_sub(n);
        Dataset {
            shape: self.shape,
            num_classes: self.num_classes,
            images: self.images.split_off(at),
            labels: self.labels.split_off(at),
        }
    }
}
