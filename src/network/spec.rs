use serde::{Serialize, Deserialize};

use crate::data::dataset::ImageShape;

/// Architecture of the convolutional classifier.
///
/// Saved alongside the weights so a serving process can rebuild an empty
/// model of the right shape before importing a checkpoint.
///
/// Fields:
/// - `input`       — expected image shape
/// - `filters`     — feature maps produced by the 3×3 (or `kernel`) convolution
/// - `kernel`      — square kernel size; odd so "same" padding is symmetric
/// - `hidden`      — neurons in the dense ReLU layer after pooling
/// - `num_classes` — softmax outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvNetSpec {
    pub input: ImageShape,
    pub filters: usize,
    pub kernel: usize,
    pub hidden: usize,
    pub num_classes: usize,
}

impl Default for ConvNetSpec {
    fn default() -> Self {
        ConvNetSpec {
            input: ImageShape::MNIST,
            filters: 8,
            kernel: 3,
            hidden: 64,
            num_classes: 10,
        }
    }
}

impl ConvNetSpec {
    /// Width of the flattened, 2×2-pooled feature maps.
    pub fn pooled_len(&self) -> usize {
        self.filters * (self.input.height / 2) * (self.input.width / 2)
    }
}
