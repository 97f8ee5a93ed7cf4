use serde::{Serialize, Deserialize};

use crate::layers::{Conv2d, ConvGradients, Layer, LayerGradients};

/// Plain mini-batch SGD. The learning rate is mutable so the training
/// controller can decay it between epochs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Applies one SGD weight update to a dense layer.
    pub fn step(&self, layer: &mut Layer, grads: &LayerGradients) {
        layer.apply_gradients(grads, self.learning_rate);
    }

    pub fn step_conv(&self, conv: &mut Conv2d, grads: &ConvGradients) {
        conv.apply_gradients(grads, self.learning_rate);
    }
}
