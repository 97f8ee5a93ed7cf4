use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer. Activations of the most recent forward pass are
/// cached for backprop and are not serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer{
    pub size: usize,
    #[serde(skip)]
    pub neurons: Matrix,
    #[serde(skip)]
    pre_neurons: Matrix,  // pre-activation values (z = Wx + b) needed for correct derivative
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction
}

/// Gradients for one layer, accumulated over a minibatch.
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl LayerGradients {
    pub fn zeros_for(layer: &Layer) -> LayerGradients {
        LayerGradients {
            weights: Matrix::zeros(layer.weights.rows, layer.weights.cols),
            biases: Matrix::zeros(layer.biases.rows, layer.biases.cols),
        }
    }

    pub fn accumulate(&mut self, other: &LayerGradients) {
        self.weights.add_assign(&other.weights);
        self.biases.add_assign(&other.biases);
    }
}

impl Layer {
    /// He init for ReLU layers, Xavier for everything else. Biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = match activation {
            ActivationFunction::ReLU => Matrix::he(input_size, size, input_size, rng),
            _ => Matrix::xavier(input_size, size, input_size, rng),
        };

        Layer {
            size,
            neurons: Matrix::zeros(1, size),
            pre_neurons: Matrix::zeros(1, size),
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn feed_from(&mut self, input: &[f64]) -> Vec<f64> {
        let mut z = &Matrix::row_vector(input.to_vec()) * &self.weights;
        z.add_assign(&self.biases);
        let a = self.activator.apply_row(z.row(0));
        self.pre_neurons = z;
        self.neurons = Matrix::row_vector(a.clone());
        a
    }

    /// Returns this layer's gradients and ∂L/∂input for the layer below.
    /// `next_layer_delta` is ∂L/∂a for this layer (error in activation space).
    pub fn compute_gradients(
        &self,
        next_layer_delta: &Matrix,
        inputs: &Matrix,
    ) -> (LayerGradients, Vec<f64>) {
        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        let layer_delta: Vec<f64> = next_layer_delta.row(0).iter()
            .zip(self.pre_neurons.row(0).iter())
            .map(|(d, &z)| d * self.activator.derivative(z))
            .collect();
        let layer_delta = Matrix::row_vector(layer_delta);

        let weights = &inputs.transpose() * &layer_delta;

        // δ_in = δ · Wᵀ without materializing the transpose.
        let input_delta = self.weights.data.iter()
            .map(|w_row| w_row.iter().zip(layer_delta.row(0)).map(|(w, d)| w * d).sum())
            .collect();

        (LayerGradients { weights, biases: layer_delta }, input_delta)
    }

    /// Applies pre-computed gradients scaled by lr.
    pub fn apply_gradients(&mut self, grads: &LayerGradients, lr: f64) {
        descend(&mut self.weights, &grads.weights, lr);
        descend(&mut self.biases, &grads.biases, lr);
    }

    pub fn is_finite(&self) -> bool {
        self.weights.is_finite() && self.biases.is_finite()
    }
}

fn descend(param: &mut Matrix, grad: &Matrix, lr: f64) {
    for (p_row, g_row) in param.data.iter_mut().zip(grad.data.iter()) {
        for (p, g) in p_row.iter_mut().zip(g_row.iter()) {
            *p -= lr * g;
        }
    }
}
