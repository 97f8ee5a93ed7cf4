use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    layers::dense::{Layer, LayerGradients},
    math::matrix::Matrix,
    optim::sgd::Sgd,
};

/// Stack of dense layers. Serves as the classifier head of [`ConvNet`].
///
/// [`ConvNet`]: crate::network::convnet::ConvNet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    /// Builds a network from (size, input_size, activation) tuples.
    pub fn new<R: Rng + ?Sized>(
        layer_specs: &[(usize, usize, ActivationFunction)],
        rng: &mut R,
    ) -> Network {
        let layers = layer_specs.iter()
            .map(|&(size, input_size, activation)| Layer::new(size, input_size, activation, rng))
            .collect();
        Network { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Forward pass; stores activations in each layer for backprop.
    pub fn forward(&mut self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &mut self.layers {
            current = layer.feed_from(&current);
        }
        current
    }

    /// Backward pass for the example last given to `forward`.
    ///
    /// `output_delta` is ∂L/∂output. Returns per-layer gradients (input →
    /// output order) and ∂L/∂input for whatever feeds this network.
    pub fn backward(&self, input: &[f64], output_delta: Vec<f64>) -> (Vec<LayerGradients>, Vec<f64>) {
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut delta = output_delta;

        for i in (0..self.layers.len()).rev() {
            let input_for_layer = if i == 0 {
                Matrix::row_vector(input.to_vec())
            } else {
                self.layers[i - 1].neurons.clone()
            };
            let (layer_grads, input_delta) = self.layers[i]
                .compute_gradients(&Matrix::row_vector(delta), &input_for_layer);
            grads.push(layer_grads);
            delta = input_delta;
        }

        grads.reverse();
        (grads, delta)
    }

    pub fn zero_gradients(&self) -> Vec<LayerGradients> {
        self.layers.iter().map(LayerGradients::zeros_for).collect()
    }

    /// Applies averaged gradients (`scale` is typically `1 / batch_len`).
    pub fn apply(&mut self, grads: &[LayerGradients], optimizer: &Sgd, scale: f64) {
        for (layer, g) in self.layers.iter_mut().zip(grads) {
            let averaged = LayerGradients {
                weights: g.weights.map(|x| x * scale),
                biases: g.biases.map(|x| x * scale),
            };
            optimizer.step(layer, &averaged);
        }
    }

    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(Layer::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::cross_entropy::CrossEntropyLoss;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn input_gradient_matches_finite_difference() {
        let mut net = Network::new(
            &[(4, 3, ActivationFunction::ReLU), (2, 4, ActivationFunction::Softmax)],
            &mut StdRng::seed_from_u64(11),
        );
        let input = vec![0.4, -0.2, 0.9];
        let target = [0.0, 1.0];

        let out = net.forward(&input);
        let (_, d_input) = net.backward(&input, CrossEntropyLoss::derivative(&out, &target));

        let eps = 1e-6;
        let mut bumped = input.clone();
        bumped[2] += eps;
        let base = CrossEntropyLoss::loss(&net.forward(&input), &target);
        let moved = CrossEntropyLoss::loss(&net.forward(&bumped), &target);
        assert!(((moved - base) / eps - d_input[2]).abs() < 1e-4);
    }

    #[test]
    fn sgd_step_reduces_loss_on_one_example() {
        let mut net = Network::new(
            &[(6, 2, ActivationFunction::ReLU), (3, 6, ActivationFunction::Softmax)],
            &mut StdRng::seed_from_u64(2),
        );
        let input = [0.5, 1.0];
        let target = [0.0, 0.0, 1.0];
        let before = CrossEntropyLoss::loss(&net.forward(&input), &target);

        let out = net.forward(&input);
        let (grads, _) = net.backward(&input, CrossEntropyLoss::derivative(&out, &target));
        net.apply(&grads, &Sgd::new(0.1), 1.0);

        let after = CrossEntropyLoss::loss(&net.forward(&input), &target);
        assert!(after < before);
    }
}
