use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    data::{batcher::Minibatch, dataset::ImageShape},
    error::{Error, Result},
    layers::conv::{max_pool_2x2, Conv2d, ConvGradients},
    loss::cross_entropy::CrossEntropyLoss,
    math::matrix::Matrix,
    model::Model,
    network::{network::Network, spec::ConvNetSpec},
    optim::sgd::Sgd,
};

/// conv → ReLU → 2×2 max-pool → dense ReLU → dense softmax.
#[derive(Debug, Clone)]
pub struct ConvNet {
    spec: ConvNetSpec,
    conv: Conv2d,
    head: Network,
    optimizer: Sgd,
}

/// Serialized form of the trainable parameters.
#[derive(Serialize, Deserialize)]
struct Parameters {
    spec: ConvNetSpec,
    conv: Conv2d,
    head: Network,
}

/// Per-example intermediates kept between forward and backward.
struct Trace {
    conv_pre: Vec<f64>,
    pooled: Vec<f64>,
    winners: Vec<usize>,
    probs: Vec<f64>,
}

impl ConvNet {
    pub fn new<R: Rng + ?Sized>(spec: ConvNetSpec, learning_rate: f64, rng: &mut R) -> ConvNet {
        let conv = Conv2d::new(
            spec.input.channels,
            spec.filters,
            spec.kernel,
            spec.input.height,
            spec.input.width,
            rng,
        );
        let head = Network::new(
            &[
                (spec.hidden, spec.pooled_len(), ActivationFunction::ReLU),
                (spec.num_classes, spec.hidden, ActivationFunction::Softmax),
            ],
            rng,
        );
        ConvNet { spec, conv, head, optimizer: Sgd::new(learning_rate) }
    }

    pub fn spec(&self) -> &ConvNetSpec {
        &self.spec
    }

    fn check_width(&self, cols: usize) -> Result<()> {
        let expected = self.spec.input.len();
        if cols != expected {
            return Err(Error::ShapeMismatch {
                context: "model input",
                expected: format!("{expected} values ({})", self.spec.input),
                actual: format!("{cols} values"),
            });
        }
        Ok(())
    }

    fn trace(&mut self, image: &[f64]) -> Trace {
        let conv_pre = self.conv.forward(image);
        let activated = ActivationFunction::ReLU.apply_row(&conv_pre);
        let (pooled, winners) = max_pool_2x2(
            &activated,
            self.spec.filters,
            self.spec.input.height,
            self.spec.input.width,
        );
        let probs = self.head.forward(&pooled);
        Trace { conv_pre, pooled, winners, probs }
    }

    fn is_finite(&self) -> bool {
        self.conv.is_finite() && self.head.is_finite()
    }
}

impl Model for ConvNet {
    fn input_shape(&self) -> ImageShape {
        self.spec.input
    }

    fn num_classes(&self) -> usize {
        self.spec.num_classes
    }

    fn forward(&mut self, images: &Matrix) -> Result<Matrix> {
        if images.rows > 0 {
            self.check_width(images.cols)?;
        }
        let rows = images.data.iter().map(|img| self.trace(img).probs).collect();
        Ok(Matrix::from_data(rows))
    }

    fn backward_and_update(&mut self, batch: &Minibatch) -> Result<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }
        self.check_width(batch.images.cols)?;
        if batch.labels.cols != self.spec.num_classes {
            return Err(Error::shape("label classes", self.spec.num_classes, batch.labels.cols));
        }

        let mut head_grads = self.head.zero_gradients();
        let mut conv_grads = ConvGradients::zeros_for(&self.conv);
        let mut total_loss = 0.0;

        for (image, expected) in batch.images.data.iter().zip(batch.labels.data.iter()) {
            let t = self.trace(image);
            total_loss += CrossEntropyLoss::loss(&t.probs, expected);

            let (grads, d_pooled) = self.head.backward(&t.pooled, CrossEntropyLoss::derivative(&t.probs, expected));
            for (acc, g) in head_grads.iter_mut().zip(&grads) {
                acc.accumulate(g);
            }

            // Route pooled gradients back to the winning positions, then
            // through the ReLU mask.
            let mut d_conv = vec![0.0; self.conv.output_len()];
            for (&at, g) in t.winners.iter().zip(d_pooled) {
                if t.conv_pre[at] > 0.0 {
                    d_conv[at] += g;
                }
            }
            self.conv.accumulate_gradients(image, &d_conv, &mut conv_grads);
        }

        let mean_loss = total_loss / batch.len() as f64;
        if !mean_loss.is_finite() {
            return Err(Error::NonFinite(format!("training loss {mean_loss}")));
        }

        let scale = 1.0 / batch.len() as f64;
        self.head.apply(&head_grads, &self.optimizer, scale);
        conv_grads.kernels = conv_grads.kernels.map(|x| x * scale);
        conv_grads.biases.iter_mut().for_each(|b| *b *= scale);
        self.optimizer.step_conv(&mut self.conv, &conv_grads);

        if !self.is_finite() {
            return Err(Error::NonFinite("model parameters after update".into()));
        }
        Ok(mean_loss)
    }

    fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate
    }

    fn set_learning_rate(&mut self, rate: f64) {
        self.optimizer.set_learning_rate(rate);
    }

    fn export_parameters(&self) -> Result<Vec<u8>> {
        let params = Parameters {
            spec: self.spec,
            conv: self.conv.clone(),
            head: self.head.clone(),
        };
        serde_json::to_vec(&params)
            .map_err(|e| Error::InvalidInput(format!("cannot serialize parameters: {e}")))
    }

    fn import_parameters(&mut self, blob: &[u8]) -> Result<()> {
        let params: Parameters = serde_json::from_slice(blob)
            .map_err(|e| Error::InvalidInput(format!("malformed parameter blob: {e}")))?;
        if params.spec != self.spec {
            return Err(Error::shape("parameter architecture", format!("{:?}", self.spec), format!("{:?}", params.spec)));
        }
        if params.conv.output_len() != self.conv.output_len()
            || params.head.input_size() != self.spec.pooled_len()
            || params.head.output_size() != self.spec.num_classes
        {
            return Err(Error::shape(
                "parameter tensors",
                format!("{:?}", self.spec),
                "tensors that do not fit the declared architecture",
            ));
        }
        self.conv = params.conv;
        self.head = params.head;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::make_minibatch, dataset::Dataset};
    use rand::{rngs::StdRng, SeedableRng};

    fn small_spec() -> ConvNetSpec {
        ConvNetSpec {
            input: ImageShape::new(4, 4, 1),
            filters: 2,
            kernel: 3,
            hidden: 6,
            num_classes: 2,
        }
    }

    /// Class 0 lights the top half, class 1 the bottom half.
    fn halves() -> Dataset {
        let mut images = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let class = i % 2;
            let img = (0..16)
                .map(|p| if p / 8 == class { 1.0 } else { 0.05 * (i as f64) })
                .collect();
            images.push(img);
            labels.push(class);
        }
        Dataset::new(ImageShape::new(4, 4, 1), 2, images, labels).unwrap()
    }

    #[test]
    fn forward_rows_are_distributions() {
        let mut net = ConvNet::new(small_spec(), 0.1, &mut StdRng::seed_from_u64(0));
        let out = net.forward(&Matrix::from_data(vec![vec![0.5; 16], vec![0.0; 16]])).unwrap();
        assert_eq!((out.rows, out.cols), (2, 2));
        for row in &out.data {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn forward_rejects_wrong_width() {
        let mut net = ConvNet::new(small_spec(), 0.1, &mut StdRng::seed_from_u64(0));
        let err = net.forward(&Matrix::from_data(vec![vec![0.0; 15]])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn repeated_updates_reduce_loss() {
        let mut net = ConvNet::new(small_spec(), 0.5, &mut StdRng::seed_from_u64(4));
        let ds = halves();
        let batch = make_minibatch(&ds, &(0..ds.len()).collect::<Vec<_>>());
        let first = net.backward_and_update(&batch).unwrap();
        let mut last = first;
        for _ in 0..30 {
            last = net.backward_and_update(&batch).unwrap();
        }
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn exploding_learning_rate_is_reported() {
        let mut net = ConvNet::new(small_spec(), f64::INFINITY, &mut StdRng::seed_from_u64(4));
        let ds = halves();
        let err = net.backward_and_update(&make_minibatch(&ds, &[0, 1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::NonFinite(_)));
    }

    #[test]
    fn parameters_round_trip_into_fresh_model() {
        let mut trained = ConvNet::new(small_spec(), 0.5, &mut StdRng::seed_from_u64(1));
        let ds = halves();
        trained.backward_and_update(&make_minibatch(&ds, &[0, 1])).unwrap();
        let blob = trained.export_parameters().unwrap();

        let mut fresh = ConvNet::new(small_spec(), 0.5, &mut StdRng::seed_from_u64(99));
        fresh.import_parameters(&blob).unwrap();
        let sample = Matrix::from_data(vec![ds.image(3).to_vec()]);
        assert_eq!(fresh.forward(&sample).unwrap(), trained.forward(&sample).unwrap());
    }

    #[test]
    fn import_rejects_other_architecture() {
        let other = ConvNet::new(ConvNetSpec { hidden: 3, ..small_spec() }, 0.1, &mut StdRng::seed_from_u64(1));
        let mut net = ConvNet::new(small_spec(), 0.1, &mut StdRng::seed_from_u64(1));
        let err = net.import_parameters(&other.export_parameters().unwrap()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn learning_rate_is_adjustable() {
        let mut net = ConvNet::new(small_spec(), 0.1, &mut StdRng::seed_from_u64(1));
        net.set_learning_rate(0.01);
        assert_eq!(net.learning_rate(), 0.01);
    }
}
