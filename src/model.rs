//! The capability set the training controller and inference gateway need
//! from a classifier. Architecture details stay behind this trait.

use crate::data::batcher::Minibatch;
use crate::data::dataset::ImageShape;
use crate::error::Result;
use crate::math::matrix::Matrix;

pub trait Model {
    /// Shape every input image must have.
    fn input_shape(&self) -> ImageShape;

    fn num_classes(&self) -> usize;

    /// Class probabilities for each row of `images` (one flattened image per row).
    ///
    /// Fails with `ShapeMismatch` if the row width differs from `input_shape().len()`.
    fn forward(&mut self, images: &Matrix) -> Result<Matrix>;

    /// One gradient step on `batch`; returns the mean training loss.
    ///
    /// An error means the update could not be completed (for example the
    /// parameters became non-finite).
    fn backward_and_update(&mut self, batch: &Minibatch) -> Result<f64>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, rate: f64);

    /// Serialized parameters; the format is owned by the implementation.
    fn export_parameters(&self) -> Result<Vec<u8>>;

    /// Replaces the parameters with a blob from `export_parameters`.
    fn import_parameters(&mut self, blob: &[u8]) -> Result<()>;
}
