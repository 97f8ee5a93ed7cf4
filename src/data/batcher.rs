use crate::data::dataset::{Dataset, ImageShape};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// A group of dataset examples stacked for one update step.
///
/// `images` has one row per example (`shape.len()` columns); `labels` is the
/// matching one-hot matrix. Rows follow `indices` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Minibatch {
    pub indices: Vec<usize>,
    pub shape: ImageShape,
    pub images: Matrix,
    pub labels: Matrix,
}

impl Minibatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Materializes the examples at `indices` into a minibatch.
///
/// Pure: identical indices always give an identical batch.
///
/// # Panics
/// Panics if an index is out of range for `dataset`.
pub fn make_minibatch(dataset: &Dataset, indices: &[usize]) -> Minibatch {
    let images = indices.iter().map(|&i| dataset.image(i).to_vec()).collect();
    let labels = indices.iter()
        .map(|&i| {
            let mut one_hot = vec![0.0; dataset.num_classes()];
            one_hot[dataset.label(i)] = 1.0;
            one_hot
        })
        .collect();

    Minibatch {
        indices: indices.to_vec(),
        shape: dataset.shape(),
        images: Matrix::from_data(images),
        labels: Matrix::from_data(labels),
    }
}

/// Splits `dataset` into consecutive minibatches of `batch_size`, in dataset
/// order. Only the final batch may be shorter.
///
/// Batches are materialized lazily as the iterator advances.
pub fn partition(dataset: &Dataset, batch_size: usize) -> Result<Minibatches<'_>> {
    if batch_size == 0 {
        return Err(Error::Config("batch_size must be at least 1".into()));
    }
    Ok(Minibatches { dataset, batch_size, next_start: 0 })
}

/// Iterator returned by [`partition`].
#[derive(Debug, Clone)]
pub struct Minibatches<'a> {
    dataset: &'a Dataset,
    batch_size: usize,
    next_start: usize,
}

impl Iterator for Minibatches<'_> {
    type Item = Minibatch;

    fn next(&mut self) -> Option<Minibatch> {
        let n = self.dataset.len();
        if self.next_start >= n {
            return None;
        }
        let end = (self.next_start + self.batch_size).min(n);
        let indices: Vec<usize> = (self.next_start..end).collect();
        self.next_start = end;
        Some(make_minibatch(self.dataset, &indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.next_start);
        let batches = remaining.div_ceil(self.batch_size);
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for Minibatches<'_> {}
