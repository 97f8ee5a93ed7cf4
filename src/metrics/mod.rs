//! Scalar evaluation metrics over a batch of predictions.

use crate::error::{Error, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::{argmax, Matrix};

/// True classes, either as one-hot rows or integer labels.
#[derive(Debug, Clone, Copy)]
pub enum GroundTruth<'a> {
    OneHot(&'a Matrix),
    Labels(&'a [usize]),
}

impl GroundTruth<'_> {
    pub fn len(&self) -> usize {
        match self {
            GroundTruth::OneHot(m) => m.rows,
            GroundTruth::Labels(l) => l.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn class_of(&self, i: usize) -> usize {
        match self {
            GroundTruth::OneHot(m) => argmax(m.row(i)),
            GroundTruth::Labels(l) => l[i],
        }
    }

    fn check_against(&self, predictions: &Matrix) -> Result<()> {
        if predictions.rows != self.len() {
            return Err(Error::shape("ground truth examples", predictions.rows, self.len()));
        }
        if let GroundTruth::OneHot(m) = self {
            if m.rows > 0 && m.cols != predictions.cols {
                return Err(Error::shape("one-hot classes", predictions.cols, m.cols));
            }
        }
        Ok(())
    }
}

/// Fraction of rows whose arg-max score equals the true class, in [0, 1].
/// An empty batch scores 0.0.
pub fn accuracy(predictions: &Matrix, truth: GroundTruth<'_>) -> Result<f64> {
    truth.check_against(predictions)?;
    if truth.is_empty() {
        return Ok(0.0);
    }
    let correct = (0..predictions.rows)
        .filter(|&i| argmax(predictions.row(i)) == truth.class_of(i))
        .count();
    Ok(correct as f64 / predictions.rows as f64)
}

/// Mean softmax cross-entropy; `predictions` must hold probabilities.
pub fn mean_cross_entropy(predictions: &Matrix, truth: GroundTruth<'_>) -> Result<f64> {
    truth.check_against(predictions)?;
    if truth.is_empty() {
        return Ok(0.0);
    }
    let total: f64 = (0..predictions.rows)
        .map(|i| {
            let mut one_hot = vec![0.0; predictions.cols];
            if let Some(slot) = one_hot.get_mut(truth.class_of(i)) {
                *slot = 1.0;
            }
            CrossEntropyLoss::loss(predictions.row(i), &one_hot)
        })
        .sum();
    Ok(total / predictions.rows as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> Matrix {
        Matrix::from_data(vec![
            vec![0.9, 0.1, 0.0],
            vec![0.2, 0.5, 0.3],
            vec![0.1, 0.1, 0.8],
            vec![0.6, 0.3, 0.1],
        ])
    }

    #[test]
    fn counts_argmax_matches() {
        let acc = accuracy(&scores(), GroundTruth::Labels(&[0, 1, 1, 0])).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn one_hot_and_labels_agree() {
        let one_hot = Matrix::from_data(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
        ]);
        let a = accuracy(&scores(), GroundTruth::OneHot(&one_hot)).unwrap();
        let b = accuracy(&scores(), GroundTruth::Labels(&[0, 1, 1, 0])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invariant_under_joint_permutation() {
        let labels = [0, 1, 1, 0];
        let base = accuracy(&scores(), GroundTruth::Labels(&labels)).unwrap();

        let perm = [2, 0, 3, 1];
        let preds = Matrix::from_data(perm.iter().map(|&i| scores().row(i).to_vec()).collect());
        let permuted: Vec<usize> = perm.iter().map(|&i| labels[i]).collect();
        assert_eq!(accuracy(&preds, GroundTruth::Labels(&permuted)).unwrap(), base);
    }

    #[test]
    fn mismatched_counts_fail() {
        let err = accuracy(&scores(), GroundTruth::Labels(&[0, 1])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn empty_batch_scores_zero() {
        assert_eq!(accuracy(&Matrix::zeros(0, 0), GroundTruth::Labels(&[])).unwrap(), 0.0);
    }

    #[test]
    fn cross_entropy_prefers_confident_truth() {
        let confident = mean_cross_entropy(&scores(), GroundTruth::Labels(&[0, 1, 2, 0])).unwrap();
        let wrong = mean_cross_entropy(&scores(), GroundTruth::Labels(&[2, 2, 0, 2])).unwrap();
        assert!(confident < wrong);
    }
}
