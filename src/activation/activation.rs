use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    Identity,
    /// Vector-valued; applied across a whole row by `apply_row`. Paired with
    /// cross-entropy, whose gradient already folds in the softmax Jacobian.
    Softmax,
}

impl ActivationFunction {
    /// Applies the activation to one example's pre-activations.
    pub fn apply_row(&self, z: &[f64]) -> Vec<f64> {
        match self {
            ActivationFunction::ReLU => z.iter().map(|&x| x.max(0.0)).collect(),
            ActivationFunction::Identity => z.to_vec(),
            ActivationFunction::Softmax => softmax(z),
        }
    }

    /// Element-wise derivative at pre-activation `x`.
    ///
    /// `Softmax` returns `1.0` so the combined softmax + cross-entropy delta
    /// (`predicted - expected`) passes through `compute_gradients` unchanged.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Softmax => 1.0,
        }
    }
}

/// Numerically stable softmax (max-shifted).
pub fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one_for_large_logits() {
        let p = softmax(&[1000.0, 1001.0, 999.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[1] > p[0] && p[0] > p[2]);
    }

    #[test]
    fn relu_clamps_negatives() {
        assert_eq!(ActivationFunction::ReLU.apply_row(&[-1.0, 0.5]), vec![0.0, 0.5]);
        assert_eq!(ActivationFunction::ReLU.derivative(-0.1), 0.0);
    }
}
