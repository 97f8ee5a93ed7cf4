use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;

/// 2-D convolution, stride 1, zero "same" padding (`kernel / 2`).
///
/// Kernels are stored as a `filters × (in_channels·k·k)` matrix; tensors are
/// flat channel-major buffers (`c, y, x`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub filters: usize,
    pub kernel: usize,
    pub height: usize,
    pub width: usize,
    pub kernels: Matrix,
    pub biases: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ConvGradients {
    pub kernels: Matrix,
    pub biases: Vec<f64>,
}

impl ConvGradients {
    pub fn zeros_for(conv: &Conv2d) -> ConvGradients {
        ConvGradients {
            kernels: Matrix::zeros(conv.kernels.rows, conv.kernels.cols),
            biases: vec![0.0; conv.filters],
        }
    }
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        filters: usize,
        kernel: usize,
        height: usize,
        width: usize,
        rng: &mut R,
    ) -> Conv2d {
        let fan_in = in_channels * kernel * kernel;
        Conv2d {
            in_channels,
            filters,
            kernel,
            height,
            width,
            kernels: Matrix::he(filters, fan_in, fan_in, rng),
            biases: vec![0.0; filters],
        }
    }

    pub fn output_len(&self) -> usize {
        self.filters * self.height * self.width
    }

    /// Visits every (kernel tap, input offset, output offset) for filter `f`,
    /// skipping taps that fall into the zero padding.
    fn for_each_tap<F: FnMut(usize, usize, usize)>(&self, mut visit: F) {
        let pad = (self.kernel / 2) as isize;
        let (h, w) = (self.height as isize, self.width as isize);
        for c in 0..self.in_channels {
            for ky in 0..self.kernel {
                for kx in 0..self.kernel {
                    let tap = (c * self.kernel + ky) * self.kernel + kx;
                    for y in 0..h {
                        let iy = y + ky as isize - pad;
                        if iy < 0 || iy >= h {
                            continue;
                        }
                        for x in 0..w {
                            let ix = x + kx as isize - pad;
                            if ix < 0 || ix >= w {
                                continue;
                            }
                            let input_at = (c as isize * h + iy) * w + ix;
                            let output_at = y * w + x;
                            visit(tap, input_at as usize, output_at as usize);
                        }
                    }
                }
            }
        }
    }

    /// Pre-activation feature maps, length `output_len()`.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let plane = self.height * self.width;
        let mut out = vec![0.0; self.output_len()];
        for f in 0..self.filters {
            let kernel = self.kernels.row(f);
            let maps = &mut out[f * plane..(f + 1) * plane];
            maps.iter_mut().for_each(|v| *v = self.biases[f]);
            self.for_each_tap(|tap, i, o| maps[o] += kernel[tap] * input[i]);
        }
        out
    }

    /// Accumulates parameter gradients given ∂L/∂(pre-activation output).
    /// This layer is always first in the stack, so no input gradient is produced.
    pub fn accumulate_gradients(&self, input: &[f64], grad_out: &[f64], grads: &mut ConvGradients) {
        let plane = self.height * self.width;
        for f in 0..self.filters {
            let g = &grad_out[f * plane..(f + 1) * plane];
            grads.biases[f] += g.iter().sum::<f64>();
            let row = &mut grads.kernels.data[f];
            self.for_each_tap(|tap, i, o| row[tap] += g[o] * input[i]);
        }
    }

    pub fn apply_gradients(&mut self, grads: &ConvGradients, lr: f64) {
        for (k_row, g_row) in self.kernels.data.iter_mut().zip(grads.kernels.data.iter()) {
            for (k, g) in k_row.iter_mut().zip(g_row.iter()) {
                *k -= lr * g;
            }
        }
        for (b, g) in self.biases.iter_mut().zip(grads.biases.iter()) {
            *b -= lr * g;
        }
    }

    pub fn is_finite(&self) -> bool {
        self.kernels.is_finite() && self.biases.iter().all(|b| b.is_finite())
    }
}

/// 2×2 max-pool, stride 2, over `channels` planes of `height × width`.
/// Returns pooled values and, for each pooled cell, the flat index of the
/// winning input so gradients can be routed back.
pub fn max_pool_2x2(input: &[f64], channels: usize, height: usize, width: usize) -> (Vec<f64>, Vec<usize>) {
    let (ph, pw) = (height / 2, width / 2);
    let mut pooled = Vec::with_capacity(channels * ph * pw);
    let mut winners = Vec::with_capacity(channels * ph * pw);
    for c in 0..channels {
        let base = c * height * width;
        for py in 0..ph {
            for px in 0..pw {
                let mut best_at = base + (2 * py) * width + 2 * px;
                for (dy, dx) in [(0, 1), (1, 0), (1, 1)] {
                    let at = base + (2 * py + dy) * width + 2 * px + dx;
                    if input[at] > input[best_at] {
                        best_at = at;
                    }
                }
                pooled.push(input[best_at]);
                winners.push(best_at);
            }
        }
    }
    (pooled, winners)
}
