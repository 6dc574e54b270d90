//! Exact t-SNE for small point clouds.
//!
//! Quadratic in the number of points, so callers cap the input size. The
//! optimiser follows the usual recipe: per-point Gaussian bandwidths found by
//! bisection on the perplexity, early exaggeration, momentum with adaptive
//! gains.

use ndarray::{Array2, ArrayView2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::metrics::PredictionBatch;
use crate::viz::VizError;

const MACHINE_EPS: f64 = 1e-12;
const BISECTION_STEPS: usize = 100;
const ENTROPY_TOL: f64 = 1e-5;
const MIN_GAIN: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct TsneParams {
    pub perplexity: f64,
    pub n_iter: usize,
    pub early_exaggeration: f64,
    pub exaggeration_iters: usize,
    pub seed: u64,
    /// Examples kept per layer before projecting (each contributes K points).
    pub max_examples: usize,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            n_iter: 1000,
            early_exaggeration: 12.0,
            exaggeration_iters: 250,
            seed: 42,
            max_examples: 200,
        }
    }
}

/// 2-D embedding of one layer's activations, one point per (example, head).
#[derive(Debug, Clone)]
pub struct Embedding {
    pub title: String,
    pub points: Array2<f64>,
    pub heads: Vec<usize>,
}

/// Flattens `(N, K, D)` hidden activations into `N*K` points labelled by head
/// and projects them.
pub fn embed_layer(
    title: &str,
    layer: &PredictionBatch,
    params: &TsneParams,
) -> Result<Embedding, VizError> {
    let n = layer.n_examples().min(params.max_examples.max(1));
    let k = layer.n_heads();
    let d = layer.n_channels();
    let view = layer.view();

    let mut data = Array2::<f64>::zeros((n * k, d));
    let mut heads = Vec::with_capacity(n * k);
    for ex in 0..n {
        for head in 0..k {
            let row = ex * k + head;
            for c in 0..d {
                data[[row, c]] = view[[ex, head, c]] as f64;
            }
            heads.push(head);
        }
    }

    let points = tsne(data.view(), params)?;
    Ok(Embedding {
        title: title.to_string(),
        points,
        heads,
    })
}

pub fn tsne(data: ArrayView2<'_, f64>, params: &TsneParams) -> Result<Array2<f64>, VizError> {
    let n = data.nrows();
    if n == 0 || data.ncols() == 0 {
        return Err(VizError::InvalidInput("t-SNE needs at least one point".to_string()));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(VizError::InvalidInput("t-SNE input contains non-finite values".to_string()));
    }
    if n == 1 {
        return Ok(Array2::zeros((1, 2)));
    }

    let perplexity = params.perplexity.min((n - 1) as f64 / 3.0).max(1.0);
    let p = joint_probabilities(&squared_distances(data), perplexity);

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut y = Array2::from_shape_simple_fn((n, 2), || {
        let z: f64 = StandardNormal.sample(&mut rng);
        1e-4 * z
    });
    let mut update = Array2::<f64>::zeros((n, 2));
    let mut gains = Array2::<f64>::ones((n, 2));
    let lr = (n as f64 / params.early_exaggeration / 4.0).max(50.0);

    for iter in 0..params.n_iter {
        let (exaggeration, momentum) = if iter < params.exaggeration_iters {
            (params.early_exaggeration, 0.5)
        } else {
            (1.0, 0.8)
        };
        let grad = gradient(&p, &y, exaggeration);

        for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
            if *g * *u < 0.0 {
                *gain += 0.2;
            } else {
                *gain = (*gain * 0.8).max(MIN_GAIN);
            }
            *u = momentum * *u - lr * *gain * g;
        }
        y += &update;

        if let Some(mean) = y.mean_axis(Axis(0)) {
            y -= &mean;
        }
    }

    Ok(y)
}

fn squared_distances(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = data.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let dist: f64 = data
                .row(i)
                .iter()
                .zip(data.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            d[[i, j]] = dist;
            d[[j, i]] = dist;
        }
    }
    d
}

/// Symmetrised affinities `(P + Pᵀ) / 2n` with per-row bandwidths matched to
/// `perplexity`.
fn joint_probabilities(dist: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = dist.nrows();
    let target = perplexity.ln();
    let mut p = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        let mut beta = 1.0f64;
        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        let mut row = vec![0f64; n];

        for _ in 0..BISECTION_STEPS {
            let mut sum = 0f64;
            for j in 0..n {
                row[j] = if j == i { 0.0 } else { (-dist[[i, j]] * beta).exp() };
                sum += row[j];
            }
            let sum = sum.max(MACHINE_EPS);
            let mut weighted = 0f64;
            for j in 0..n {
                row[j] /= sum;
                weighted += dist[[i, j]] * row[j];
            }
            let entropy = sum.ln() + beta * weighted;
            let diff = entropy - target;
            if diff.abs() < ENTROPY_TOL {
                break;
            }
            if diff > 0.0 {
                lo = beta;
                beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
            } else {
                hi = beta;
                beta = if lo.is_finite() { (beta + lo) / 2.0 } else { beta / 2.0 };
            }
        }

        for j in 0..n {
            p[[i, j]] = row[j];
        }
    }

    let denom = 2.0 * n as f64;
    let mut joint = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            joint[[i, j]] = ((p[[i, j]] + p[[j, i]]) / denom).max(MACHINE_EPS);
        }
    }
    joint
}

fn gradient(p: &Array2<f64>, y: &Array2<f64>, exaggeration: f64) -> Array2<f64> {
    let n = y.nrows();
    let mut num = Array2::<f64>::zeros((n, n));
    let mut total = 0f64;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = y[[i, 0]] - y[[j, 0]];
            let dy = y[[i, 1]] - y[[j, 1]];
            let q = 1.0 / (1.0 + dx * dx + dy * dy);
            num[[i, j]] = q;
            num[[j, i]] = q;
            total += 2.0 * q;
        }
    }
    let total = total.max(MACHINE_EPS);

    let mut grad = Array2::<f64>::zeros((n, 2));
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (num[[i, j]] / total).max(MACHINE_EPS);
            let mult = 4.0 * (exaggeration * p[[i, j]] - q) * num[[i, j]];
            grad[[i, 0]] += mult * (y[[i, 0]] - y[[j, 0]]);
            grad[[i, 1]] += mult * (y[[i, 1]] - y[[j, 1]]);
        }
    }
    grad
}

#[cfg(test)]
#[path = "../../tests/src_inline/viz/tsne.rs"]
mod tests;
