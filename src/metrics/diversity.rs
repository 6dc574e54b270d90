//! Inter-head diversity reductions over a `PredictionBatch`.
//!
//! All reductions run per example and are averaged afterwards; nothing is
//! pooled across examples.
//!
//! `kl_dispersion` is not a textbook Kullback-Leibler divergence. It compares
//! every head against the across-head mean distribution and squares the
//! elementwise KL term before symmetrizing. Results stay comparable with
//! earlier experiment runs, but the number should not be read as a divergence
//! estimator. The `KL_FLOOR` is added once, to each head's softmax; the mean
//! distribution is not floored a second time, so values differ slightly from
//! runs that did so.

use ndarray::{Array2, ArrayView1};

use crate::metrics::rank::{average_ranks, is_constant, pearson};
use crate::metrics::{DegeneratePolicy, MetricsError, PredictionBatch};

pub const KL_FLOOR: f64 = 1e-6;

/// Mean Spearman correlation among heads, per example then over examples.
pub fn rank_correlation(
    preds: &PredictionBatch,
    policy: DegeneratePolicy,
) -> Result<f64, MetricsError> {
    let scores = spearman_per_example(preds, policy)?;
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Per-example Spearman summary. With two heads this is their correlation;
/// with more heads it is the mean of the full K×K matrix, diagonal included.
pub fn spearman_per_example(
    preds: &PredictionBatch,
    policy: DegeneratePolicy,
) -> Result<Vec<f64>, MetricsError> {
    require_two_heads(preds)?;
    let k = preds.n_heads();
    let mut out = Vec::with_capacity(preds.n_examples());
    for n in 0..preds.n_examples() {
        let example = preds.example(n);
        let ranked: Vec<Vec<f64>> = example.rows().into_iter().map(average_ranks).collect();
        let matrix = correlation_matrix(&ranked, policy, n)?;
        let score = if k == 2 {
            matrix[[0, 1]]
        } else {
            matrix.sum() / (k * k) as f64
        };
        out.push(score);
    }
    Ok(out)
}

/// Pearson correlation among heads, averaged element-wise over examples.
pub fn pairwise_correlation_matrix(
    preds: &PredictionBatch,
    policy: DegeneratePolicy,
) -> Result<Array2<f64>, MetricsError> {
    require_two_heads(preds)?;
    let k = preds.n_heads();
    let mut acc = Array2::<f64>::zeros((k, k));
    for n in 0..preds.n_examples() {
        let example = preds.example(n);
        let rows: Vec<Vec<f64>> = example.rows().into_iter().map(to_f64).collect();
        acc += &correlation_matrix(&rows, policy, n)?;
    }
    acc /= preds.n_examples() as f64;
    Ok(acc)
}

/// Symmetrized squared KL term between each head's softmax and the mean
/// softmax of all heads, averaged over examples, heads and channels.
pub fn kl_dispersion(preds: &PredictionBatch) -> Result<f64, MetricsError> {
    let (n_examples, k, c) = (preds.n_examples(), preds.n_heads(), preds.n_channels());
    let mut total = 0f64;
    for n in 0..n_examples {
        let example = preds.example(n);
        let probs: Vec<Vec<f64>> = example
            .rows()
            .into_iter()
            .map(|row| {
                let mut p = softmax(row);
                for v in &mut p {
                    *v += KL_FLOOR;
                }
                p
            })
            .collect();

        let mean: Vec<f64> = (0..c).map(|ch| channel_mean(&probs, ch)).collect();

        for p in &probs {
            for (&pc, &mc) in p.iter().zip(&mean) {
                let forward = kl_term(pc, mc);
                let backward = kl_term(mc, pc);
                total += 0.5 * (forward * forward + backward * backward);
            }
        }
    }
    Ok(total / (n_examples * k * c) as f64)
}

/// Across-head mean of one channel. When every head agrees the shared value
/// is returned as is, so identical heads give a KL term of exactly zero.
fn channel_mean(probs: &[Vec<f64>], ch: usize) -> f64 {
    let first = probs[0][ch];
    if probs.iter().all(|p| p[ch] == first) {
        return first;
    }
    probs.iter().map(|p| p[ch]).sum::<f64>() / probs.len() as f64
}

/// Elementwise KL term `x ln(x / y) - x + y`.
pub fn kl_term(x: f64, y: f64) -> f64 {
    if x > 0.0 && y > 0.0 {
        x * (x / y).ln() - x + y
    } else if x == 0.0 && y >= 0.0 {
        y
    } else {
        f64::INFINITY
    }
}

pub fn softmax(row: ArrayView1<'_, f32>) -> Vec<f64> {
    let max = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64));
    let exps: Vec<f64> = row.iter().map(|&v| (v as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn require_two_heads(preds: &PredictionBatch) -> Result<(), MetricsError> {
    if preds.n_heads() < 2 {
        return Err(MetricsError::DegenerateInput(format!(
            "head correlation needs at least 2 heads, got {}",
            preds.n_heads()
        )));
    }
    Ok(())
}

fn correlation_matrix(
    rows: &[Vec<f64>],
    policy: DegeneratePolicy,
    example: usize,
) -> Result<Array2<f64>, MetricsError> {
    let k = rows.len();
    let constant: Vec<bool> = rows.iter().map(|r| is_constant(r)).collect();
    if policy == DegeneratePolicy::Reject {
        if let Some(head) = constant.iter().position(|&c| c) {
            return Err(MetricsError::DegenerateInput(format!(
                "example {example} head {head} has a constant output vector"
            )));
        }
    }

    let mut m = Array2::<f64>::eye(k);
    for i in 0..k {
        for j in (i + 1)..k {
            let r = pearson(&rows[i], &rows[j]).unwrap_or(0.0);
            m[[i, j]] = r;
            m[[j, i]] = r;
        }
    }
    Ok(m)
}

fn to_f64(row: ArrayView1<'_, f32>) -> Vec<f64> {
    row.iter().map(|&v| v as f64).collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/diversity.rs"]
mod tests;
