use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayView3, Axis, Ix3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod diversity;
pub mod rank;
pub mod task;

pub use diversity::{kl_dispersion, pairwise_correlation_matrix, rank_correlation};
pub use task::{TaskMetric, evaluate_task};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("shape error: {0}")]
    Shape(String),
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

/// How a correlation involving a constant head vector is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Off-diagonal pairs with a constant vector count as 0; the diagonal stays 1.
    #[default]
    Zero,
    /// A constant vector fails with `MetricsError::DegenerateInput`.
    Reject,
}

/// Per-head predictions laid out as (examples, heads, channels).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionBatch {
    values: Array3<f32>,
}

impl PredictionBatch {
    pub fn new(values: Array3<f32>) -> Result<Self, MetricsError> {
        let (n, k, c) = values.dim();
        if n == 0 || k == 0 || c == 0 {
            return Err(MetricsError::Shape(format!(
                "prediction batch must be non-empty, got ({n}, {k}, {c})"
            )));
        }
        Ok(Self { values })
    }

    pub fn from_dyn(values: ArrayD<f32>) -> Result<Self, MetricsError> {
        let ndim = values.ndim();
        let values = values.into_dimensionality::<Ix3>().map_err(|_| {
            MetricsError::Shape(format!(
                "expected (examples, heads, channels), got a rank-{ndim} tensor"
            ))
        })?;
        Self::new(values)
    }

    /// Builds a batch from nested rows; every example must carry the same
    /// number of heads and every head the same number of channels.
    pub fn from_nested(rows: &[Vec<Vec<f32>>]) -> Result<Self, MetricsError> {
        let n = rows.len();
        let k = rows.first().map(|r| r.len()).unwrap_or(0);
        let c = rows
            .first()
            .and_then(|r| r.first())
            .map(|h| h.len())
            .unwrap_or(0);
        let mut flat = Vec::with_capacity(n * k * c);
        for (ex, heads) in rows.iter().enumerate() {
            if heads.len() != k {
                return Err(MetricsError::Shape(format!(
                    "example {ex} has {} heads, expected {k}",
                    heads.len()
                )));
            }
            for (head, channels) in heads.iter().enumerate() {
                if channels.len() != c {
                    return Err(MetricsError::Shape(format!(
                        "example {ex} head {head} has {} channels, expected {c}",
                        channels.len()
                    )));
                }
                flat.extend_from_slice(channels);
            }
        }
        let values = Array3::from_shape_vec((n, k, c), flat)
            .map_err(|e| MetricsError::Shape(e.to_string()))?;
        Self::new(values)
    }

    pub fn n_examples(&self) -> usize {
        self.values.dim().0
    }

    pub fn n_heads(&self) -> usize {
        self.values.dim().1
    }

    pub fn n_channels(&self) -> usize {
        self.values.dim().2
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.values.view()
    }

    /// The (heads, channels) slice of one example.
    pub fn example(&self, n: usize) -> ArrayView2<'_, f32> {
        self.values.index_axis(Axis(0), n)
    }

    /// Swaps the example and channel axes: (channels, heads, examples).
    pub fn transposed(&self) -> Self {
        let values = self
            .values
            .view()
            .permuted_axes([2, 1, 0])
            .as_standard_layout()
            .into_owned();
        Self { values }
    }

    pub fn select_heads(&self, heads: &[usize]) -> Result<Self, MetricsError> {
        let k = self.n_heads();
        if let Some(&bad) = heads.iter().find(|&&h| h >= k) {
            return Err(MetricsError::Shape(format!(
                "head index {bad} out of range for {k} heads"
            )));
        }
        Self::new(self.values.select(Axis(1), heads))
    }

    /// Mean over examples: one (heads, channels) matrix.
    pub fn head_means(&self) -> Array2<f32> {
        self.values
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array2::zeros((self.n_heads(), self.n_channels())))
    }

    /// Mean over heads: the ensemble's aggregated (examples, channels) output.
    pub fn aggregate(&self) -> Array2<f32> {
        self.values
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array2::zeros((self.n_examples(), self.n_channels())))
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/mod.rs"]
mod tests;
