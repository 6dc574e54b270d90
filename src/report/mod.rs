use std::path::PathBuf;

use serde::Serialize;

use crate::metrics::TaskMetric;
use crate::pipeline::stage4_sweep::InitSweepResult;

pub mod json;
pub mod text;

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub backbone: String,
    pub spearman: f64,
    pub kl_dispersion: f64,
    pub mean_off_diagonal: f64,
    pub metric: TaskMetric,
    pub train_loss: f32,
    pub test_loss: f32,
    pub correlation: Vec<Vec<f64>>,
    pub train_log: PathBuf,
    pub figures: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HiddenSummary {
    pub layers: usize,
    pub points_per_layer: usize,
    pub figure: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub tool: String,
    pub version: String,
    pub source: String,
    pub task: String,
    pub heads: usize,
    pub hidden_widths: Vec<usize>,
    pub epochs: usize,
    pub seed: u64,
    pub n_train: usize,
    pub n_test: usize,
    pub degenerate_policy: String,
    pub models: Vec<ModelSummary>,
    /// Model with the lowest rank correlation between heads.
    pub most_diverse: Option<String>,
    pub sweep: Vec<InitSweepResult>,
    pub hidden: Option<HiddenSummary>,
}

pub fn format_f64_4(v: f64) -> String {
    format!("{:.4}", v)
}

pub fn format_f64_6(v: f64) -> String {
    format!("{:.6}", v)
}

/// Mean of the entries off the diagonal; 0 for matrices smaller than 2x2.
pub fn mean_off_diagonal(matrix: &[Vec<f64>]) -> f64 {
    let mut sum = 0f64;
    let mut count = 0usize;
    for (i, row) in matrix.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            if i != j {
                sum += v;
                count += 1;
            }
        }
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub fn most_diverse(models: &[ModelSummary]) -> Option<String> {
    models
        .iter()
        .filter(|m| m.spearman.is_finite())
        .min_by(|a, b| a.spearman.total_cmp(&b.spearman).then_with(|| a.name.cmp(&b.name)))
        .map(|m| m.name.clone())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
