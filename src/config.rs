use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::TaskKind;
use crate::metrics::DegeneratePolicy;
use crate::viz::TsneParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything one experiment run depends on. Missing JSON fields fall back
/// to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Delimited data file; the synthetic source is used when absent.
    pub data: Option<PathBuf>,
    pub delimiter: Option<char>,
    /// Target column name; the last column when absent.
    pub target: Option<String>,
    pub task: TaskKind,
    pub hidden: Vec<usize>,
    pub heads: usize,
    pub batch_size: usize,
    pub epochs: usize,
    pub split: f32,
    pub seed: u64,
    pub learning_rate: f32,
    pub sweep_scales: Vec<f32>,
    pub runs_dir: PathBuf,
    pub out_dir: PathBuf,
    pub degenerate: DegeneratePolicy,
    pub skip_tsne: bool,
    pub tsne_max_examples: usize,
    pub tsne_iterations: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data: None,
            delimiter: None,
            target: None,
            task: TaskKind::Classif,
            hidden: vec![64, 32, 16, 10],
            heads: 8,
            batch_size: 32,
            epochs: 20,
            split: 0.2,
            seed: 42,
            learning_rate: 0.01,
            sweep_scales: vec![0.1, 0.5, 1.0, 2.0],
            runs_dir: PathBuf::from("runs"),
            out_dir: PathBuf::from("out"),
            degenerate: DegeneratePolicy::Zero,
            skip_tsne: false,
            tsne_max_examples: 200,
            tsne_iterations: 1000,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ExperimentConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heads < 2 {
            return Err(ConfigError::Invalid(format!(
                "heads must be at least 2 to measure diversity, got {}",
                self.heads
            )));
        }
        if self.hidden.is_empty() || self.hidden.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "hidden widths must be non-empty and positive, got {:?}",
                self.hidden
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        if !(self.split > 0.0 && self.split < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "split must be in (0, 1), got {}",
                self.split
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.sweep_scales.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sweep scales must be finite and non-negative, got {:?}",
                self.sweep_scales
            )));
        }
        Ok(())
    }

    pub fn tsne_params(&self) -> TsneParams {
        TsneParams {
            seed: self.seed,
            max_examples: self.tsne_max_examples,
            n_iter: self.tsne_iterations,
            ..TsneParams::default()
        }
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
