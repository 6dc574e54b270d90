use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::Targets;
use crate::metrics::{MetricsError, PredictionBatch};

pub mod ensemble;
pub mod init;

pub use ensemble::{EnsembleMlp, ModelSpec};
pub use init::{AdapterInit, InitDistribution};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model shape error: {0}")]
    Shape(String),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// What a forward pass returns. Passed per call instead of being stored on
/// the model, so one evaluation never leaks its mode into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Aggregated,
    PerHead,
    PerHeadWithIntermediates,
}

#[derive(Debug, Clone)]
pub enum ModelOutput {
    Aggregated(Array2<f32>),
    PerHead(PredictionBatch),
    PerHeadWithIntermediates {
        output: PredictionBatch,
        hidden: Vec<PredictionBatch>,
    },
}

impl ModelOutput {
    pub fn per_head(&self) -> Result<&PredictionBatch, MetricsError> {
        match self {
            ModelOutput::PerHead(preds) => Ok(preds),
            ModelOutput::PerHeadWithIntermediates { output, .. } => Ok(output),
            ModelOutput::Aggregated(_) => Err(MetricsError::Shape(
                "aggregated output has no head axis; request OutputMode::PerHead".to_string(),
            )),
        }
    }

    pub fn into_per_head(self) -> Result<PredictionBatch, MetricsError> {
        match self {
            ModelOutput::PerHead(preds) => Ok(preds),
            ModelOutput::PerHeadWithIntermediates { output, .. } => Ok(output),
            ModelOutput::Aggregated(_) => Err(MetricsError::Shape(
                "aggregated output has no head axis; request OutputMode::PerHead".to_string(),
            )),
        }
    }

    /// Per-layer hidden activations, empty unless intermediates were requested.
    pub fn intermediates(&self) -> &[PredictionBatch] {
        match self {
            ModelOutput::PerHeadWithIntermediates { hidden, .. } => hidden,
            _ => &[],
        }
    }

    pub fn aggregated(&self) -> Array2<f32> {
        match self {
            ModelOutput::Aggregated(values) => values.clone(),
            ModelOutput::PerHead(preds) => preds.aggregate(),
            ModelOutput::PerHeadWithIntermediates { output, .. } => output.aggregate(),
        }
    }
}

/// How per-head diversity is injected into the shared MLP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backbone {
    /// K independent MLPs.
    Mlpk,
    /// Shared weights, random-sign adapters on both sides of every layer.
    TabmNaive,
    /// Shared weights, a single random-sign adapter on the input.
    TabmMini,
    /// Shared weights, adapters on every layer drawn from an init distribution.
    Tabm,
}

impl Backbone {
    pub fn name(self) -> &'static str {
        match self {
            Backbone::Mlpk => "mlpk",
            Backbone::TabmNaive => "tabm-naive",
            Backbone::TabmMini => "tabm-mini",
            Backbone::Tabm => "tabm",
        }
    }

    pub fn shares_weights(self) -> bool {
        !matches!(self, Backbone::Mlpk)
    }
}

/// An ensemble of K heads over one tabular input.
pub trait EnsembleModel {
    fn name(&self) -> &str;
    fn backbone(&self) -> Backbone;
    fn n_heads(&self) -> usize;
    fn forward(&self, x: ArrayView2<'_, f32>, mode: OutputMode) -> Result<ModelOutput, ModelError>;
    /// One SGD step on a batch; returns the loss before the update.
    fn train_step(
        &mut self,
        x: ArrayView2<'_, f32>,
        targets: &Targets,
        lr: f32,
    ) -> Result<f32, ModelError>;
    fn loss(&self, x: ArrayView2<'_, f32>, targets: &Targets) -> Result<f32, ModelError>;
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/mod.rs"]
mod tests;
