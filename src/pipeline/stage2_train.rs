use std::path::Path;

use crate::config::ExperimentConfig;
use crate::input::DataSplits;
use crate::model::init::derive_seed;
use crate::model::{AdapterInit, Backbone, EnsembleMlp, ModelSpec};
use crate::pipeline::PipelineError;
use crate::train::{TrainReport, Trainer};

/// Backbones compared in every run, in report order.
pub const CANDIDATES: [Backbone; 4] = [
    Backbone::Mlpk,
    Backbone::TabmNaive,
    Backbone::TabmMini,
    Backbone::Tabm,
];

#[derive(Debug)]
pub struct TrainedModel {
    pub model: EnsembleMlp,
    pub report: TrainReport,
}

pub struct Stage2Inputs<'a> {
    pub splits: &'a DataSplits,
    pub config: &'a ExperimentConfig,
    pub trainer: &'a dyn Trainer,
    pub runs_dir: &'a Path,
}

pub fn model_spec(
    name: &str,
    backbone: Backbone,
    adapter_init: AdapterInit,
    splits: &DataSplits,
    config: &ExperimentConfig,
) -> ModelSpec {
    let mut dims = Vec::with_capacity(config.hidden.len() + 2);
    dims.push(splits.input_dim);
    dims.extend_from_slice(&config.hidden);
    dims.push(splits.output_dim);
    ModelSpec {
        name: name.to_string(),
        backbone,
        dims,
        n_heads: config.heads,
        adapter_init,
        seed: derive_seed(config.seed, name),
    }
}

/// Builds `spec`, trains it and logs under `runs_dir/<run_name>`.
pub fn train_model(
    spec: &ModelSpec,
    run_name: &str,
    inputs: &Stage2Inputs<'_>,
) -> Result<TrainedModel, PipelineError> {
    let mut model = EnsembleMlp::new(spec)?;
    let log_dir = inputs.runs_dir.join(run_name);
    let report = inputs.trainer.train(
        &mut model,
        &inputs.splits.train,
        &inputs.splits.test,
        &log_dir,
        inputs.config.epochs,
    )?;
    Ok(TrainedModel { model, report })
}

pub fn run_stage2(inputs: &Stage2Inputs<'_>) -> Result<Vec<TrainedModel>, PipelineError> {
    let mut out = Vec::with_capacity(CANDIDATES.len());
    for backbone in CANDIDATES {
        let name = backbone.name();
        let spec = model_spec(name, backbone, AdapterInit::default(), inputs.splits, inputs.config);
        tracing::info!(model = name, dims = ?spec.dims, heads = spec.n_heads, "training candidate");
        out.push(train_model(&spec, name, inputs)?);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_train.rs"]
mod tests;
