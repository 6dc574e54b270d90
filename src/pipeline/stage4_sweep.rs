use serde::Serialize;

use crate::input::Dataset;
use crate::metrics::{DegeneratePolicy, TaskMetric, evaluate_task, rank_correlation};
use crate::model::{AdapterInit, Backbone, InitDistribution};
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_train::{Stage2Inputs, model_spec, train_model};
use crate::pipeline::stage3_diversity::{correlation_view, per_head_predictions};

/// One point of the adapter-initialisation grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitSweepResult {
    pub scale: f32,
    pub distribution: InitDistribution,
    pub spearman: f64,
    pub metric: TaskMetric,
}

/// Scale-major, distribution-minor.
pub fn sweep_grid(scales: &[f32]) -> Vec<AdapterInit> {
    scales
        .iter()
        .flat_map(|&scale| {
            InitDistribution::ALL
                .into_iter()
                .map(move |distribution| AdapterInit {
                    distribution,
                    scale,
                })
        })
        .collect()
}

pub fn run_name(init: &AdapterInit) -> String {
    format!("{}_{:?}", init.distribution, init.scale)
}

pub struct Stage4Inputs<'a> {
    pub train: Stage2Inputs<'a>,
    pub test_set: &'a Dataset,
    pub policy: DegeneratePolicy,
}

pub fn run_stage4(inputs: &Stage4Inputs<'_>) -> Result<Vec<InitSweepResult>, PipelineError> {
    let config = inputs.train.config;
    let task = inputs.train.splits.task;
    let grid = sweep_grid(&config.sweep_scales);
    let mut results = Vec::with_capacity(grid.len());

    for init in grid {
        let name = run_name(&init);
        let spec = model_spec(&name, Backbone::Tabm, init, inputs.train.splits, config);
        let trained = train_model(&spec, &name, &inputs.train)?;

        let preds = per_head_predictions(&trained.model, inputs.test_set)?;
        let spearman = rank_correlation(&correlation_view(&preds, task), inputs.policy)?;
        let metric = evaluate_task(preds.aggregate().view(), &inputs.test_set.targets)?;
        tracing::info!(run = %name, spearman, metric = %metric, "sweep point");

        results.push(InitSweepResult {
            scale: init.scale,
            distribution: init.distribution,
            spearman,
            metric,
        });
    }

    Ok(results)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_sweep.rs"]
mod tests;
