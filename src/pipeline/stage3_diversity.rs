use std::path::PathBuf;

use ndarray::Array2;
use serde::Serialize;

use crate::input::{Dataset, TaskKind};
use crate::metrics::{
    DegeneratePolicy, PredictionBatch, TaskMetric, evaluate_task, kl_dispersion,
    pairwise_correlation_matrix, rank_correlation,
};
use crate::model::{EnsembleModel, OutputMode};
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_train::TrainedModel;
use crate::viz::{FigureWriter, render_boxplot, render_heatmap};

#[derive(Debug, Clone, Serialize)]
pub struct ModelDiversity {
    pub name: String,
    pub backbone: String,
    pub spearman: f64,
    pub kl_dispersion: f64,
    pub correlation: Vec<Vec<f64>>,
    pub metric: TaskMetric,
    pub figures: Vec<PathBuf>,
}

pub struct Stage3Inputs<'a> {
    pub test_set: &'a Dataset,
    pub task: TaskKind,
    pub policy: DegeneratePolicy,
    pub figures: &'a FigureWriter,
}

/// One per-head inference pass over the whole test set.
pub fn per_head_predictions(
    model: &dyn EnsembleModel,
    test_set: &Dataset,
) -> Result<PredictionBatch, PipelineError> {
    let output = model.forward(test_set.x.view(), OutputMode::PerHead)?;
    Ok(output.into_per_head()?)
}

/// The view head correlations are measured on. Regression heads emit one
/// channel, so heads are compared across examples instead.
pub fn correlation_view(preds: &PredictionBatch, task: TaskKind) -> PredictionBatch {
    match task {
        TaskKind::Classif => preds.clone(),
        TaskKind::Reg => preds.transposed(),
    }
}

pub fn measure_model(
    model: &dyn EnsembleModel,
    inputs: &Stage3Inputs<'_>,
) -> Result<ModelDiversity, PipelineError> {
    let preds = per_head_predictions(model, inputs.test_set)?;
    let view = correlation_view(&preds, inputs.task);

    let spearman = rank_correlation(&view, inputs.policy)?;
    let kl = kl_dispersion(&preds)?;
    let correlation = pairwise_correlation_matrix(&view, inputs.policy)?;
    let metric = evaluate_task(preds.aggregate().view(), &inputs.test_set.targets)?;

    let name = model.name();
    let boxplot = render_boxplot(
        view.head_means().view(),
        &format!("{name}: mean prediction per head"),
    )?;
    let heatmap = render_heatmap(&correlation, &format!("{name}: head correlation"))?;
    let figures = vec![
        inputs.figures.write(&format!("{name}_boxplot.svg"), &boxplot)?,
        inputs.figures.write(&format!("{name}_correlation.svg"), &heatmap)?,
    ];

    tracing::info!(model = name, spearman, kl, metric = %metric, "diversity measured");

    Ok(ModelDiversity {
        name: name.to_string(),
        backbone: model.backbone().name().to_string(),
        spearman,
        kl_dispersion: kl,
        correlation: matrix_rows(&correlation),
        metric,
        figures,
    })
}

pub fn run_stage3(
    models: &[TrainedModel],
    inputs: &Stage3Inputs<'_>,
) -> Result<Vec<ModelDiversity>, PipelineError> {
    models
        .iter()
        .map(|trained| measure_model(&trained.model, inputs))
        .collect()
}

fn matrix_rows(m: &Array2<f64>) -> Vec<Vec<f64>> {
    m.rows().into_iter().map(|r| r.to_vec()).collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_diversity.rs"]
mod tests;
