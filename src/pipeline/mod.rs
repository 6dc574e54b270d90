pub mod stage1_data;
pub mod stage2_train;
pub mod stage3_diversity;
pub mod stage4_sweep;
pub mod stage5_hidden;
pub mod stage6_report;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigError, ExperimentConfig};
use crate::input::{InputError, TabularSource};
use crate::metrics::MetricsError;
use crate::model::ModelError;
use crate::report::text::render_sweep_table;
use crate::train::{TrainError, Trainer};
use crate::viz::{FigureWriter, VizError};

use stage1_data::run_stage1;
use stage2_train::{Stage2Inputs, run_stage2};
use stage3_diversity::{ModelDiversity, Stage3Inputs, run_stage3};
use stage4_sweep::{InitSweepResult, Stage4Inputs, run_stage4};
use stage5_hidden::{Stage5Inputs, Stage5Output, run_stage5};
use stage6_report::{Stage6Input, write_reports};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data source failed: {0}")]
    Input(#[from] InputError),
    #[error("model failed: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("figure failed: {0}")]
    Viz(#[from] VizError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct ExperimentOutcome {
    pub models: Vec<ModelDiversity>,
    pub sweep: Vec<InitSweepResult>,
    pub hidden: Option<Stage5Output>,
    pub summary_path: PathBuf,
    pub report_path: PathBuf,
}

/// Runs every stage in order and stops at the first failure.
pub fn run_experiment(
    config: &ExperimentConfig,
    source: &dyn TabularSource,
    trainer: &dyn Trainer,
) -> Result<ExperimentOutcome, PipelineError> {
    config.validate()?;
    let figures = FigureWriter::new(&config.out_dir.join("figures"))?;

    let stage1 = run_stage1(source, config)?;
    let task = stage1.splits.task;
    let splits = &stage1.splits;
    let runs_dir = config.runs_dir.as_path();
    let train_inputs = || Stage2Inputs {
        splits,
        config,
        trainer,
        runs_dir,
    };

    let trained = run_stage2(&train_inputs())?;

    let models = run_stage3(
        &trained,
        &Stage3Inputs {
            test_set: &stage1.test_set,
            task,
            policy: config.degenerate,
            figures: &figures,
        },
    )?;
    for m in &models {
        println!(
            "{:<12} spearman={:.4} kl={:.6} {}",
            m.name, m.spearman, m.kl_dispersion, m.metric
        );
    }

    let sweep = run_stage4(&Stage4Inputs {
        train: train_inputs(),
        test_set: &stage1.test_set,
        policy: config.degenerate,
    })?;
    print!("{}", render_sweep_table(&sweep));

    let hidden = if config.skip_tsne {
        tracing::info!("hidden projection skipped");
        None
    } else {
        Some(run_stage5(&Stage5Inputs {
            train: train_inputs(),
            test_set: &stage1.test_set,
            tsne: config.tsne_params(),
            figures: &figures,
        })?)
    };

    let written = write_reports(
        &Stage6Input {
            config,
            source: &stage1.source,
            n_train: stage1.splits.train.len(),
            n_test: stage1.test_set.len(),
            trained: &trained,
            models: &models,
            sweep: &sweep,
            hidden: hidden.as_ref(),
            tool_version: env!("CARGO_PKG_VERSION"),
        },
        &config.out_dir,
    )?;

    Ok(ExperimentOutcome {
        models,
        sweep,
        hidden,
        summary_path: written.summary,
        report_path: written.report,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
