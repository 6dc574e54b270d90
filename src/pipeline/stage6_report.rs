use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ExperimentConfig;
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_train::TrainedModel;
use crate::pipeline::stage3_diversity::ModelDiversity;
use crate::pipeline::stage4_sweep::InitSweepResult;
use crate::pipeline::stage5_hidden::Stage5Output;
use crate::report::json::render_summary_json;
use crate::report::text::render_report_text;
use crate::report::{HiddenSummary, ModelSummary, SummaryData, mean_off_diagonal, most_diverse};

#[derive(Debug, Clone)]
pub struct Stage6Input<'a> {
    pub config: &'a ExperimentConfig,
    pub source: &'a str,
    pub n_train: usize,
    pub n_test: usize,
    pub trained: &'a [TrainedModel],
    pub models: &'a [ModelDiversity],
    pub sweep: &'a [InitSweepResult],
    pub hidden: Option<&'a Stage5Output>,
    pub tool_version: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub summary: PathBuf,
    pub report: PathBuf,
}

pub fn write_reports(input: &Stage6Input<'_>, out_dir: &Path) -> Result<ReportPaths, PipelineError> {
    fs::create_dir_all(out_dir)?;
    let summary = build_summary(input);

    let summary_path = out_dir.join("summary.json");
    write_text(&summary_path, &render_summary_json(&summary)?)?;

    let report_path = out_dir.join("report.txt");
    write_text(&report_path, &render_report_text(&summary))?;

    tracing::info!(
        summary = %summary_path.display(),
        report = %report_path.display(),
        "reports written"
    );
    Ok(ReportPaths {
        summary: summary_path,
        report: report_path,
    })
}

pub fn build_summary(input: &Stage6Input<'_>) -> SummaryData {
    let models: Vec<ModelSummary> = input
        .models
        .iter()
        .zip(input.trained)
        .map(|(m, t)| ModelSummary {
            name: m.name.clone(),
            backbone: m.backbone.clone(),
            spearman: m.spearman,
            kl_dispersion: m.kl_dispersion,
            mean_off_diagonal: mean_off_diagonal(&m.correlation),
            metric: m.metric,
            train_loss: t.report.train_loss,
            test_loss: t.report.test_loss,
            correlation: m.correlation.clone(),
            train_log: t.report.log_path.clone(),
            figures: m.figures.clone(),
        })
        .collect();

    let hidden = input.hidden.map(|h| HiddenSummary {
        layers: h.embeddings.len(),
        points_per_layer: h.embeddings.first().map(|e| e.points.nrows()).unwrap_or(0),
        figure: h.figure.clone(),
    });

    SummaryData {
        tool: "ensemble-diversity".to_string(),
        version: input.tool_version.to_string(),
        source: input.source.to_string(),
        task: format!("{:?}", input.config.task).to_lowercase(),
        heads: input.config.heads,
        hidden_widths: input.config.hidden.clone(),
        epochs: input.config.epochs,
        seed: input.config.seed,
        n_train: input.n_train,
        n_test: input.n_test,
        degenerate_policy: format!("{:?}", input.config.degenerate).to_lowercase(),
        most_diverse: most_diverse(&models),
        models,
        sweep: input.sweep.to_vec(),
        hidden,
    }
}

fn write_text(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(contents.as_bytes())?;
    w.flush()
}
