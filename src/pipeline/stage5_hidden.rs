use std::path::PathBuf;

use crate::input::Dataset;
use crate::model::{AdapterInit, Backbone, EnsembleModel, OutputMode};
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_train::{Stage2Inputs, model_spec, train_model};
use crate::train::TrainReport;
use crate::viz::{Embedding, FigureWriter, TsneParams, embed_layer, render_tsne_grid};

pub const HIDDEN_RUN: &str = "hidden";
pub const TSNE_FIGURE: &str = "hidden_tsne.svg";

#[derive(Debug)]
pub struct Stage5Output {
    pub embeddings: Vec<Embedding>,
    pub figure: PathBuf,
    pub report: TrainReport,
}

pub struct Stage5Inputs<'a> {
    pub train: Stage2Inputs<'a>,
    pub test_set: &'a Dataset,
    pub tsne: TsneParams,
    pub figures: &'a FigureWriter,
}

/// Trains a fresh `tabm` model and projects the activations leaving each
/// hidden layer.
pub fn run_stage5(inputs: &Stage5Inputs<'_>) -> Result<Stage5Output, PipelineError> {
    let spec = model_spec(
        HIDDEN_RUN,
        Backbone::Tabm,
        AdapterInit::default(),
        inputs.train.splits,
        inputs.train.config,
    );
    let trained = train_model(&spec, HIDDEN_RUN, &inputs.train)?;

    let output = trained
        .model
        .forward(inputs.test_set.x.view(), OutputMode::PerHeadWithIntermediates)?;
    let mut embeddings = Vec::with_capacity(output.intermediates().len());
    for (idx, layer) in output.intermediates().iter().enumerate() {
        let title = format!("layer {}", idx + 1);
        tracing::debug!(layer = idx + 1, width = layer.n_channels(), "projecting");
        embeddings.push(embed_layer(&title, layer, &inputs.tsne)?);
    }

    let svg = render_tsne_grid(&embeddings, "t-SNE of hidden activations by head")?;
    let figure = inputs.figures.write(TSNE_FIGURE, &svg)?;
    tracing::info!(layers = embeddings.len(), figure = %figure.display(), "hidden projection written");

    Ok(Stage5Output {
        embeddings,
        figure,
        report: trained.report,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_hidden.rs"]
mod tests;
