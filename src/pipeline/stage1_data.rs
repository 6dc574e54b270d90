use crate::config::ExperimentConfig;
use crate::input::{DataSplits, Dataset, TabularSource};
use crate::pipeline::PipelineError;

#[derive(Debug)]
pub struct Stage1Output {
    pub splits: DataSplits,
    /// All test batches concatenated in loader order.
    pub test_set: Dataset,
    pub source: String,
}

pub fn run_stage1(
    source: &dyn TabularSource,
    config: &ExperimentConfig,
) -> Result<Stage1Output, PipelineError> {
    let splits = source.get_data(config.split, config.batch_size, config.seed)?;
    let test_set = splits.test.concat()?;
    tracing::info!(
        source = %source.describe(),
        train = splits.train.len(),
        test = test_set.len(),
        input_dim = splits.input_dim,
        output_dim = splits.output_dim,
        "data ready"
    );
    Ok(Stage1Output {
        splits,
        test_set,
        source: source.describe(),
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_data.rs"]
mod tests;
