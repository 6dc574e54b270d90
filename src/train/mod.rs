use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::input::DataLoader;
use crate::metrics::{MetricsError, TaskMetric, evaluate_task};
use crate::model::{EnsembleModel, ModelError, OutputMode};

pub const TRAIN_LOG: &str = "train_log.tsv";

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("training failed: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("invalid training setup: {0}")]
    Setup(String),
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub epochs: usize,
    pub train_loss: f32,
    pub test_loss: f32,
    pub test_metric: TaskMetric,
    pub log_path: PathBuf,
}

pub trait Trainer {
    /// Trains `model` in place for at most `max_iterations` epochs and
    /// leaves its per-epoch log under `log_dir`.
    fn train(
        &self,
        model: &mut dyn EnsembleModel,
        train: &DataLoader,
        test: &DataLoader,
        log_dir: &Path,
        max_iterations: usize,
    ) -> Result<TrainReport, TrainError>;
}

/// Plain minibatch SGD over a reshuffled training set every epoch.
#[derive(Debug, Clone, Copy)]
pub struct SgdTrainer {
    pub lr: f32,
    pub seed: u64,
}

impl Default for SgdTrainer {
    fn default() -> Self {
        Self { lr: 0.01, seed: 42 }
    }
}

impl Trainer for SgdTrainer {
    fn train(
        &self,
        model: &mut dyn EnsembleModel,
        train: &DataLoader,
        test: &DataLoader,
        log_dir: &Path,
        max_iterations: usize,
    ) -> Result<TrainReport, TrainError> {
        if train.is_empty() || test.is_empty() {
            return Err(TrainError::Setup("empty train or test set".to_string()));
        }
        if !(self.lr > 0.0 && self.lr.is_finite()) {
            return Err(TrainError::Setup(format!("learning rate {} is not positive", self.lr)));
        }

        fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(TRAIN_LOG);
        let mut log = BufWriter::new(File::create(&log_path)?);
        writeln!(log, "epoch\ttrain_loss\ttest_loss\ttest_metric")?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train_loss = model.loss(train.data.x.view(), &train.data.targets)?;
        let mut test_loss = model.loss(test.data.x.view(), &test.data.targets)?;
        let mut test_metric = evaluate(model, test)?;

        for epoch in 1..=max_iterations {
            let mut sum = 0f64;
            let mut rows = 0usize;
            for batch in train.shuffled_batches(&mut rng) {
                let loss = model.train_step(batch.x.view(), &batch.targets, self.lr)?;
                sum += loss as f64 * batch.len() as f64;
                rows += batch.len();
            }
            train_loss = (sum / rows.max(1) as f64) as f32;
            test_loss = model.loss(test.data.x.view(), &test.data.targets)?;
            test_metric = evaluate(model, test)?;

            if !train_loss.is_finite() {
                return Err(TrainError::Setup(format!(
                    "{}: loss diverged at epoch {epoch}",
                    model.name()
                )));
            }

            writeln!(
                log,
                "{}\t{:.6}\t{:.6}\t{:.6}",
                epoch,
                train_loss,
                test_loss,
                test_metric.value()
            )?;
            tracing::debug!(
                model = model.name(),
                epoch,
                train_loss,
                test_loss,
                metric = %test_metric,
                "epoch done"
            );
        }
        log.flush()?;

        tracing::info!(
            model = model.name(),
            epochs = max_iterations,
            train_loss,
            test_loss,
            metric = %test_metric,
            log = %log_path.display(),
            "trained"
        );

        Ok(TrainReport {
            epochs: max_iterations,
            train_loss,
            test_loss,
            test_metric,
            log_path,
        })
    }
}

fn evaluate(model: &dyn EnsembleModel, data: &DataLoader) -> Result<TaskMetric, TrainError> {
    let output = model.forward(data.data.x.view(), OutputMode::Aggregated)?;
    Ok(evaluate_task(output.aggregated().view(), &data.data.targets)?)
}

#[cfg(test)]
#[path = "../../tests/src_inline/train/mod.rs"]
mod tests;
