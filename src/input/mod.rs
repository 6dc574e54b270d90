use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use ndarray::{Array2, Axis, concatenate};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod predictions;
pub mod synthetic;
pub mod table;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Shape(#[from] crate::metrics::MetricsError),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Classif,
    Reg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Classes(Vec<usize>),
    Values(Array2<f32>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Classes(labels) => labels.len(),
            Targets::Values(values) => values.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, idx: &[usize]) -> Targets {
        match self {
            Targets::Classes(labels) => Targets::Classes(idx.iter().map(|&i| labels[i]).collect()),
            Targets::Values(values) => Targets::Values(values.select(Axis(0), idx)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array2<f32>,
    pub targets: Targets,
}

impl Dataset {
    pub fn new(x: Array2<f32>, targets: Targets) -> Result<Self, InputError> {
        if x.nrows() != targets.len() {
            return Err(InputError::InvalidInput(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                targets.len()
            )));
        }
        Ok(Self { x, targets })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn subset(&self, idx: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), idx),
            targets: self.targets.select(idx),
        }
    }

    /// Stacks batches back into one dataset, in iteration order.
    pub fn concat(parts: &[Dataset]) -> Result<Dataset, InputError> {
        let first = parts
            .first()
            .ok_or_else(|| InputError::InvalidInput("no batches to concatenate".to_string()))?;
        let views: Vec<_> = parts.iter().map(|p| p.x.view()).collect();
        let x = concatenate(Axis(0), &views).map_err(|e| InputError::InvalidInput(e.to_string()))?;
        let targets = match &first.targets {
            Targets::Classes(_) => {
                let mut labels = Vec::with_capacity(x.nrows());
                for part in parts {
                    match &part.targets {
                        Targets::Classes(l) => labels.extend_from_slice(l),
                        Targets::Values(_) => return Err(mixed_targets()),
                    }
                }
                Targets::Classes(labels)
            }
            Targets::Values(_) => {
                let mut views = Vec::with_capacity(parts.len());
                for part in parts {
                    match &part.targets {
                        Targets::Values(v) => views.push(v.view()),
                        Targets::Classes(_) => return Err(mixed_targets()),
                    }
                }
                Targets::Values(
                    concatenate(Axis(0), &views)
                        .map_err(|e| InputError::InvalidInput(e.to_string()))?,
                )
            }
        };
        Dataset::new(x, targets)
    }
}

fn mixed_targets() -> InputError {
    InputError::InvalidInput("cannot mix class labels and regression targets".to_string())
}

/// A dataset cut into fixed-size batches.
#[derive(Debug, Clone)]
pub struct DataLoader {
    pub data: Dataset,
    pub batch_size: usize,
}

impl DataLoader {
    pub fn new(data: Dataset, batch_size: usize) -> Self {
        Self {
            data,
            batch_size: batch_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn n_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// Batches in storage order.
    pub fn batches(&self) -> impl Iterator<Item = Dataset> + '_ {
        let order: Vec<usize> = (0..self.len()).collect();
        self.batches_in(order)
    }

    /// Batches over a permutation drawn from `rng`.
    pub fn shuffled_batches(&self, rng: &mut ChaCha8Rng) -> impl Iterator<Item = Dataset> + '_ {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.batches_in(order)
    }

    fn batches_in(&self, order: Vec<usize>) -> impl Iterator<Item = Dataset> + '_ {
        let batch_size = self.batch_size;
        (0..self.n_batches()).map(move |b| {
            let end = ((b + 1) * batch_size).min(order.len());
            self.data.subset(&order[b * batch_size..end])
        })
    }

    /// The whole loader as one dataset, batches concatenated in order.
    pub fn concat(&self) -> Result<Dataset, InputError> {
        let parts: Vec<Dataset> = self.batches().collect();
        Dataset::concat(&parts)
    }
}

#[derive(Debug, Clone)]
pub struct DataSplits {
    pub train: DataLoader,
    pub test: DataLoader,
    pub input_dim: usize,
    pub output_dim: usize,
    pub task: TaskKind,
}

/// Source of a tabular task split into train and test loaders.
pub trait TabularSource {
    fn describe(&self) -> String;
    fn get_data(&self, split: f32, batch_size: usize, seed: u64) -> Result<DataSplits, InputError>;
}

/// Shuffles with `seed`, holds out `split` of the rows for testing and
/// standardises every feature with the training mean and deviation.
pub fn split_dataset(
    data: &Dataset,
    split: f32,
    batch_size: usize,
    seed: u64,
    task: TaskKind,
    output_dim: usize,
) -> Result<DataSplits, InputError> {
    if !(split > 0.0 && split < 1.0) {
        return Err(InputError::InvalidInput(format!(
            "split must be between 0 and 1, got {split}"
        )));
    }
    let n = data.len();
    if n < 2 {
        return Err(InputError::InvalidInput(format!(
            "need at least 2 rows to split, got {n}"
        )));
    }
    let n_test = ((n as f32 * split).round() as usize).clamp(1, n - 1);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let mut train = data.subset(&indices[n_test..]);
    let mut test = data.subset(&indices[..n_test]);
    standardize(&mut train.x, &mut test.x);

    tracing::debug!(
        rows = n,
        train = train.len(),
        test = test.len(),
        seed,
        "split dataset"
    );

    Ok(DataSplits {
        input_dim: data.n_features(),
        output_dim,
        task,
        train: DataLoader::new(train, batch_size),
        test: DataLoader::new(test, batch_size),
    })
}

/// Z-scores columns of both matrices with statistics of `train`; columns
/// with zero deviation are only centred.
pub fn standardize(train: &mut Array2<f32>, test: &mut Array2<f32>) {
    for col in 0..train.ncols() {
        let column = train.column(col);
        let n = column.len().max(1) as f64;
        let mean = column.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = column
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = var.sqrt();
        let scale = if std > 0.0 { std } else { 1.0 };
        for m in [&mut *train, &mut *test] {
            m.column_mut(col)
                .mapv_inplace(|v| ((v as f64 - mean) / scale) as f32);
        }
    }
}

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, InputError> {
    if !path.exists() {
        return Err(InputError::MissingInput(path.display().to_string()));
    }
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
