use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::input::{DataSplits, Dataset, InputError, TabularSource, Targets, TaskKind, split_dataset};

/// Gaussian blobs around random class centres (classification) or a noisy
/// random linear map with a sine term (regression). Same seed, same rows.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub n_rows: usize,
    pub n_features: usize,
    pub n_classes: usize,
    pub noise: f32,
    pub task: TaskKind,
    pub seed: u64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            n_rows: 1200,
            n_features: 11,
            n_classes: 6,
            noise: 1.0,
            task: TaskKind::Classif,
            seed: 7,
        }
    }
}

impl SyntheticSource {
    pub fn generate(&self) -> Result<(Dataset, usize), InputError> {
        if self.n_rows == 0 || self.n_features == 0 {
            return Err(InputError::InvalidInput(
                "synthetic source needs rows and features".to_string(),
            ));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        match self.task {
            TaskKind::Classif => {
                let n_classes = self.n_classes.max(2);
                let centres = Array2::from_shape_fn((n_classes, self.n_features), |_| {
                    rng.gen_range(-2.0f32..2.0)
                });
                let mut labels = Vec::with_capacity(self.n_rows);
                let mut x = Array2::<f32>::zeros((self.n_rows, self.n_features));
                for (row, mut xs) in x.rows_mut().into_iter().enumerate() {
                    let class = row % n_classes;
                    labels.push(class);
                    for (j, v) in xs.iter_mut().enumerate() {
                        let eps: f32 = rng.sample(StandardNormal);
                        *v = centres[[class, j]] + self.noise * eps;
                    }
                }
                Ok((Dataset::new(x, Targets::Classes(labels))?, n_classes))
            }
            TaskKind::Reg => {
                let coef: Vec<f32> = (0..self.n_features)
                    .map(|_| rng.sample::<f32, _>(StandardNormal))
                    .collect();
                let x = Array2::from_shape_fn((self.n_rows, self.n_features), |_| {
                    rng.sample::<f32, _>(StandardNormal)
                });
                let mut y = Array2::<f32>::zeros((self.n_rows, 1));
                for (row, xs) in x.rows().into_iter().enumerate() {
                    let linear: f32 = xs.iter().zip(&coef).map(|(a, b)| a * b).sum();
                    let eps: f32 = rng.sample(StandardNormal);
                    y[[row, 0]] = linear + xs[0].sin() + 0.1 * self.noise * eps;
                }
                Ok((Dataset::new(x, Targets::Values(y))?, 1))
            }
        }
    }
}

impl TabularSource for SyntheticSource {
    fn describe(&self) -> String {
        format!(
            "synthetic {:?} ({} rows, {} features, seed {})",
            self.task, self.n_rows, self.n_features, self.seed
        )
    }

    fn get_data(&self, split: f32, batch_size: usize, seed: u64) -> Result<DataSplits, InputError> {
        let (data, output_dim) = self.generate()?;
        split_dataset(&data, split, batch_size, seed, self.task, output_dim)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/synthetic.rs"]
mod tests;
