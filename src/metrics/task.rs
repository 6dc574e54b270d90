use std::fmt;

use ndarray::ArrayView2;
use serde::Serialize;

use crate::input::Targets;
use crate::metrics::MetricsError;

/// Quality of the aggregated (head-averaged) prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TaskMetric {
    Accuracy(f64),
    Mse(f64),
}

impl TaskMetric {
    pub fn name(&self) -> &'static str {
        match self {
            TaskMetric::Accuracy(_) => "accuracy",
            TaskMetric::Mse(_) => "mse",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            TaskMetric::Accuracy(v) | TaskMetric::Mse(v) => *v,
        }
    }
}

impl fmt::Display for TaskMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:.4}", self.name(), self.value())
    }
}

/// Accuracy of the arg-max channel for class labels, mean squared error
/// over every output coordinate for regression targets.
pub fn evaluate_task(
    aggregated: ArrayView2<'_, f32>,
    targets: &Targets,
) -> Result<TaskMetric, MetricsError> {
    let n = aggregated.nrows();
    if n == 0 || n != targets.len() {
        return Err(MetricsError::Shape(format!(
            "{} predictions for {} targets",
            n,
            targets.len()
        )));
    }
    match targets {
        Targets::Classes(labels) => {
            let correct = aggregated
                .rows()
                .into_iter()
                .zip(labels)
                .filter(|(row, label)| argmax(row.iter().copied()) == Some(**label))
                .count();
            Ok(TaskMetric::Accuracy(correct as f64 / n as f64))
        }
        Targets::Values(values) => {
            if values.dim() != aggregated.dim() {
                return Err(MetricsError::Shape(format!(
                    "regression output {:?} does not match targets {:?}",
                    aggregated.dim(),
                    values.dim()
                )));
            }
            let sum: f64 = aggregated
                .iter()
                .zip(values.iter())
                .map(|(&p, &y)| (p as f64 - y as f64).powi(2))
                .sum();
            Ok(TaskMetric::Mse(sum / aggregated.len() as f64))
        }
    }
}

fn argmax(values: impl Iterator<Item = f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
#[path = "../../tests/src_inline/metrics/task.rs"]
mod tests;
