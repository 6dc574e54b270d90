use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use serde::Deserialize;
use serde_json::Value;

use crate::input::{InputError, open_maybe_gz};
use crate::metrics::{MetricsError, PredictionBatch};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionFile {
    Flat { shape: Vec<usize>, data: Vec<f32> },
    Wrapped { predictions: Value },
    Nested(Value),
}

/// Loads per-head predictions saved as JSON. Accepted layouts: a bare
/// `[examples][heads][channels]` array, `{"predictions": ...}` holding one,
/// or a row-major dump `{"shape": [n, k, c], "data": [...]}`.
pub fn load_predictions(path: &Path) -> Result<PredictionBatch, InputError> {
    let reader = open_maybe_gz(path)?;
    let file: PredictionFile = serde_json::from_reader(reader)
        .map_err(|e| InputError::Parse(format!("{}: {e}", path.display())))?;
    match file {
        PredictionFile::Nested(value) | PredictionFile::Wrapped { predictions: value } => {
            from_nested_value(path, value)
        }
        PredictionFile::Flat { shape, data } => {
            let values = ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
                InputError::Parse(format!("{}: shape {shape:?}: {e}", path.display()))
            })?;
            Ok(PredictionBatch::from_dyn(values)?)
        }
    }
}

fn from_nested_value(path: &Path, value: Value) -> Result<PredictionBatch, InputError> {
    if !value.is_array() {
        return Err(InputError::Parse(format!(
            "{}: expected a prediction array",
            path.display()
        )));
    }
    let rank = array_rank(&value)?;
    if rank != 3 {
        return Err(MetricsError::Shape(format!(
            "expected (examples, heads, channels), got a rank-{rank} array"
        ))
        .into());
    }
    let rows: Vec<Vec<Vec<f32>>> = serde_json::from_value(value)
        .map_err(|e| InputError::Parse(format!("{}: {e}", path.display())))?;
    Ok(PredictionBatch::from_nested(&rows)?)
}

/// Nesting depth of a JSON array of numbers. Every branch must reach numbers
/// at the same depth.
fn array_rank(value: &Value) -> Result<usize, InputError> {
    match value {
        Value::Number(_) => Ok(0),
        Value::Array(items) => {
            let mut inner: Option<usize> = None;
            for item in items {
                let r = array_rank(item)?;
                match inner {
                    None => inner = Some(r),
                    Some(prev) if prev != r => {
                        return Err(MetricsError::Shape(format!(
                            "mixed nesting depth: rank-{prev} and rank-{r} entries"
                        ))
                        .into());
                    }
                    Some(_) => {}
                }
            }
            Ok(1 + inner.unwrap_or(0))
        }
        other => Err(InputError::Parse(format!("non-numeric prediction value {other}"))),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/predictions.rs"]
mod tests;
