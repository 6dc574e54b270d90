use std::io::BufRead;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};

use crate::input::{
    DataSplits, Dataset, InputError, TabularSource, Targets, TaskKind, open_maybe_gz, split_dataset,
};

#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub values: Array2<f32>,
}

/// Reads a delimited numeric table (plain or `.gz`). A first line with any
/// non-numeric field is taken as the header. Without an explicit delimiter
/// the first of `;`, `\t`, `,` found on the first line is used.
pub fn read_table(path: &Path, delimiter: Option<char>) -> Result<Table, InputError> {
    let mut reader = open_maybe_gz(path)?;
    let mut buf = String::new();
    let mut line_no = 0usize;
    let mut delim = delimiter;
    let mut columns: Option<Vec<String>> = None;
    let mut width: Option<usize> = None;
    let mut flat: Vec<f32> = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_line(&mut buf)?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end();
        if line.is_empty() {
            continue;
        }
        let d = *delim.get_or_insert_with(|| detect_delimiter(line));
        let fields: Vec<&str> = line.split(d).map(|f| f.trim().trim_matches('"')).collect();

        if width.is_none() && columns.is_none() && fields.iter().any(|f| f.parse::<f32>().is_err()) {
            columns = Some(fields.iter().map(|f| f.to_string()).collect());
            width = Some(fields.len());
            continue;
        }

        let expected = *width.get_or_insert(fields.len());
        if fields.len() != expected {
            return Err(InputError::Parse(format!(
                "line {} has {} fields, expected {}",
                line_no,
                fields.len(),
                expected
            )));
        }
        for field in fields {
            let v: f32 = field.parse().map_err(|_| {
                InputError::Parse(format!("line {line_no}: invalid number {field:?}"))
            })?;
            flat.push(v);
        }
    }

    let width = width.ok_or_else(|| InputError::Parse(format!("{} is empty", path.display())))?;
    if flat.is_empty() {
        return Err(InputError::Parse(format!(
            "{} has no data rows",
            path.display()
        )));
    }
    let rows = flat.len() / width;
    let values = Array2::from_shape_vec((rows, width), flat)
        .map_err(|e| InputError::Parse(e.to_string()))?;
    let columns = columns.unwrap_or_else(|| (0..width).map(|i| format!("col{i}")).collect());

    Ok(Table { columns, values })
}

fn detect_delimiter(line: &str) -> char {
    [';', '\t', ',']
        .into_iter()
        .find(|&c| line.contains(c))
        .unwrap_or(',')
}

/// Splits a table into features and the target column.
pub fn table_to_dataset(
    table: &Table,
    target: Option<&str>,
    task: TaskKind,
) -> Result<(Dataset, usize), InputError> {
    let n_cols = table.values.ncols();
    if n_cols < 2 {
        return Err(InputError::InvalidInput(
            "need at least one feature column and one target column".to_string(),
        ));
    }
    let target_idx = match target {
        Some(name) => table
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| InputError::MissingInput(format!("target column {name:?}")))?,
        None => n_cols - 1,
    };

    let feature_idx: Vec<usize> = (0..n_cols).filter(|&i| i != target_idx).collect();
    let x = table.values.select(Axis(1), &feature_idx);
    let y = table.values.column(target_idx);

    match task {
        TaskKind::Classif => {
            let mut labels = Vec::with_capacity(y.len());
            for (row, &v) in y.iter().enumerate() {
                if v < 0.0 || v.fract() != 0.0 {
                    return Err(InputError::InvalidInput(format!(
                        "row {row}: class label {v} is not a non-negative integer"
                    )));
                }
                labels.push(v as usize);
            }
            let n_classes = labels.iter().copied().max().map(|m| m + 1).unwrap_or(0);
            Ok((Dataset::new(x, Targets::Classes(labels))?, n_classes))
        }
        TaskKind::Reg => {
            let values = y.to_owned().insert_axis(Axis(1));
            Ok((Dataset::new(x, Targets::Values(values))?, 1))
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: Option<char>,
    pub target: Option<String>,
    pub task: TaskKind,
}

impl TabularSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn get_data(&self, split: f32, batch_size: usize, seed: u64) -> Result<DataSplits, InputError> {
        let table = read_table(&self.path, self.delimiter)?;
        tracing::info!(
            path = %self.path.display(),
            rows = table.values.nrows(),
            columns = table.values.ncols(),
            "loaded table"
        );
        let (data, output_dim) = table_to_dataset(&table, self.target.as_deref(), self.task)?;
        split_dataset(&data, split, batch_size, seed, self.task, output_dim)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/table.rs"]
mod tests;
