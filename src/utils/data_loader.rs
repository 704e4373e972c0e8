//! CSV loading into labeled datasets

use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use super::Dataset;
use crate::error::{AnomalyError, Result};

/// CSV reader producing [`Dataset`]s
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field separator
    delimiter: u8,
    /// Rows used for schema inference
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            infer_schema_length: Some(100),
        }
    }

    /// Set the field separator
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a CSV whose `label_column` holds 0/1 labels; every other column
    /// becomes a feature.
    pub fn load_csv(&self, path: impl AsRef<Path>, label_column: &str) -> Result<Dataset> {
        let start = Instant::now();
        let df = self.read_frame(path.as_ref())?;

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| name != label_column)
            .collect();
        if feature_names.len() == df.width() {
            return Err(AnomalyError::FeatureNotFound(label_column.to_string()));
        }

        let x = columns_to_array2(&df, &feature_names)?;
        let y = labels(&df, label_column)?;
        debug!(
            rows = df.height(),
            features = feature_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded {}",
            path.as_ref().display()
        );
        Dataset::new(x, y, feature_names)
    }

    /// Load every column of an unlabeled CSV as features
    pub fn load_features(&self, path: impl AsRef<Path>) -> Result<(Array2<f64>, Vec<String>)> {
        let df = self.read_frame(path.as_ref())?;
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let x = columns_to_array2(&df, &names)?;
        Ok((x, names))
    }

    fn read_frame(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        if df.height() == 0 {
            return Err(AnomalyError::DataError(format!(
                "{} contains no rows",
                path.display()
            )));
        }
        Ok(df)
    }
}

/// Columns as a row-major f64 matrix; missing values become 0
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| AnomalyError::FeatureNotFound(col_name.clone()))?;
            let values: Vec<f64> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

fn labels(df: &DataFrame, label_column: &str) -> Result<Array1<u8>> {
    let column = df
        .column(label_column)
        .map_err(|_| AnomalyError::FeatureNotFound(label_column.to_string()))?;
    let values = column.cast(&DataType::Float64)?;

    values
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if v == 0.0 => Ok(0),
            Some(v) if v == 1.0 => Ok(1),
            Some(v) => Err(AnomalyError::DataError(format!(
                "label {} at row {} is neither 0 nor 1",
                v, row
            ))),
            None => Err(AnomalyError::DataError(format!("missing label at row {}", row))),
        })
        .collect::<Result<Vec<u8>>>()
        .map(Array1::from_vec)
}
