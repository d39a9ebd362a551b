//! Column access and conversion between polars frames and ndarray

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Fail with a `SchemaError` naming every absent column.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<()> {
    let present = df.get_column_names();
    let missing: Vec<&str> = columns
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| !present.iter().any(|p| p.as_str() == *c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaError(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )))
    }
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

fn numeric_series(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::missing_column(name))?;
    let series = column.as_materialized_series();
    if matches!(series.dtype(), DataType::String) {
        return Err(PipelineError::SchemaError(format!(
            "column '{}' is not numeric",
            name
        )));
    }
    Ok(series.cast(&DataType::Float64)?)
}

/// Column values as `f64`, keeping nulls.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = numeric_series(df, name)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Column values as `f64`, failing on nulls.
pub fn column_f64_strict(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    column_f64(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!("column '{}' has a missing value at row {}", name, row))
            })
        })
        .collect()
}

/// Column values rendered as strings, keeping nulls.
pub fn column_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::missing_column(name))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Stack the named columns into a row-major feature matrix.
pub fn columns_to_array2<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = columns.len();
    let data: Vec<Vec<f64>> = columns
        .iter()
        .map(|c| column_f64_strict(df, c.as_ref()))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| data[j][i]))
}

pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    Ok(Array1::from_vec(column_f64_strict(df, name)?))
}

/// Rows at `indices`, in that order.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Select rows of a matrix and matching labels.
pub fn select_rows(x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> (Array2<f64>, Array1<f64>) {
    (
        x.select(ndarray::Axis(0), indices),
        y.select(ndarray::Axis(0), indices),
    )
}
