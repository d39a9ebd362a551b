//! Missing-value imputation

use crate::error::Result;
use crate::utils::{column_f64, median};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Requested imputation strategy.
///
/// Only `Median` fills values. The other strategies are accepted so existing
/// configurations keep loading, and the cleaner logs a warning and leaves the
/// column untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    #[default]
    Median,
    Mean,
    MostFrequent,
}

impl ImputeStrategy {
    pub fn is_supported(&self) -> bool {
        matches!(self, ImputeStrategy::Median)
    }
}

impl std::fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImputeStrategy::Median => write!(f, "median"),
            ImputeStrategy::Mean => write!(f, "mean"),
            ImputeStrategy::MostFrequent => write!(f, "most_frequent"),
        }
    }
}

pub fn column_median(df: &DataFrame, column: &str) -> Result<Option<f64>> {
    let values: Vec<f64> = column_f64(df, column)?.into_iter().flatten().collect();
    Ok(median(&values))
}

/// Fill missing values in `column` with `fill`. Returns the number of filled cells.
pub fn fill_missing(df: &mut DataFrame, column: &str, fill: f64) -> Result<usize> {
    let values = column_f64(df, column)?;
    let n_missing = values.iter().filter(|v| v.is_none()).count();
    if n_missing == 0 {
        return Ok(0);
    }
    let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
    df.with_column(Series::new(column.into(), filled))?;
    Ok(n_missing)
}
