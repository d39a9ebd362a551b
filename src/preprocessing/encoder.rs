//! Deterministic label encoding for categorical columns
//!
//! Codes are assigned in sorted order of the distinct values, so the same
//! input always produces the same mapping regardless of row order.

use crate::error::{PipelineError, Result};
use crate::utils::{column_str, require_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Invertible value ↔ code mapping for one column. The code of a value is its
/// position in `classes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub column: String,
    classes: Vec<String>,
}

impl LabelMapping {
    /// Build from any values; duplicates collapse and order is sorted.
    pub fn from_values<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let distinct: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        Self {
            column: column.into(),
            classes: distinct.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, value: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as i64)
    }

    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(|s| s.as_str())
    }

    /// Value → code pairs in code order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, i64)> {
        self.classes.iter().enumerate().map(|(i, c)| (c.as_str(), i as i64))
    }

    fn encode_column(&self, df: &DataFrame) -> Result<Series> {
        let values = column_str(df, &self.column)?;
        let codes: Vec<i64> = values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                let v = v.as_deref().ok_or_else(|| {
                    PipelineError::DomainError(format!(
                        "row {}: missing value in categorical column '{}'",
                        row, self.column
                    ))
                })?;
                self.encode(v).ok_or_else(|| {
                    PipelineError::DomainError(format!(
                        "row {}: unseen category '{}' in column '{}'",
                        row, v, self.column
                    ))
                })
            })
            .collect::<Result<_>>()?;
        Ok(Series::new(self.column.as_str().into(), codes))
    }
}

/// Fits and applies [`LabelMapping`]s
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    columns: Vec<String>,
}

impl LabelEncoder {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Replace every categorical column with `Int64` codes, in place of the
    /// original column, and return the mapping used for each.
    pub fn encode(&self, df: &DataFrame) -> Result<(DataFrame, BTreeMap<String, LabelMapping>)> {
        require_columns(df, &self.columns)?;
        let mut mappings = BTreeMap::new();

        for column in &self.columns {
            let values = column_str(df, column)?;
            let mapping = LabelMapping::from_values(column.as_str(), values.into_iter().flatten());
            debug!(column = %column, classes = mapping.len(), "fitted label mapping");
            mappings.insert(column.clone(), mapping);
        }

        let out = Self::apply(df, &mappings)?;
        info!(columns = mappings.len(), "categorical columns encoded");
        Ok((out, mappings))
    }

    /// Encode with existing mappings. Unseen categories are a `DomainError`.
    pub fn apply(df: &DataFrame, mappings: &BTreeMap<String, LabelMapping>) -> Result<DataFrame> {
        let mut out = df.clone();
        for mapping in mappings.values() {
            if out.column(&mapping.column).is_err() {
                return Err(PipelineError::missing_column(&mapping.column));
            }
            let encoded = mapping.encode_column(&out)?;
            out.with_column(encoded)?;
        }
        Ok(out)
    }
}
