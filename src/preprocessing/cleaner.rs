//! Column dropping, outlier clipping and median imputation

use crate::config::CleaningConfig;
use crate::error::{PipelineError, Result};
use crate::utils::{require_columns, Timer};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::imputer::{column_median, fill_missing, ImputeStrategy};
use super::outlier::{clip_column, fit_bounds, OutlierBounds};

/// Statistics fitted by [`Cleaner::clean`] on a reference table.
///
/// Reused unchanged by [`Cleaner::apply`] for every table processed afterward,
/// so held-out rows never influence the bounds or medians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub dropped_columns: Vec<String>,
    /// Clipping bounds per outlier column
    pub bounds: BTreeMap<String, OutlierBounds>,
    /// Median fill value per imputed column, computed after clipping
    pub medians: BTreeMap<String, f64>,
}

impl ColumnStats {
    pub fn bounds_for(&self, column: &str) -> Option<&OutlierBounds> {
        self.bounds.get(column)
    }

    pub fn median_for(&self, column: &str) -> Option<f64> {
        self.medians.get(column).copied()
    }
}

/// Cleans raw survey tables
#[derive(Debug, Clone)]
pub struct Cleaner {
    drop_columns: Vec<String>,
    outlier_columns: Vec<String>,
    impute_column: Option<String>,
    impute_strategy: ImputeStrategy,
    iqr_factor: f64,
}

impl Cleaner {
    pub fn new(
        drop_columns: Vec<String>,
        outlier_columns: Vec<String>,
        impute_column: Option<String>,
    ) -> Self {
        Self {
            drop_columns,
            outlier_columns,
            impute_column,
            impute_strategy: ImputeStrategy::Median,
            iqr_factor: 1.5,
        }
    }

    pub fn from_config(config: &CleaningConfig) -> Self {
        let impute_column = if config.impute_column.is_empty() {
            None
        } else {
            Some(config.impute_column.clone())
        };
        Self::new(config.drop_columns.clone(), config.outlier_columns.clone(), impute_column)
            .with_impute_strategy(config.impute_strategy)
            .with_iqr_factor(config.iqr_factor)
    }

    pub fn with_impute_strategy(mut self, strategy: ImputeStrategy) -> Self {
        self.impute_strategy = strategy;
        self
    }

    pub fn with_iqr_factor(mut self, factor: f64) -> Self {
        self.iqr_factor = factor;
        self
    }

    /// Clean `df` and return the cleaned copy with the statistics fitted on it.
    /// The input frame is left untouched.
    pub fn clean(&self, df: &DataFrame) -> Result<(DataFrame, ColumnStats)> {
        let timer = Timer::start();
        let mut out = Self::drop_columns(df, &self.drop_columns)?;
        require_columns(&out, &self.outlier_columns)?;

        let mut stats = ColumnStats {
            dropped_columns: self.drop_columns.clone(),
            ..Default::default()
        };

        for column in &self.outlier_columns {
            match fit_bounds(&out, column, self.iqr_factor)? {
                Some(bounds) => {
                    let n = clip_column(&mut out, column, &bounds)?;
                    debug!(column = %column, clipped = n, "clipped outliers");
                    stats.bounds.insert(column.clone(), bounds);
                }
                None => warn!(column = %column, "outlier column has no values, skipping"),
            }
        }

        if let Some(column) = &self.impute_column {
            if !self.impute_strategy.is_supported() {
                warn!(
                    column = %column,
                    strategy = %self.impute_strategy,
                    "only median imputation is implemented, leaving missing values in place"
                );
            } else {
                require_columns(&out, &[column])?;
                let fill = column_median(&out, column)?.ok_or_else(|| {
                    PipelineError::DataError(format!("column '{}' has no values to take a median of", column))
                })?;
                let n = fill_missing(&mut out, column, fill)?;
                debug!(column = %column, median = fill, filled = n, "imputed missing values");
                stats.medians.insert(column.clone(), fill);
            }
        }

        info!(
            rows = out.height(),
            columns = out.width(),
            elapsed_ms = timer.elapsed_ms(),
            "cleaning complete"
        );
        Ok((out, stats))
    }

    /// Clean `df` with previously fitted statistics.
    pub fn apply(df: &DataFrame, stats: &ColumnStats) -> Result<DataFrame> {
        let mut out = Self::drop_columns(df, &stats.dropped_columns)?;
        let columns: Vec<&String> = stats.bounds.keys().chain(stats.medians.keys()).collect();
        require_columns(&out, &columns)?;

        for (column, bounds) in &stats.bounds {
            clip_column(&mut out, column, bounds)?;
        }
        for (column, fill) in &stats.medians {
            fill_missing(&mut out, column, *fill)?;
        }
        debug!(rows = out.height(), "applied fitted cleaning statistics");
        Ok(out)
    }

    fn drop_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        require_columns(df, columns)?;
        let mut out = df.clone();
        for column in columns {
            out = out.drop(column)?;
        }
        Ok(out)
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::from_config(&CleaningConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::utils::frame::{column_f64, column_f64_strict};

    fn raw() -> DataFrame {
        df!(
            "id" => &[1i64, 2, 3, 4, 5, 6],
            "distance" => &[100.0, 200.0, 300.0, 400.0, 500.0, 9000.0],
            "delay" => &[Some(0.0), Some(5.0), None, Some(10.0), Some(15.0), Some(600.0)],
            "class" => &["Eco", "Business", "Eco", "Eco Plus", "Business", "Eco"]
        )
        .unwrap()
    }

    fn cleaner() -> Cleaner {
        Cleaner::new(
            vec!["id".to_string()],
            vec!["distance".to_string(), "delay".to_string()],
            Some("delay".to_string()),
        )
    }

    #[test]
    fn test_clean_drops_clips_and_imputes() {
        let df = raw();
        let (out, stats) = cleaner().clean(&df).unwrap();

        assert!(out.column("id").is_err());
        assert_eq!(out.height(), 6);

        for column in ["distance", "delay"] {
            let bounds = stats.bounds_for(column).unwrap();
            let values = column_f64_strict(&out, column).unwrap();
            assert!(values.iter().all(|v| bounds.contains(*v)), "{} not clipped", column);
        }

        let median = stats.median_for("delay").unwrap();
        assert_eq!(column_f64_strict(&out, "delay").unwrap()[2], median);
    }

    #[test]
    fn test_clean_leaves_input_untouched() {
        let df = raw();
        let before = df.clone();
        let _ = cleaner().clean(&df).unwrap();
        assert!(df.equals_missing(&before));
        assert_eq!(column_f64(&df, "delay").unwrap()[2], None);
    }

    #[test]
    fn test_missing_drop_column_is_schema_error() {
        let cleaner = Cleaner::new(vec!["MyUnknownColumn".to_string()], vec![], None);
        let err = cleaner.clean(&raw()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_negative_iqr_factor_is_rejected() {
        let df = df!("x" => &[1.0, 2.0, 3.0, 40.0]).unwrap();
        let err = Cleaner::new(vec![], vec!["x".to_string()], None)
            .with_iqr_factor(-1.0)
            .clean(&df)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_unsupported_strategy_is_noop() {
        let (out, stats) = cleaner()
            .with_impute_strategy(ImputeStrategy::Mean)
            .clean(&raw())
            .unwrap();
        assert!(stats.medians.is_empty());
        assert_eq!(column_f64(&out, "delay").unwrap()[2], None);
    }

    #[test]
    fn test_apply_reuses_fitted_stats() {
        let (_, stats) = cleaner().clean(&raw()).unwrap();
        let holdout = df!(
            "id" => &[7i64, 8],
            "distance" => &[1_000_000.0, 250.0],
            "delay" => &[None, Some(2.0)],
            "class" => &["Eco", "Eco"]
        )
        .unwrap();

        let out = Cleaner::apply(&holdout, &stats).unwrap();
        let distance = column_f64_strict(&out, "distance").unwrap();
        assert_eq!(distance[0], stats.bounds_for("distance").unwrap().upper);
        assert_eq!(column_f64_strict(&out, "delay").unwrap()[0], stats.median_for("delay").unwrap());
    }
}
