//! IQR-based outlier clipping
//!
//! Bounds are `[Q1 - factor * IQR, Q3 + factor * IQR]` per column. Values outside
//! are clipped to the nearest bound; rows are never removed.

use crate::error::{PipelineError, Result};
use crate::utils::{column_f64, quartiles};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted clipping bounds for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn from_quartiles(q1: f64, q3: f64, factor: f64) -> Self {
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            lower: q1 - factor * iqr,
            upper: q3 + factor * iqr,
        }
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Compute bounds for one column. `None` if the column has no non-missing values.
pub fn fit_bounds(df: &DataFrame, column: &str, factor: f64) -> Result<Option<OutlierBounds>> {
    if !(factor.is_finite() && factor >= 0.0) {
        return Err(PipelineError::InvalidParameter {
            name: "iqr_factor".to_string(),
            value: factor.to_string(),
            reason: "must be a finite non-negative number".to_string(),
        });
    }
    let values: Vec<f64> = column_f64(df, column)?.into_iter().flatten().collect();
    let bounds = quartiles(&values).map(|(q1, q3)| OutlierBounds::from_quartiles(q1, q3, factor));
    if let Some(b) = &bounds {
        debug!(column, q1 = b.q1, q3 = b.q3, lower = b.lower, upper = b.upper, "fitted IQR bounds");
    }
    Ok(bounds)
}

/// Replace `column` with its clipped values as `Float64`. Missing values stay missing.
pub fn clip_column(df: &mut DataFrame, column: &str, bounds: &OutlierBounds) -> Result<usize> {
    let values = column_f64(df, column)?;
    let mut n_clipped = 0usize;
    let clipped: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| {
            v.map(|x| {
                let c = bounds.clip(x);
                if c != x {
                    n_clipped += 1;
                }
                c
            })
        })
        .collect();

    df.with_column(Series::new(column.into(), clipped))?;
    Ok(n_clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::frame::column_f64_strict;

    #[test]
    fn test_bounds_from_quartiles() {
        let b = OutlierBounds::from_quartiles(10.0, 20.0, 1.5);
        assert_eq!(b.iqr(), 10.0);
        assert_eq!(b.lower, -5.0);
        assert_eq!(b.upper, 35.0);
        assert_eq!(b.clip(100.0), 35.0);
        assert_eq!(b.clip(-7.0), -5.0);
        assert_eq!(b.clip(12.0), 12.0);
    }

    #[test]
    fn test_clip_column_keeps_rows() {
        let mut df = df!("x" => &[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        let bounds = fit_bounds(&df, "x", 1.5).unwrap().unwrap();
        let n = clip_column(&mut df, "x", &bounds).unwrap();

        assert_eq!(n, 1);
        assert_eq!(df.height(), 5);
        let values = column_f64_strict(&df, "x").unwrap();
        assert!(values.iter().all(|v| bounds.contains(*v)));
        // Q1=2, Q3=4, IQR=2 → upper=7
        assert_eq!(values[4], 7.0);
    }

    #[test]
    fn test_all_missing_column_has_no_bounds() {
        let df = df!("x" => &[None::<f64>, None]).unwrap();
        assert!(fit_bounds(&df, "x", 1.5).unwrap().is_none());
    }

    #[test]
    fn test_negative_factor_rejected() {
        let df = df!("x" => &[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        for factor in [-1.0, f64::NAN] {
            let err = fit_bounds(&df, "x", factor).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameter);
        }
        assert!(fit_bounds(&df, "x", 0.0).unwrap().is_some());
    }
}
