//! Derived delay features and age binning

use crate::config::FeatureConfig;
use crate::error::{PipelineError, Result};
use crate::utils::{column_f64, require_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::encoder::{LabelEncoder, LabelMapping};

/// Ordered age categories over right-closed intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    /// (0, 18]
    Child,
    /// (18, 30]
    Youngster,
    /// (30, 50]
    Adult,
    /// (50, 100]
    Senior,
}

impl AgeGroup {
    pub const EDGES: [f64; 5] = [0.0, 18.0, 30.0, 50.0, 100.0];
    pub const ALL: [AgeGroup; 4] = [
        AgeGroup::Child,
        AgeGroup::Youngster,
        AgeGroup::Adult,
        AgeGroup::Senior,
    ];

    pub fn from_age(age: f64) -> Result<Self> {
        for (i, group) in Self::ALL.iter().enumerate() {
            if age > Self::EDGES[i] && age <= Self::EDGES[i + 1] {
                return Ok(*group);
            }
        }
        Err(PipelineError::DomainError(format!(
            "age {} is outside the binned range (0, 100]",
            age
        )))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Child => "Child",
            AgeGroup::Youngster => "Youngster",
            AgeGroup::Adult => "Adult",
            AgeGroup::Senior => "Senior",
        }
    }
}

impl std::fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Adds `Total Delay`, `Delay Ratio` and `Age Group` columns
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Return a copy of `df` with the derived columns appended.
    pub fn build(&self, df: &DataFrame) -> Result<DataFrame> {
        let c = &self.config;
        require_columns(df, &[&c.departure_delay, &c.arrival_delay, &c.flight_distance, &c.age])?;

        let departure = column_f64(df, &c.departure_delay)?;
        let arrival = column_f64(df, &c.arrival_delay)?;
        let distance = column_f64(df, &c.flight_distance)?;

        let total: Vec<Option<f64>> = departure
            .iter()
            .zip(&arrival)
            .map(|(d, a)| Some((*d)? + (*a)?))
            .collect();
        let ratio: Vec<Option<f64>> = total
            .iter()
            .zip(&distance)
            .map(|(t, dist)| Some((*t)? / ((*dist)? + 1.0)))
            .collect();
        let groups = self.age_groups(df)?;

        let mut out = df.clone();
        out.with_column(Series::new(c.total_delay.as_str().into(), total))?;
        out.with_column(Series::new(c.delay_ratio.as_str().into(), ratio))?;
        out.with_column(Series::new(
            c.age_group.as_str().into(),
            groups.iter().map(|g| g.label()).collect::<Vec<_>>(),
        ))?;

        info!(rows = out.height(), columns = out.width(), "derived features built");
        Ok(out)
    }

    /// Label-encode the configured categorical columns, including the derived
    /// age group and the target.
    pub fn encode(&self, df: &DataFrame) -> Result<(DataFrame, BTreeMap<String, LabelMapping>)> {
        LabelEncoder::new(self.config.categorical_columns.clone()).encode(df)
    }

    fn age_groups(&self, df: &DataFrame) -> Result<Vec<AgeGroup>> {
        let age_column = &self.config.age;
        column_f64(df, age_column)?
            .into_iter()
            .enumerate()
            .map(|(row, age)| match age {
                Some(a) => AgeGroup::from_age(a).map_err(|e| {
                    PipelineError::DomainError(format!("row {}: {}", row, e))
                }),
                None => Err(PipelineError::DomainError(format!(
                    "row {}: missing value in '{}'",
                    row, age_column
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::utils::frame::{column_f64_strict, column_str};

    fn frame(ages: &[f64]) -> DataFrame {
        let n = ages.len();
        df!(
            "Departure Delay in Minutes" => vec![10.0; n],
            "Arrival Delay in Minutes" => vec![5.0; n],
            "Flight Distance" => vec![100.0; n],
            "Age" => ages
        )
        .unwrap()
    }

    #[test]
    fn test_age_bins() {
        let out = FeatureBuilder::default().build(&frame(&[10.0, 25.0, 40.0, 70.0])).unwrap();
        let groups: Vec<String> = column_str(&out, "Age Group")
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(groups, vec!["Child", "Youngster", "Adult", "Senior"]);
    }

    #[test]
    fn test_bin_edges_are_right_closed() {
        assert_eq!(AgeGroup::from_age(18.0).unwrap(), AgeGroup::Child);
        assert_eq!(AgeGroup::from_age(18.5).unwrap(), AgeGroup::Youngster);
        assert_eq!(AgeGroup::from_age(100.0).unwrap(), AgeGroup::Senior);
        assert!(AgeGroup::from_age(0.0).is_err());
        assert!(AgeGroup::from_age(100.5).is_err());
    }

    #[test]
    fn test_delay_features() {
        let out = FeatureBuilder::default().build(&frame(&[30.0])).unwrap();
        let total = column_f64_strict(&out, "Total Delay").unwrap();
        let ratio = column_f64_strict(&out, "Delay Ratio").unwrap();
        assert_eq!(total[0], 15.0);
        assert!((ratio[0] - 15.0 / 101.0).abs() < 1e-12);
        assert!((ratio[0] - 0.1485).abs() < 1e-4);
    }

    #[test]
    fn test_out_of_range_age_is_domain_error() {
        let err = FeatureBuilder::default().build(&frame(&[30.0, 120.0])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_build_then_encode_age_group() {
        let built = FeatureBuilder::default().build(&frame(&[10.0, 70.0, 40.0])).unwrap();
        let config = FeatureConfig {
            categorical_columns: vec!["Age Group".to_string()],
            ..FeatureConfig::default()
        };
        let (encoded, mappings) = FeatureBuilder::new(config).encode(&built).unwrap();

        let mapping = &mappings["Age Group"];
        let codes = column_f64_strict(&encoded, "Age Group").unwrap();
        let decoded: Vec<&str> = codes.iter().map(|c| mapping.decode(*c as i64).unwrap()).collect();
        assert_eq!(decoded, vec!["Child", "Senior", "Adult"]);
    }

    #[test]
    fn test_missing_source_column_is_schema_error() {
        let df = df!("Age" => &[20.0]).unwrap();
        let err = FeatureBuilder::default().build(&df).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
