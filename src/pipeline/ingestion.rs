//! Raw table ingestion and the held-out split

use std::path::PathBuf;

use polars::prelude::*;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::training::train_test_split;
use crate::utils::{take_rows, DataLoader, DataSaver};

/// Row counts written by an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub columns: usize,
}

/// Splits the raw survey table into train and test files
#[derive(Debug, Clone)]
pub struct DataIngestion {
    raw_path: PathBuf,
    train_path: PathBuf,
    test_path: PathBuf,
    test_size: f64,
    random_state: u64,
}

impl DataIngestion {
    pub fn new(raw_path: impl Into<PathBuf>, train_path: impl Into<PathBuf>, test_path: impl Into<PathBuf>) -> Self {
        Self {
            raw_path: raw_path.into(),
            train_path: train_path.into(),
            test_path: test_path.into(),
            test_size: 0.2,
            random_state: 42,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.paths.raw_data, &config.paths.train_data, &config.paths.test_data)
            .with_test_size(config.ingestion.test_size)
            .with_random_state(config.random_state)
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Split an in-memory table into `(train, test)`.
    pub fn split(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let (train_idx, test_idx) = train_test_split(df.height(), self.test_size, self.random_state)?;
        Ok((take_rows(df, &train_idx)?, take_rows(df, &test_idx)?))
    }

    /// Read the raw file and write both splits, overwriting earlier output.
    pub fn run(&self) -> Result<IngestionSummary> {
        info!(path = %self.raw_path.display(), "ingesting raw data");
        let raw = DataLoader::new().load_csv(&self.raw_path)?;
        let (mut train, mut test) = self.split(&raw)?;

        DataSaver::save_csv(&mut train, &self.train_path)?;
        DataSaver::save_csv(&mut test, &self.test_path)?;

        let summary = IngestionSummary {
            train_rows: train.height(),
            test_rows: test.height(),
            columns: raw.width(),
        };
        info!(
            train_rows = summary.train_rows,
            test_rows = summary.test_rows,
            columns = summary.columns,
            "ingestion complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_run_writes_disjoint_splits() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let mut df = df!("id" => (0..50).collect::<Vec<i64>>(), "v" => vec![1.5; 50]).unwrap();
        DataSaver::save_csv(&mut df, &raw).unwrap();

        let ingestion = DataIngestion::new(&raw, dir.path().join("out/train.csv"), dir.path().join("out/test.csv"));
        let summary = ingestion.run().unwrap();
        assert_eq!(summary, IngestionSummary { train_rows: 40, test_rows: 10, columns: 2 });

        let train = DataLoader::new().load_csv(dir.path().join("out/train.csv")).unwrap();
        let test = DataLoader::new().load_csv(dir.path().join("out/test.csv")).unwrap();
        let mut ids: Vec<i64> = train
            .column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .chain(test.column("id").unwrap().i64().unwrap().into_no_null_iter())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_missing_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = DataIngestion::new(dir.path().join("nope.csv"), dir.path().join("a"), dir.path().join("b"));
        assert_eq!(ingestion.run().unwrap_err().kind(), ErrorKind::Io);
    }
}
