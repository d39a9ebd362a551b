//! Mutual-information feature selection
//!
//! Every distinct value of a feature is treated as its own category. Scores are
//! computed on the training part of a seeded split that exists only for ranking.

use crate::error::{PipelineError, Result};
use crate::training::cross_validation::train_test_split;
use crate::utils::frame::column_names;
use crate::utils::{column_to_array1, columns_to_array2, Timer};
use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Features ordered by descending mutual information with the target.
/// Ties keep the original column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRanking {
    entries: Vec<(String, f64)>,
}

impl FeatureRanking {
    /// Rank `(name, score)` pairs given in column order.
    pub fn from_scores(scores: Vec<(String, f64)>) -> Self {
        let mut entries = scores;
        // stable: equal scores keep column order
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn top(&self, k: usize) -> Vec<&str> {
        self.entries.iter().take(k).map(|(n, _)| n.as_str()).collect()
    }

    pub fn score(&self, feature: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == feature).map(|(_, s)| *s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keeps the `k` features sharing the most information with the target
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    k: usize,
    test_size: f64,
    random_state: u64,
}

impl FeatureSelector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            test_size: 0.2,
            random_state: 42,
        }
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Return the `k` best features plus `target`, in their original column
    /// order, together with the full ranking.
    pub fn select(&self, df: &DataFrame, target: &str) -> Result<(DataFrame, FeatureRanking)> {
        let timer = Timer::start();
        let columns = column_names(df);
        if !columns.iter().any(|c| c == target) {
            return Err(PipelineError::missing_column(target));
        }
        let candidates: Vec<String> = columns.iter().filter(|c| *c != target).cloned().collect();
        if candidates.len() < self.k {
            return Err(PipelineError::InsufficientFeatures {
                requested: self.k,
                available: candidates.len(),
            });
        }

        let x = columns_to_array2(df, &candidates)?;
        let y = column_to_array1(df, target)?;
        let (train_idx, _) = train_test_split(df.height(), self.test_size, self.random_state)?;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);

        let scores = mutual_info_scores(&x_train, y_train.view());
        let ranking = FeatureRanking::from_scores(candidates.iter().cloned().zip(scores).collect());
        for (name, score) in ranking.entries() {
            debug!(feature = %name, score, "mutual information");
        }

        let top = ranking.top(self.k);
        let mut keep: Vec<&str> = candidates
            .iter()
            .map(|c| c.as_str())
            .filter(|c| top.contains(c))
            .collect();
        keep.push(target);
        let out = df.select(keep)?;

        info!(
            k = self.k,
            candidates = candidates.len(),
            rows_scored = train_idx.len(),
            elapsed_ms = timer.elapsed_ms(),
            "feature selection complete"
        );
        Ok((out, ranking))
    }
}

/// Discrete mutual information of every column of `x` with `y`, in nats.
pub fn mutual_info_scores(x: &Array2<f64>, y: ArrayView1<f64>) -> Vec<f64> {
    let (y_codes, n_y) = discrete_codes(y);
    (0..x.ncols())
        .into_par_iter()
        .map(|j| {
            let (x_codes, n_x) = discrete_codes(x.column(j));
            discrete_mutual_info(&x_codes, n_x, &y_codes, n_y)
        })
        .collect()
}

/// Map values to dense codes in sorted value order.
fn discrete_codes(values: ArrayView1<f64>) -> (Vec<usize>, usize) {
    let mut distinct: Vec<f64> = values.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup_by(|a, b| a.total_cmp(b).is_eq());

    let codes = values
        .iter()
        .map(|v| {
            distinct
                .binary_search_by(|d| d.total_cmp(v))
                .unwrap_or_default()
        })
        .collect();
    (codes, distinct.len())
}

fn discrete_mutual_info(x: &[usize], n_x: usize, y: &[usize], n_y: usize) -> f64 {
    let n = x.len();
    if n == 0 {
        return 0.0;
    }

    let mut joint = vec![0usize; n_x * n_y];
    let mut count_x = vec![0usize; n_x];
    let mut count_y = vec![0usize; n_y];
    for (&xi, &yi) in x.iter().zip(y) {
        joint[xi * n_y + yi] += 1;
        count_x[xi] += 1;
        count_y[yi] += 1;
    }

    let n_f = n as f64;
    let mut mi = 0.0;
    for xi in 0..n_x {
        for yi in 0..n_y {
            let c = joint[xi * n_y + yi];
            if c > 0 {
                let c = c as f64;
                mi += c / n_f * (c * n_f / (count_x[xi] as f64 * count_y[yi] as f64)).ln();
            }
        }
    }
    mi.max(0.0)
}
