//! K-Nearest Neighbors classifier
//!
//! Training rows are standardized and stored. Neighbors are ordered by
//! distance and then by training row index, so equal distances resolve the
//! same way on every run.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{FittedModel, HyperParams, TrainableClassifier};
use crate::error::{PipelineError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl DistanceMetric {
    fn from_name(name: &str, p: f64) -> Result<Self> {
        match name {
            "euclidean" => Ok(Self::Euclidean),
            "manhattan" => Ok(Self::Manhattan),
            "minkowski" if p >= 1.0 => Ok(Self::Minkowski(p)),
            other => Err(PipelineError::InvalidParameter {
                name: "metric".to_string(),
                value: other.to_string(),
                reason: "expected euclidean, manhattan or minkowski with p >= 1".to_string(),
            }),
        }
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs());
        match self {
            Self::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            Self::Manhattan => diffs.sum(),
            Self::Minkowski(p) => diffs.map(|d| d.powf(*p)).sum::<f64>().powf(1.0 / p),
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl WeightScheme {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "uniform" => Ok(Self::Uniform),
            "distance" => Ok(Self::Distance),
            other => Err(PipelineError::InvalidParameter {
                name: "weights".to_string(),
                value: other.to_string(),
                reason: "expected uniform or distance".to_string(),
            }),
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
    feature_means: Array1<f64>,
    feature_stds: Array1<f64>,
    classes: Vec<f64>,
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
            feature_means: Array1::zeros(0),
            feature_stds: Array1::zeros(0),
            classes: Vec::new(),
        }
    }

    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.feature_means) / &self.feature_stds
    }

    /// Store standardized training rows
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.config.n_neighbors == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if x.nrows() == 0 {
            return Err(PipelineError::TrainingError("no training rows".to_string()));
        }

        self.feature_means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        self.feature_stds = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        self.x_train = Some(self.standardize(x));
        self.y_train = Some(y.clone());

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        self.classes = classes;
        Ok(())
    }

    fn fitted(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(PipelineError::ModelNotFitted),
        }
    }

    /// Class vote weights per row, columns in sorted class order
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (x_train, y_train) = self.fitted()?;
        if x.ncols() != x_train.ncols() {
            return Err(PipelineError::SchemaError(format!(
                "expected {} features, got {}",
                x_train.ncols(),
                x.ncols()
            )));
        }
        let xs = self.standardize(x);
        let n_classes = self.classes.len();
        let k = self.config.n_neighbors.min(x_train.nrows());

        let rows: Vec<Vec<f64>> = (0..xs.nrows())
            .into_par_iter()
            .map(|i| {
                let query = xs.row(i);
                let mut neighbors: Vec<(f64, usize)> = x_train
                    .rows()
                    .into_iter()
                    .enumerate()
                    .map(|(j, row)| (self.config.metric.distance(query, row), j))
                    .collect();
                neighbors.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                neighbors.truncate(k);
                self.vote(&neighbors, y_train, n_classes)
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((xs.nrows(), n_classes), flat)?)
    }

    fn vote(&self, neighbors: &[(f64, usize)], y_train: &Array1<f64>, n_classes: usize) -> Vec<f64> {
        let mut votes = vec![0.0; n_classes];
        // An exact match under distance weighting takes the whole vote
        let exact: Vec<&(f64, usize)> = neighbors.iter().filter(|(d, _)| *d == 0.0).collect();
        let use_exact = self.config.weights == WeightScheme::Distance && !exact.is_empty();

        for &(d, j) in neighbors {
            let w = match self.config.weights {
                WeightScheme::Uniform => 1.0,
                WeightScheme::Distance if use_exact => {
                    if d == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                WeightScheme::Distance => 1.0 / d,
            };
            if let Ok(c) = self.classes.binary_search_by(|k| k.total_cmp(&y_train[j])) {
                votes[c] += w;
            }
        }
        let total: f64 = votes.iter().sum();
        if total > 0.0 {
            for v in &mut votes {
                *v /= total;
            }
        }
        votes
    }

    /// Highest vote wins; the lowest class code wins ties.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (c, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = c;
                    }
                }
                self.classes[best]
            })
            .collect())
    }
}

/// Registry entry for `k_nearest_neighbors`
#[derive(Debug, Clone, Default)]
pub struct KNNTrainer;

impl TrainableClassifier for KNNTrainer {
    fn name(&self) -> &'static str {
        "k_nearest_neighbors"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["n_neighbors", "weights", "metric", "p"]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let config = KNNConfig {
            n_neighbors: params.usize_or("n_neighbors", 5)?,
            metric: DistanceMetric::from_name(params.str_or("metric", "euclidean")?, params.f64_or("p", 2.0)?)?,
            weights: WeightScheme::from_name(params.str_or("weights", "uniform")?)?,
        };
        let mut model = KNNClassifier::new(config);
        model.fit(x, y)?;
        Ok(FittedModel::KNearestNeighbors(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn clusters() -> (Array2<f64>, Array1<f64>) {
        let x = array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [5.0, 5.0], [5.1, 4.9], [4.9, 5.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_knn_classifier() {
        let (x, y) = clusters();
        let mut knn = KNNClassifier::with_k(3);
        knn.fit(&x, &y).unwrap();
        let preds = knn.predict(&array![[0.05, 0.05], [5.0, 5.1]]).unwrap();
        assert_eq!(preds, array![0.0, 1.0]);
    }

    #[test]
    fn test_tie_resolves_to_lowest_class() {
        let x = array![[0.0], [2.0]];
        let y = array![1.0, 0.0];
        let mut knn = KNNClassifier::with_k(2);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[1.0]]).unwrap()[0], 0.0);
    }

    #[test]
    fn test_distance_weights_exact_match() {
        let (x, y) = clusters();
        let mut knn = KNNClassifier::new(KNNConfig {
            n_neighbors: 6,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&array![[5.0, 5.0]]).unwrap();
        assert_eq!(proba.row(0).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_unfitted_and_bad_params() {
        assert!(KNNClassifier::with_k(3).predict(&array![[0.0]]).is_err());
        let (x, y) = clusters();
        let mut params = HyperParams::new();
        params.insert("weights", "gaussian");
        assert!(KNNTrainer.fit(&x, &y, &params).is_err());
    }
}
