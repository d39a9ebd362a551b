//! AdaBoost over decision stumps (SAMME)
//!
//! Each round fits a one-split stump to the weighted sample, then raises the
//! weight of the rows it got wrong. Prediction is an alpha-weighted vote.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::models::{FittedModel, HyperParams, TrainableClassifier};
use crate::error::{PipelineError, Result};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Class index when feature <= threshold
    left: usize,
    /// Class index when feature > threshold
    right: usize,
}

impl Stump {
    fn predict_sample(&self, sample: ArrayView1<f64>) -> usize {
        if sample[self.feature_index] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Rounds actually kept; boosting stops early on a perfect or useless stump.
    pub fn n_rounds(&self) -> usize {
        self.stumps.len()
    }

    /// Best stump under `weights`, found with one sorted sweep per feature.
    fn fit_stump(x: &Array2<f64>, codes: &[usize], weights: &Array1<f64>, n_classes: usize) -> Stump {
        let mut totals = vec![0.0; n_classes];
        for (&c, &w) in codes.iter().zip(weights.iter()) {
            totals[c] += w;
        }
        let total: f64 = totals.iter().sum();
        let majority = argmax(&totals);

        // Constant stump, used when no feature has two distinct values
        let mut best = Stump {
            feature_index: 0,
            threshold: f64::INFINITY,
            left: majority,
            right: majority,
        };
        let mut best_error = total - totals[majority];

        let mut order: Vec<usize> = (0..x.nrows()).collect();
        for f in 0..x.ncols() {
            let col = x.column(f);
            order.sort_by(|&a, &b| col[a].total_cmp(&col[b]));

            let mut left = vec![0.0; n_classes];
            for pos in 0..order.len().saturating_sub(1) {
                let i = order[pos];
                left[codes[i]] += weights[i];
                let next = col[order[pos + 1]];
                if next == col[i] {
                    continue;
                }
                let right: Vec<f64> = totals.iter().zip(&left).map(|(t, l)| t - l).collect();
                let (l, r) = (argmax(&left), argmax(&right));
                let error = total - left[l] - right[r];
                if error < best_error {
                    best_error = error;
                    best = Stump {
                        feature_index: f,
                        threshold: (col[i] + next) / 2.0,
                        left: l,
                        right: r,
                    };
                }
            }
        }
        best
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::DataError(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError("no training rows".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        let codes: Vec<usize> = y
            .iter()
            .map(|v| classes.partition_point(|c| c.total_cmp(v).is_lt()))
            .collect();
        let n_classes = classes.len();

        self.classes = classes;
        self.n_features = x.ncols();
        self.stumps.clear();
        self.alphas.clear();

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        for _round in 0..self.n_estimators {
            let stump = Self::fit_stump(x, &codes, &weights, n_classes);
            let wrong: Vec<bool> = x
                .rows()
                .into_iter()
                .zip(&codes)
                .map(|(row, &c)| stump.predict_sample(row) != c)
                .collect();
            let error: f64 = weights.iter().zip(&wrong).filter_map(|(w, &is_wrong)| is_wrong.then_some(*w)).sum();

            if error <= 1e-12 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            // SAMME needs better than chance among n_classes
            if error >= 1.0 - 1.0 / n_classes.max(2) as f64 {
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes as f64 - 1.0).max(1.0).ln());
            for (w, &is_wrong) in weights.iter_mut().zip(&wrong) {
                if is_wrong {
                    *w *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.stumps.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::SchemaError(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut votes = vec![0.0; self.classes.len()];
                for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
                    votes[stump.predict_sample(row)] += alpha;
                }
                self.classes[argmax(&votes)]
            })
            .collect())
    }

    /// Alpha-weighted share of rounds that split on each feature
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() || self.n_features == 0 {
            return None;
        }
        let mut importances = Array1::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            if stump.threshold.is_finite() {
                importances[stump.feature_index] += alpha.abs();
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        Some(importances)
    }
}

/// First index of the largest value
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Registry entry for `adaboost`
#[derive(Debug, Clone, Default)]
pub struct AdaBoostTrainer;

impl TrainableClassifier for AdaBoostTrainer {
    fn name(&self) -> &'static str {
        "adaboost"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["n_estimators", "learning_rate"]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let defaults = AdaBoostClassifier::default();
        let mut model = AdaBoostClassifier::default()
            .with_n_estimators(params.usize_or("n_estimators", defaults.n_estimators)?)
            .with_learning_rate(params.f64_or("learning_rate", defaults.learning_rate)?);
        model.fit(x, y)?;
        Ok(FittedModel::AdaBoost(model))
    }
}
