//! Gradient boosting classifier
//!
//! Binary log-loss boosting over regression trees. Each round fits a tree to
//! the residuals `y - p` on a row and column subsample and adds its shrunken
//! output to the running log-odds.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{FittedModel, HyperParams, TrainableClassifier};
use crate::error::{PipelineError, Result};

const PROBA_EPS: f64 = 1e-10;

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        let check = |name: &str, value: f64, ok: bool, reason: &str| {
            if ok {
                Ok(())
            } else {
                Err(PipelineError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: reason.to_string(),
                })
            }
        };
        check("n_estimators", self.n_estimators as f64, self.n_estimators > 0, "must be positive")?;
        check("learning_rate", self.learning_rate, self.learning_rate > 0.0, "must be positive")?;
        check("subsample", self.subsample, self.subsample > 0.0 && self.subsample <= 1.0, "must be in (0, 1]")?;
        check(
            "colsample_bytree",
            self.colsample_bytree,
            self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0,
            "must be in (0, 1]",
        )
    }
}

/// Gradient Boosting Classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    /// Sorted class codes; index 1 is the positive class
    classes: Vec<f64>,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            classes: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 {
            return Err(PipelineError::TrainingError("no training rows".to_string()));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        if classes.len() > 2 {
            return Err(PipelineError::TrainingError(format!(
                "gradient boosting supports binary targets, found {} classes",
                classes.len()
            )));
        }
        self.classes = classes;
        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.feature_importances = vec![0.0; n_features];

        // A single-class target needs no trees
        if self.classes.len() < 2 {
            return Ok(());
        }

        let positive = self.classes[1];
        let target: Array1<f64> = y.iter().map(|&v| if v == positive { 1.0 } else { 0.0 }).collect();

        let p = target.mean().unwrap_or(0.5).clamp(PROBA_EPS, 1.0 - PROBA_EPS);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = target
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, &lo)| yi - sigmoid(lo))
                .collect();

            let sample_indices = sample_sorted(n_samples, self.config.subsample, &mut rng);
            let col_indices = sample_sorted(n_features, self.config.colsample_bytree, &mut rng);

            let x_sub = x.select(Axis(0), &sample_indices).select(Axis(1), &col_indices);
            let y_sub = residuals.select(Axis(0), &sample_indices);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            let tree_pred = tree.predict(&x.select(Axis(1), &col_indices))?;
            log_odds.scaled_add(self.config.learning_rate, &tree_pred);

            if let Some(tree_importance) = tree.feature_importances() {
                for (j, &col_idx) in col_indices.iter().enumerate() {
                    self.feature_importances[col_idx] += tree_importance[j];
                }
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Predict class labels with a 0.5 threshold on the positive class
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self.classes.as_slice() {
            [] => Err(PipelineError::ModelNotFitted),
            [only] => Ok(Array1::from_elem(x.nrows(), *only)),
            [negative, positive] => {
                let probs = self.predict_proba(x)?;
                Ok(probs.mapv(|p| if p >= 0.5 { *positive } else { *negative }))
            }
            _ => Err(PipelineError::TrainingError("more than two classes".to_string())),
        }
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, col_indices) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let tree_pred = tree.predict(&x.select(Axis(1), col_indices))?;
            log_odds.scaled_add(self.config.learning_rate, &tree_pred);
        }
        Ok(log_odds.mapv(sigmoid))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

fn sigmoid(z: f64) -> f64 {
    (1.0 / (1.0 + (-z).exp())).clamp(PROBA_EPS, 1.0 - PROBA_EPS)
}

fn sample_sorted(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let size = (((n as f64) * ratio).ceil() as usize).clamp(1, n.max(1));
    let mut indices: Vec<usize> = (0..n).collect();
    if size < n {
        indices.shuffle(rng);
        indices.truncate(size);
        indices.sort_unstable();
    }
    indices
}

/// Registry entry for `gradient_boosting`
#[derive(Debug, Clone)]
pub struct GradientBoostingTrainer {
    pub random_state: u64,
}

impl TrainableClassifier for GradientBoostingTrainer {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &[
            "n_estimators",
            "learning_rate",
            "max_depth",
            "min_samples_leaf",
            "subsample",
            "colsample_bytree",
        ]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let defaults = GradientBoostingConfig::default();
        let config = GradientBoostingConfig {
            n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
            learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
            max_depth: params.usize_or("max_depth", defaults.max_depth)?,
            min_samples_leaf: params.usize_or("min_samples_leaf", defaults.min_samples_leaf)?,
            subsample: params.f64_or("subsample", defaults.subsample)?,
            colsample_bytree: params.f64_or("colsample_bytree", defaults.colsample_bytree)?,
            random_state: self.random_state,
        };
        let mut model = GradientBoostingClassifier::new(config);
        model.fit(x, y)?;
        Ok(FittedModel::GradientBoosting(model))
    }
}
