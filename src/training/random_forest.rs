//! Random forest classifier

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{FittedModel, HyperParams, TrainableClassifier};

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    Fixed(usize),
    All,
}

impl MaxFeatures {
    pub fn from_param(params: &HyperParams) -> Result<Self> {
        use super::models::ParamValue;
        match params.get("max_features") {
            None => Ok(MaxFeatures::Sqrt),
            Some(ParamValue::Null) => Ok(MaxFeatures::All),
            Some(ParamValue::Str(s)) if s == "sqrt" => Ok(MaxFeatures::Sqrt),
            Some(ParamValue::Str(s)) if s == "log2" => Ok(MaxFeatures::Log2),
            Some(ParamValue::Str(s)) if s == "all" => Ok(MaxFeatures::All),
            Some(v) => v.as_usize().filter(|&n| n > 0).map(MaxFeatures::Fixed).ok_or_else(|| {
                PipelineError::InvalidParameter {
                    name: "max_features".to_string(),
                    value: v.to_string(),
                    reason: "expected sqrt, log2, all, null or a positive integer".to_string(),
                }
            }),
        }
    }

    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fixed(n) => (*n).min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Bagged decision trees with per-split feature sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fit the forest. Tree `i` is seeded with `random_state + i`, so results do
    /// not depend on thread scheduling.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::DataError(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 || self.n_estimators == 0 {
            return Err(PipelineError::TrainingError(
                "random forest needs at least one row and one tree".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        self.classes = classes;

        let max_features = self.max_features.resolve(self.n_features);
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new_classifier()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(Some(max_features))
                    .with_random_state(rng.gen());
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<_>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (t, v) in total.iter_mut().zip(imp.iter()) {
                    *t += v;
                }
            }
        }
        let n_trees = self.trees.len().max(1) as f64;
        self.feature_importances = Some(Array1::from_vec(total.into_iter().map(|v| v / n_trees).collect()));
    }

    /// Majority vote across trees; the lowest class wins ties.
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

    /// Fraction of trees voting for each class, columns in sorted class order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        let votes: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let n_classes = self.classes.len();
        let mut proba = Array2::<f64>::zeros((x.nrows(), n_classes));
        for tree_votes in &votes {
            for (i, v) in tree_votes.iter().enumerate() {
                if let Ok(c) = self.classes.binary_search_by(|k| k.total_cmp(v)) {
                    proba[[i, c]] += 1.0;
                }
            }
        }
        proba /= votes.len() as f64;
        Ok(proba)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

/// Registry entry for `random_forest`
#[derive(Debug, Clone)]
pub struct RandomForestTrainer {
    pub random_state: u64,
}

impl TrainableClassifier for RandomForestTrainer {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &[
            "n_estimators",
            "max_depth",
            "min_samples_split",
            "min_samples_leaf",
            "max_features",
            "criterion",
            "bootstrap",
        ]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let mut forest = RandomForest::new(params.usize_or("n_estimators", 100)?)
            .with_max_depth(params.opt_usize_or("max_depth", None)?)
            .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
            .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?)
            .with_max_features(MaxFeatures::from_param(params)?)
            .with_criterion(Criterion::from_name(params.str_or("criterion", "gini")?)?)
            .with_random_state(self.random_state);
        if let Some(v) = params.get("bootstrap") {
            forest.bootstrap = matches!(v, super::models::ParamValue::Bool(true));
        }
        forest.fit(x, y)?;
        Ok(FittedModel::RandomForest(forest))
    }
}
