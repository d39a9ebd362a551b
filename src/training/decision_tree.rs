//! CART decision tree
//!
//! Splits are found by sorting each candidate feature once per node and
//! sweeping the sorted order with running class counts (or running sums for
//! regression), so every threshold is scored in constant time.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::{FittedModel, HyperParams, TrainableClassifier};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
    /// Variance reduction, for regression trees
    Mse,
}

impl Criterion {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            "mse" | "squared_error" => Ok(Criterion::Mse),
            other => Err(PipelineError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected gini, entropy or mse".to_string(),
            }),
        }
    }

    fn of_counts(&self, counts: &[usize], n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self {
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            _ => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
        }
    }
}

fn variance(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

/// Candidate split of one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per node; `None` considers all of them
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Regression tree, used as the weak learner in gradient boosting
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::Mse,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
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

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::DataError(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError("cannot fit a tree on zero rows".to_string()));
        }
        if self.is_classification && self.criterion == Criterion::Mse {
            return Err(PipelineError::InvalidParameter {
                name: "criterion".to_string(),
                value: "mse".to_string(),
                reason: "classification trees use gini or entropy".to_string(),
            });
        }

        self.n_features = n_features;
        let targets = if self.is_classification {
            let mut classes: Vec<f64> = y.to_vec();
            classes.sort_by(|a, b| a.total_cmp(b));
            classes.dedup();
            let codes = y
                .iter()
                .map(|v| classes.binary_search_by(|c| c.total_cmp(v)).unwrap_or_default())
                .collect();
            self.classes = classes;
            Targets::Classes(codes)
        } else {
            Targets::Values(y.to_vec())
        };

        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &targets, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let leaf = || TreeNode::Leaf {
            value: self.leaf_value(targets, indices),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || targets.is_pure(indices);
        if should_stop {
            return leaf();
        }

        let features = self.candidate_features(rng);
        let Some(best) = self.find_best_split(x, targets, indices, &features) else {
            return leaf();
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);
        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return leaf();
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, targets, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, targets, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            gain: best.gain,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut picked = rand::seq::index::sample(rng, self.n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let parent = self.impurity(targets, indices);

        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| self.best_split_for_feature(x.column(feature_idx), feature_idx, targets, indices, parent))
            .collect();

        // first feature wins ties
        per_feature.into_iter().flatten().fold(None, |best, cand| match best {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        })
    }

    fn best_split_for_feature(
        &self,
        column: ArrayView1<f64>,
        feature_idx: usize,
        targets: &Targets,
        indices: &[usize],
        parent: f64,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

        let n = order.len();
        let n_f = n as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut consider = |left_n: usize, left_imp: f64, right_imp: f64, pos: usize| {
            let right_n = n - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                return;
            }
            let weighted = (left_n as f64 * left_imp + right_n as f64 * right_imp) / n_f;
            let gain = parent - weighted;
            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                let lo = column[order[pos]];
                let hi = column[order[pos + 1]];
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: lo + (hi - lo) / 2.0,
                    gain,
                });
            }
        };

        match targets {
            Targets::Classes(codes) => {
                let n_classes = self.classes.len();
                let mut total = vec![0usize; n_classes];
                for &i in &order {
                    total[codes[i]] += 1;
                }
                let mut left = vec![0usize; n_classes];
                let mut right = total;
                for pos in 0..n - 1 {
                    let c = codes[order[pos]];
                    left[c] += 1;
                    right[c] -= 1;
                    if column[order[pos]] == column[order[pos + 1]] {
                        continue;
                    }
                    let left_n = pos + 1;
                    let li = self.criterion.of_counts(&left, left_n);
                    let ri = self.criterion.of_counts(&right, n - left_n);
                    consider(left_n, li, ri, pos);
                }
            }
            Targets::Values(values) => {
                let (mut total_sum, mut total_sq) = (0.0, 0.0);
                for &i in &order {
                    total_sum += values[i];
                    total_sq += values[i] * values[i];
                }
                let (mut left_sum, mut left_sq) = (0.0, 0.0);
                for pos in 0..n - 1 {
                    let v = values[order[pos]];
                    left_sum += v;
                    left_sq += v * v;
                    if column[order[pos]] == column[order[pos + 1]] {
                        continue;
                    }
                    let left_n = pos + 1;
                    let li = variance(left_n, left_sum, left_sq);
                    let ri = variance(n - left_n, total_sum - left_sum, total_sq - left_sq);
                    consider(left_n, li, ri, pos);
                }
            }
        }
        best
    }

    fn impurity(&self, targets: &Targets, indices: &[usize]) -> f64 {
        match targets {
            Targets::Classes(codes) => {
                let counts = class_counts(codes, indices, self.classes.len());
                self.criterion.of_counts(&counts, indices.len())
            }
            Targets::Values(values) => {
                let (sum, sq) = indices
                    .iter()
                    .fold((0.0, 0.0), |(s, q), &i| (s + values[i], q + values[i] * values[i]));
                variance(indices.len(), sum, sq)
            }
        }
    }

    fn leaf_value(&self, targets: &Targets, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        match targets {
            Targets::Classes(codes) => {
                let counts = class_counts(codes, indices, self.classes.len());
                // lowest class wins ties
                let mut best = 0;
                for (c, &count) in counts.iter().enumerate() {
                    if count > counts[best] {
                        best = c;
                    }
                }
                self.classes[best]
            }
            Targets::Values(values) => {
                indices.iter().map(|&i| values[i]).sum::<f64>() / indices.len() as f64
            }
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::DataError(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(x.rows().into_iter().map(|row| Self::predict_sample(root, row)).collect())
    }

    fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

enum Targets {
    /// Dense class index per row
    Classes(Vec<usize>),
    Values(Vec<f64>),
}

impl Targets {
    fn is_pure(&self, indices: &[usize]) -> bool {
        let Some(&first) = indices.first() else {
            return true;
        };
        match self {
            Targets::Classes(codes) => indices.iter().all(|&i| codes[i] == codes[first]),
            Targets::Values(values) => indices.iter().all(|&i| (values[i] - values[first]).abs() < 1e-12),
        }
    }
}

fn class_counts(codes: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in indices {
        counts[codes[i]] += 1;
    }
    counts
}

/// Registry entry for `decision_tree`
#[derive(Debug, Clone)]
pub struct DecisionTreeTrainer {
    pub random_state: u64,
}

impl TrainableClassifier for DecisionTreeTrainer {
    fn name(&self) -> &'static str {
        "decision_tree"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["max_depth", "min_samples_split", "min_samples_leaf", "criterion"]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let mut tree = DecisionTree::new_classifier()
            .with_max_depth(params.opt_usize_or("max_depth", None)?)
            .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
            .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?)
            .with_criterion(Criterion::from_name(params.str_or("criterion", "gini")?)?)
            .with_random_state(self.random_state);
        tree.fit(x, y)?;
        Ok(FittedModel::DecisionTree(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_threshold() {
        let x = array![[1.0, 5.0], [2.0, 3.0], [3.0, 4.0], [4.0, 1.0], [5.0, 2.0], [6.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_regressor_fits_steps() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-9, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_entropy_criterion_and_feature_sampling_are_deterministic() {
        let x = Array2::from_shape_fn((40, 4), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| ((i * 7) % 11 > 5) as u8 as f64);

        let fit = || {
            let mut tree = DecisionTree::new_classifier()
                .with_criterion(Criterion::Entropy)
                .with_max_features(Some(2))
                .with_random_state(3);
            tree.fit(&x, &y).unwrap();
            tree.predict(&x).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_classifier();
        assert!(tree.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_trainer_rejects_unknown_param() {
        let trainer = DecisionTreeTrainer { random_state: 0 };
        let mut params = HyperParams::new();
        params.insert("n_estimators", 10i64);
        let err = trainer.fit(&array![[1.0], [2.0]], &array![0.0, 1.0], &params).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameter);
    }
}
