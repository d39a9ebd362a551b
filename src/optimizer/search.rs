//! Exhaustive grid search scored by cross-validated accuracy

use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::grid::HyperparameterGrid;
use crate::error::Result;
use crate::training::{accuracy, CVResults, CrossValidator, HyperParams, TrainableClassifier};
use crate::utils::select_rows;

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub params: HyperParams,
    /// Accuracy per fold
    pub cv: CVResults,
    pub duration_secs: f64,
}

impl TrialResult {
    pub fn value(&self) -> f64 {
        self.cv.mean
    }
}

/// Every trial of one search, in grid order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<TrialResult>,
    pub best_trial_idx: Option<usize>,
    pub total_duration_secs: f64,
}

impl Study {
    pub fn new() -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
        }
    }

    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value())
    }

    pub fn best_params(&self) -> Option<&HyperParams> {
        self.best_trial().map(|t| &t.params)
    }

    /// Append a trial. Only a strictly higher score replaces the best, so
    /// ties keep the earliest combination.
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = match self.best_value() {
            None => true,
            Some(best) => result.value() > best,
        };
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }
}

impl Default for Study {
    fn default() -> Self {
        Self::new()
    }
}

/// Grid search over one classifier family
pub struct GridSearch {
    trainer: Arc<dyn TrainableClassifier>,
    cv: CrossValidator,
}

impl GridSearch {
    pub fn new(trainer: Arc<dyn TrainableClassifier>, cv: CrossValidator) -> Self {
        Self { trainer, cv }
    }

    /// Score every combination. Combinations run in parallel; the study keeps grid order.
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>, grid: &HyperparameterGrid) -> Result<Study> {
        let start = Instant::now();
        let combos = grid.combinations()?;
        // Fail on unknown names before any fitting
        for combo in &combos {
            self.trainer.check_params(combo)?;
        }
        let splits = self.cv.split(x.nrows(), Some(y))?;

        let trials: Vec<TrialResult> = combos
            .into_par_iter()
            .enumerate()
            .map(|(trial_id, params)| {
                let trial_start = Instant::now();
                let scores = splits
                    .iter()
                    .map(|split| {
                        let (x_train, y_train) = select_rows(x, y, &split.train_indices);
                        let (x_val, y_val) = select_rows(x, y, &split.test_indices);
                        let model = self.trainer.fit(&x_train, &y_train, &params)?;
                        Ok(accuracy(&y_val, &model.predict(&x_val)?))
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let cv = CVResults::from_scores(scores);
                debug!(trial = trial_id, params = %params, cv_accuracy = cv.mean, "grid combination scored");
                Ok(TrialResult {
                    trial_id,
                    params,
                    cv,
                    duration_secs: trial_start.elapsed().as_secs_f64(),
                })
            })
            .collect::<Result<_>>()?;

        let mut study = Study::new();
        for trial in trials {
            study.add_trial(trial);
        }
        study.total_duration_secs = start.elapsed().as_secs_f64();
        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ClassifierRegistry, ParamValue};

    fn trial(id: usize, score: f64) -> TrialResult {
        TrialResult {
            trial_id: id,
            params: HyperParams::new(),
            cv: CVResults::from_scores(vec![score]),
            duration_secs: 0.0,
        }
    }

    #[test]
    fn test_study_keeps_first_of_ties() {
        let mut study = Study::new();
        study.add_trial(trial(0, 0.8));
        study.add_trial(trial(1, 0.9));
        study.add_trial(trial(2, 0.9));
        assert_eq!(study.best_trial().unwrap().trial_id, 1);
    }

    #[test]
    fn test_grid_search_best_is_in_grid() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(30, |i| if i >= 15 { 1.0 } else { 0.0 });
        let trainer = ClassifierRegistry::with_defaults(42).get("decision_tree").unwrap();
        let grid = HyperparameterGrid::new().with_values("max_depth", vec![ParamValue::Int(1), ParamValue::Int(3)]);

        let study = GridSearch::new(trainer, CrossValidator::stratified(3)).run(&x, &y, &grid).unwrap();
        assert_eq!(study.trials.len(), 2);
        assert!(grid.contains(study.best_params().unwrap()));
        assert_eq!(study.trials[0].cv.scores.len(), 3);
    }

    #[test]
    fn test_unknown_param_fails_before_fitting() {
        let x = Array2::zeros((6, 1));
        let y = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let trainer = ClassifierRegistry::with_defaults(42).get("naive_bayes").unwrap();
        let grid = HyperparameterGrid::new().with_values("n_estimators", vec![ParamValue::Int(10)]);
        let err = GridSearch::new(trainer, CrossValidator::stratified(3)).run(&x, &y, &grid).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameter);
    }
}
