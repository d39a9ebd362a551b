//! Logistic regression trained by batch gradient descent
//!
//! Features are standardized with the training means and deviations before
//! fitting. Two classes fit one model for the higher class code; more classes
//! fit one-vs-rest.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::models::{FittedModel, HyperParams, TrainableClassifier};
use crate::error::{PipelineError, Result};

/// L2-regularized logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// One coefficient row per fitted binary model
    pub coefficients: Option<Array2<f64>>,
    pub intercepts: Option<Array1<f64>>,
    /// Regularization strength (L2)
    pub alpha: f64,
    pub max_iter: usize,
    /// Stop when the gradient norm drops below this
    pub tol: f64,
    pub learning_rate: f64,
    feature_means: Array1<f64>,
    feature_stds: Array1<f64>,
    classes: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercepts: None,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            feature_means: Array1::zeros(0),
            feature_stds: Array1::zeros(0),
            classes: Vec::new(),
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.feature_means) / &self.feature_stds
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
        if self.learning_rate <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        self.classes = classes;

        self.feature_means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        // Constant columns keep a unit scale
        self.feature_stds = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = self.standardize(x);

        let positives: Vec<f64> = match self.classes.len() {
            0 | 1 => Vec::new(),
            2 => vec![self.classes[1]],
            _ => self.classes.clone(),
        };

        let mut coefficients = Array2::zeros((positives.len(), x.ncols()));
        let mut intercepts = Array1::zeros(positives.len());
        for (k, &positive) in positives.iter().enumerate() {
            let target = y.mapv(|v| if v == positive { 1.0 } else { 0.0 });
            let (w, b) = self.descend(&xs, &target);
            coefficients.row_mut(k).assign(&w);
            intercepts[k] = b;
        }

        self.coefficients = Some(coefficients);
        self.intercepts = Some(intercepts);
        Ok(self)
    }

    fn descend(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }
            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }
        (weights, bias)
    }

    /// Decision scores, one column per fitted binary model
    fn scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercepts) = match (&self.coefficients, &self.intercepts) {
            (Some(c), Some(i)) => (c, i),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        if x.ncols() != self.feature_means.len() {
            return Err(PipelineError::SchemaError(format!(
                "expected {} features, got {}",
                self.feature_means.len(),
                x.ncols()
            )));
        }
        Ok(self.standardize(x).dot(&coefficients.t()) + intercepts)
    }

    /// Probability of the higher class code (binary models only)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.scores(x)?;
        if scores.ncols() != 1 {
            return Err(PipelineError::TrainingError(
                "predict_proba is defined for binary models".to_string(),
            ));
        }
        Ok(Self::sigmoid(&scores.column(0).to_owned()))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.scores(x)?;
        match self.classes.len() {
            0 => Err(PipelineError::ModelNotFitted),
            1 => Ok(Array1::from_elem(x.nrows(), self.classes[0])),
            2 => Ok(scores
                .column(0)
                .mapv(|s| if s >= 0.0 { self.classes[1] } else { self.classes[0] })),
            _ => Ok(scores
                .rows()
                .into_iter()
                .map(|row| {
                    let mut best = 0;
                    for (k, &s) in row.iter().enumerate() {
                        if s > row[best] {
                            best = k;
                        }
                    }
                    self.classes[best]
                })
                .collect()),
        }
    }
}

/// Registry entry for `logistic_regression`
#[derive(Debug, Clone, Default)]
pub struct LogisticRegressionTrainer;

impl TrainableClassifier for LogisticRegressionTrainer {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["alpha", "learning_rate", "max_iter", "tol"]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let defaults = LogisticRegression::new();
        let mut model = LogisticRegression::new()
            .with_alpha(params.f64_or("alpha", defaults.alpha)?)
            .with_learning_rate(params.f64_or("learning_rate", defaults.learning_rate)?)
            .with_max_iter(params.usize_or("max_iter", defaults.max_iter)?)
            .with_tol(params.f64_or("tol", defaults.tol)?);
        model.fit(x, y)?;
        Ok(FittedModel::LogisticRegression(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression_binary() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 * 100.0 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(40, |i| if i >= 20 { 1.0 } else { 0.0 });

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        let acc = super::super::metrics::accuracy(&y, &preds);
        assert!(acc >= 0.95, "accuracy {}", acc);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[0] < 0.5 && proba[39] > 0.5);
    }

    #[test]
    fn test_multiclass_one_vs_rest() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| (i / 10) as f64 * 5.0);
        let y = Array1::from_shape_fn(30, |i| (i / 10) as f64);
        let mut model = LogisticRegression::new().with_max_iter(2000).with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&array![[0.0], [10.0]]).unwrap();
        assert_eq!(preds[0], 0.0);
        assert_eq!(preds[1], 2.0);
    }

    #[test]
    fn test_constant_column_does_not_produce_nan() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.predict_proba(&x).unwrap().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_feature_count_checked() {
        let mut model = LogisticRegression::new();
        model.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap();
        assert!(model.predict(&array![[0.0, 1.0]]).is_err());
        assert!(LogisticRegression::new().predict(&array![[0.0]]).is_err());
    }
}
