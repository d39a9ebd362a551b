//! Gaussian Naive Bayes classifier

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::models::{FittedModel, HyperParams, TrainableClassifier};
use crate::error::{PipelineError, Result};

/// Gaussian Naive Bayes with per-class feature means and variances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Sorted class codes
    classes: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
    log_priors: Vec<f64>,
    /// Fraction of the largest feature variance added to every variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            means: Vec::new(),
            variances: Vec::new(),
            log_priors: Vec::new(),
            var_smoothing: 1e-9,
        }
    }

    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples == 0 {
            return Err(PipelineError::TrainingError("no training rows".to_string()));
        }
        if self.var_smoothing < 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "var_smoothing".to_string(),
                value: self.var_smoothing.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();

        // Epsilon scales with the widest feature, as in scikit-learn
        let max_var = (0..n_features)
            .map(|j| {
                let col = x.column(j);
                let mean = col.mean().unwrap_or(0.0);
                col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_samples as f64
            })
            .fold(0.0, f64::max);
        let epsilon = (self.var_smoothing * max_var).max(1e-12);

        self.means.clear();
        self.variances.clear();
        self.log_priors.clear();
        for &class in &classes {
            // Single-pass Welford's algorithm for mean and variance
            let mut means = vec![0.0; n_features];
            let mut m2 = vec![0.0; n_features];
            let mut count = 0usize;
            for (row, _) in x.rows().into_iter().zip(y.iter()).filter(|(_, &yi)| yi == class) {
                count += 1;
                for (j, &val) in row.iter().enumerate() {
                    let delta = val - means[j];
                    means[j] += delta / count as f64;
                    m2[j] += delta * (val - means[j]);
                }
            }
            self.variances.push(m2.iter().map(|s| s / count as f64 + epsilon).collect());
            self.means.push(means);
            self.log_priors.push((count as f64 / n_samples as f64).ln());
        }
        self.classes = classes;
        Ok(())
    }

    /// Unnormalized joint log likelihood per class
    fn joint_log_likelihood(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.means[0].len() {
            return Err(PipelineError::SchemaError(format!(
                "expected {} features, got {}",
                self.means[0].len(),
                x.ncols()
            )));
        }
        let n_classes = self.classes.len();
        Ok(Array2::from_shape_fn((x.nrows(), n_classes), |(i, c)| {
            let row = x.row(i);
            let mut ll = self.log_priors[c];
            for (j, &v) in row.iter().enumerate() {
                let var = self.variances[c][j];
                let diff = v - self.means[c][j];
                ll -= 0.5 * ((2.0 * std::f64::consts::PI * var).ln() + diff * diff / var);
            }
            ll
        }))
    }

    /// Posterior probabilities, normalized with log-sum-exp
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut jll = self.joint_log_likelihood(x)?;
        for mut row in jll.rows_mut() {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = max + row.iter().map(|v| (v - max).exp()).sum::<f64>().ln();
            row.mapv_inplace(|v| (v - log_sum).exp());
        }
        Ok(jll)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let jll = self.joint_log_likelihood(x)?;
        Ok(jll
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (c, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = c;
                    }
                }
                self.classes[best]
            })
            .collect())
    }
}

/// Registry entry for `naive_bayes`
#[derive(Debug, Clone, Default)]
pub struct NaiveBayesTrainer;

impl TrainableClassifier for NaiveBayesTrainer {
    fn name(&self) -> &'static str {
        "naive_bayes"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["var_smoothing"]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let mut model = GaussianNaiveBayes::new().with_var_smoothing(params.f64_or("var_smoothing", 1e-9)?);
        model.fit(x, y)?;
        Ok(FittedModel::NaiveBayes(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gaussian_nb() {
        let x = array![[1.0, 2.0], [1.2, 1.8], [0.9, 2.1], [6.0, 7.0], [6.2, 7.1], [5.8, 6.9]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        assert_eq!(nb.predict(&x).unwrap(), y);
        let proba = nb.predict_proba(&array![[1.0, 2.0]]).unwrap();
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-9);
        assert!(proba[[0, 0]] > 0.99);
    }

    #[test]
    fn test_constant_feature_is_smoothed() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 10.0], [1.0, 11.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        assert!(nb.predict_proba(&x).unwrap().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_unfitted() {
        assert!(GaussianNaiveBayes::new().predict(&array![[0.0]]).is_err());
    }
}
