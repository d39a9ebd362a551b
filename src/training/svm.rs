//! Support vector classifier trained with simplified SMO
//!
//! Features are standardized before training. Two classes fit one machine for
//! the higher class code; more classes fit one-vs-rest. The kernel matrix is
//! held in memory, so training sets above `max_samples` rows are reduced to a
//! seeded subsample first.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand::seq::index::sample;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::models::{FittedModel, HyperParams, ParamValue, TrainableClassifier};
use crate::error::{PipelineError, Result};

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: f64 },
}

impl KernelType {
    fn apply(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * sq).exp()
            }
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// `None` means RBF with `gamma = 1 / n_features` on the standardized inputs
    pub kernel: Option<KernelType>,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum passes over the training rows
    pub max_iter: usize,
    /// Training rows kept for the kernel matrix
    pub max_samples: usize,
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: None,
            tol: 1e-3,
            max_iter: 200,
            max_samples: 2000,
            random_state: 42,
        }
    }
}

/// One binary machine; `coef` holds `alpha * y` per support vector
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySVM {
    support_vectors: Array2<f64>,
    coef: Array1<f64>,
    bias: f64,
}

impl BinarySVM {
    fn decision(&self, kernel: &KernelType, sample: ArrayView1<f64>) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.coef.iter())
            .map(|(sv, c)| c * kernel.apply(sv, sample))
            .sum::<f64>()
            + self.bias
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    kernel: KernelType,
    classes: Vec<f64>,
    machines: Vec<BinarySVM>,
    feature_means: Array1<f64>,
    feature_stds: Array1<f64>,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            kernel: config.kernel.unwrap_or(KernelType::Linear),
            config,
            classes: Vec::new(),
            machines: Vec::new(),
            feature_means: Array1::zeros(0),
            feature_stds: Array1::zeros(0),
        }
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn kernel(&self) -> KernelType {
        self.kernel
    }

    /// Support vectors per fitted machine
    pub fn n_support(&self) -> Vec<usize> {
        self.machines.iter().map(|m| m.coef.len()).collect()
    }

    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.feature_means) / &self.feature_stds
    }

    fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: f64, reason: &str| PipelineError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if !(self.config.c > 0.0) {
            return Err(invalid("C", self.config.c, "must be positive"));
        }
        if !(self.config.tol > 0.0) {
            return Err(invalid("tol", self.config.tol, "must be positive"));
        }
        if self.config.max_samples < 2 {
            return Err(invalid("max_samples", self.config.max_samples as f64, "must be at least 2"));
        }
        if let Some(KernelType::Rbf { gamma }) = self.config.kernel {
            if !(gamma > 0.0) {
                return Err(invalid("gamma", gamma, "must be positive"));
            }
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::DataError(format!(
                "x has {} rows but y has {} values",
                x.nrows(),
                y.len()
            )));
        }
        self.validate()?;

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        if classes.len() < 2 {
            return Err(PipelineError::TrainingError(
                "support vector classifier needs at least 2 distinct classes".to_string(),
            ));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let (x, y) = if x.nrows() > self.config.max_samples {
            warn!(
                rows = x.nrows(),
                max_samples = self.config.max_samples,
                "training support vector classifier on a subsample"
            );
            let mut keep = sample(&mut rng, x.nrows(), self.config.max_samples).into_vec();
            keep.sort_unstable();
            (x.select(Axis(0), &keep), y.select(Axis(0), &keep))
        } else {
            (x.to_owned(), y.to_owned())
        };

        self.feature_means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        // Constant columns keep a unit scale
        self.feature_stds = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        self.kernel = self.config.kernel.unwrap_or(KernelType::Rbf {
            gamma: 1.0 / x.ncols().max(1) as f64,
        });
        let xs = self.standardize(&x);
        let kernel_matrix = self.kernel_matrix(&xs);

        let positives: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };
        self.machines = positives
            .iter()
            .map(|&positive| {
                let target = y.mapv(|v| if v == positive { 1.0 } else { -1.0 });
                self.smo_train(&xs, &target, &kernel_matrix, &mut rng)
            })
            .collect();
        self.classes = classes;
        Ok(())
    }

    fn kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let val = self.kernel.apply(x.row(i), x.row(j));
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Simplified SMO. `g[i]` caches the decision value of row `i` without the bias.
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>, k: &Array2<f64>, rng: &mut Xoshiro256PlusPlus) -> BinarySVM {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut g: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;
        while passes < max_passes && total_iter < self.config.max_iter && n > 1 {
            let mut num_changed = 0;
            for i in 0..n {
                let e_i = g[i] + bias - y[i];
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }
                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = g[j] + bias - y[j];
                let (alpha_i_old, alpha_j_old) = (alphas[i], alphas[j]);

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }
                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alpha_j - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                let alpha_i = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j);
                let (d_i, d_j) = (y[i] * (alpha_i - alpha_i_old), y[j] * (alpha_j - alpha_j_old));
                alphas[i] = alpha_i;
                alphas[j] = alpha_j;

                let b1 = bias - e_i - d_i * k[[i, i]] - d_j * k[[i, j]];
                let b2 = bias - e_j - d_i * k[[i, j]] - d_j * k[[j, j]];
                bias = if alpha_i > 0.0 && alpha_i < c {
                    b1
                } else if alpha_j > 0.0 && alpha_j < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                for t in 0..n {
                    g[t] += d_i * k[[i, t]] + d_j * k[[j, t]];
                }
                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        BinarySVM {
            support_vectors: x.select(Axis(0), &support),
            coef: support.iter().map(|&i| alphas[i] * y[i]).collect(),
            bias,
        }
    }

    /// Decision value per row and fitted machine
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.machines.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.feature_means.len() {
            return Err(PipelineError::SchemaError(format!(
                "expected {} features, got {}",
                self.feature_means.len(),
                x.ncols()
            )));
        }
        let xs = self.standardize(x);
        Ok(Array2::from_shape_fn((xs.nrows(), self.machines.len()), |(i, m)| {
            self.machines[m].decision(&self.kernel, xs.row(i))
        }))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        if self.classes.len() == 2 {
            return Ok(scores
                .column(0)
                .mapv(|s| if s >= 0.0 { self.classes[1] } else { self.classes[0] }));
        }
        Ok(scores
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
            .collect())
    }
}

/// Registry entry for `support_vector_classifier`
#[derive(Debug, Clone)]
pub struct SVMTrainer {
    pub random_state: u64,
}

impl SVMTrainer {
    fn kernel(params: &HyperParams) -> Result<Option<KernelType>> {
        let gamma = match params.get("gamma") {
            None => None,
            Some(ParamValue::Str(s)) if s == "scale" => None,
            Some(_) => Some(params.f64_or("gamma", 0.0)?),
        };
        match params.str_or("kernel", "rbf")? {
            "linear" => Ok(Some(KernelType::Linear)),
            "rbf" => Ok(gamma.map(|gamma| KernelType::Rbf { gamma })),
            other => Err(PipelineError::InvalidParameter {
                name: "kernel".to_string(),
                value: other.to_string(),
                reason: "expected \"rbf\" or \"linear\"".to_string(),
            }),
        }
    }
}

impl TrainableClassifier for SVMTrainer {
    fn name(&self) -> &'static str {
        "support_vector_classifier"
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["C", "kernel", "gamma", "tol", "max_iter", "max_samples"]
    }

    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        let defaults = SVMConfig::default();
        let config = SVMConfig {
            c: params.f64_or("C", defaults.c)?,
            kernel: Self::kernel(params)?,
            tol: params.f64_or("tol", defaults.tol)?,
            max_iter: params.usize_or("max_iter", defaults.max_iter)?,
            max_samples: params.usize_or("max_samples", defaults.max_samples)?,
            random_state: self.random_state,
        };
        let mut model = SVMClassifier::new(config);
        model.fit(x, y)?;
        Ok(FittedModel::SupportVectorClassifier(model))
    }
}
