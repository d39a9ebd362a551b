//! Trainable classifier capability, hyperparameters and fitted models

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::adaboost::AdaBoostClassifier;
use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingClassifier;
use super::knn::KNNClassifier;
use super::linear_models::LogisticRegression;
use super::naive_bayes::GaussianNaiveBayes;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;

/// A single hyperparameter value as it appears in a grid file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(i) => usize::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// One hyperparameter combination, keyed by name in sorted order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperParams(BTreeMap<String, ParamValue>);

impl HyperParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `other` override entries of `self`.
    pub fn merged(&self, other: &HyperParams) -> HyperParams {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Render values as strings with a key prefix, for experiment tracking.
    pub fn to_prefixed_strings(&self, prefix: &str) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (format!("{}{}", prefix, k), v.to_string()))
            .collect()
    }

    fn invalid(name: &str, value: &ParamValue, reason: &str) -> PipelineError {
        PipelineError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_usize()
                .ok_or_else(|| Self::invalid(name, v, "expected a non-negative integer")),
        }
    }

    /// Like [`usize_or`](Self::usize_or) but `null` means "no limit".
    pub fn opt_usize_or(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Null) => Ok(None),
            Some(v) => v
                .as_usize()
                .map(Some)
                .ok_or_else(|| Self::invalid(name, v, "expected a non-negative integer or null")),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| Self::invalid(name, v, "expected a number")),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_str().ok_or_else(|| Self::invalid(name, v, "expected a string")),
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl FromIterator<(String, ParamValue)> for HyperParams {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        HyperParams(iter.into_iter().collect())
    }
}

/// A classifier family that can be fitted by name from a registry
pub trait TrainableClassifier: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Hyperparameters this family understands
    fn param_names(&self) -> &'static [&'static str];

    /// Fit with already-validated parameters
    fn fit_with(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel>;

    /// Reject parameters this family does not understand.
    fn check_params(&self, params: &HyperParams) -> Result<()> {
        let allowed = self.param_names();
        for (name, value) in params.iter() {
            if !allowed.contains(&name.as_str()) {
                return Err(PipelineError::InvalidParameter {
                    name: name.clone(),
                    value: value.to_string(),
                    reason: format!("not a {} hyperparameter (expected one of {})", self.name(), allowed.join(", ")),
                });
            }
        }
        Ok(())
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, params: &HyperParams) -> Result<FittedModel> {
        self.check_params(params)?;
        if x.nrows() != y.len() {
            return Err(PipelineError::DataError(format!(
                "x has {} rows but y has {} values",
                x.nrows(),
                y.len()
            )));
        }
        self.fit_with(x, y, params)
    }
}

/// Fitted parameters of any registered classifier family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "snake_case")]
pub enum FittedModel {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    KNearestNeighbors(KNNClassifier),
    NaiveBayes(GaussianNaiveBayes),
    AdaBoost(AdaBoostClassifier),
    SupportVectorClassifier(SVMClassifier),
}

impl FittedModel {
    pub fn family(&self) -> &'static str {
        match self {
            FittedModel::LogisticRegression(_) => "logistic_regression",
            FittedModel::DecisionTree(_) => "decision_tree",
            FittedModel::RandomForest(_) => "random_forest",
            FittedModel::GradientBoosting(_) => "gradient_boosting",
            FittedModel::KNearestNeighbors(_) => "k_nearest_neighbors",
            FittedModel::NaiveBayes(_) => "naive_bayes",
            FittedModel::AdaBoost(_) => "adaboost",
            FittedModel::SupportVectorClassifier(_) => "support_vector_classifier",
        }
    }

    /// Predicted class code per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::LogisticRegression(m) => m.predict(x),
            FittedModel::DecisionTree(m) => m.predict(x),
            FittedModel::RandomForest(m) => m.predict(x),
            FittedModel::GradientBoosting(m) => m.predict(x),
            FittedModel::KNearestNeighbors(m) => m.predict(x),
            FittedModel::NaiveBayes(m) => m.predict(x),
            FittedModel::AdaBoost(m) => m.predict(x),
            FittedModel::SupportVectorClassifier(m) => m.predict(x),
        }
    }

    /// Predicted class code for a single row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let x = row.to_owned().insert_axis(ndarray::Axis(0));
        let pred = self.predict(&x)?;
        pred.first().copied().ok_or(PipelineError::ModelNotFitted)
    }
}
