//! Model training module
//!
//! Classifier families behind one [`TrainableClassifier`] capability:
//! - Logistic regression
//! - Decision tree and random forest
//! - Gradient boosting
//! - K-Nearest Neighbors
//! - Gaussian Naive Bayes
//! - AdaBoost over decision stumps
//! - Support vector classifier (RBF or linear kernel)
//!
//! plus seeded splitting, cross-validation, metrics and [`ModelComparator`].

pub mod adaboost;
pub mod comparison;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod metrics;
pub mod models;
pub mod naive_bayes;
pub mod random_forest;
pub mod registry;
pub mod svm;

pub use adaboost::AdaBoostClassifier;
pub use comparison::ModelComparator;
pub use cross_validation::{sample_indices, train_test_split, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::LogisticRegression;
pub use metrics::{accuracy, ClassificationMetrics, ConfusionMatrix};
pub use models::{FittedModel, HyperParams, ParamValue, TrainableClassifier};
pub use naive_bayes::GaussianNaiveBayes;
pub use random_forest::{MaxFeatures, RandomForest};
pub use registry::ClassifierRegistry;
pub use svm::{KernelType, SVMClassifier, SVMConfig};
