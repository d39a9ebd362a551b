//! Name-keyed table of classifier families, built once at startup

use std::sync::Arc;

use super::adaboost::AdaBoostTrainer;
use super::decision_tree::DecisionTreeTrainer;
use super::gradient_boosting::GradientBoostingTrainer;
use super::knn::KNNTrainer;
use super::linear_models::LogisticRegressionTrainer;
use super::models::TrainableClassifier;
use super::naive_bayes::NaiveBayesTrainer;
use super::random_forest::RandomForestTrainer;
use super::svm::SVMTrainer;
use crate::error::{PipelineError, Result};

/// Registered classifier families in registration order
#[derive(Clone)]
pub struct ClassifierRegistry {
    entries: Vec<Arc<dyn TrainableClassifier>>,
}

impl ClassifierRegistry {
    pub const DEFAULT_ORDER: [&'static str; 8] = [
        "logistic_regression",
        "decision_tree",
        "random_forest",
        "gradient_boosting",
        "k_nearest_neighbors",
        "naive_bayes",
        "adaboost",
        "support_vector_classifier",
    ];

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Every built-in family; seeded learners use `random_state`.
    pub fn with_defaults(random_state: u64) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(LogisticRegressionTrainer));
        registry.register(Arc::new(DecisionTreeTrainer { random_state }));
        registry.register(Arc::new(RandomForestTrainer { random_state }));
        registry.register(Arc::new(GradientBoostingTrainer { random_state }));
        registry.register(Arc::new(KNNTrainer));
        registry.register(Arc::new(NaiveBayesTrainer));
        registry.register(Arc::new(AdaBoostTrainer));
        registry.register(Arc::new(SVMTrainer { random_state }));
        registry
    }

    /// Add a family, replacing any entry with the same name in place.
    pub fn register(&mut self, classifier: Arc<dyn TrainableClassifier>) {
        match self.entries.iter().position(|c| c.name() == classifier.name()) {
            Some(i) => self.entries[i] = classifier,
            None => self.entries.push(classifier),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TrainableClassifier>> {
        self.entries
            .iter()
            .find(|c| c.name() == name)
            .cloned()
            .ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "unknown classifier '{}' (registered: {})",
                    name,
                    self.names().join(", ")
                ))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|c| c.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierRegistry").field("names", &self.names()).finish()
    }
}
