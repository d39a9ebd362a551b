//! Hyperparameter grid loaded from a JSON mapping of name to candidate list

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::training::{HyperParams, ParamValue};

/// Candidate values per hyperparameter, keys in sorted order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterGrid(BTreeMap<String, Vec<ParamValue>>);

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let grid: Self = serde_json::from_str(json)?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PipelineError::IoError(std::io::Error::new(
                e.kind(),
                format!("cannot read grid file {}: {}", path.display(), e),
            ))
        })?;
        Self::from_json(&text)
    }

    pub fn with_values(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.into(), values);
        self
    }

    /// Every key needs at least one candidate.
    pub fn validate(&self) -> Result<()> {
        match self.0.iter().find(|(_, values)| values.is_empty()) {
            Some((name, _)) => Err(PipelineError::InvalidParameter {
                name: name.clone(),
                value: "[]".to_string(),
                reason: "grid entry has no candidate values".to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of combinations; an empty grid has one (all defaults).
    pub fn n_combinations(&self) -> usize {
        self.0.values().map(Vec::len).product()
    }

    /// Cartesian product with the last key varying fastest.
    pub fn combinations(&self) -> Result<Vec<HyperParams>> {
        self.validate()?;
        let entries: Vec<(&String, &Vec<ParamValue>)> = self.0.iter().collect();
        let total = self.n_combinations();

        let mut combos = Vec::with_capacity(total);
        let mut counters = vec![0usize; entries.len()];
        for _ in 0..total {
            combos.push(
                entries
                    .iter()
                    .zip(&counters)
                    .map(|((name, values), &i)| ((*name).clone(), values[i].clone()))
                    .collect(),
            );
            // odometer increment from the right
            for pos in (0..entries.len()).rev() {
                counters[pos] += 1;
                if counters[pos] < entries[pos].1.len() {
                    break;
                }
                counters[pos] = 0;
            }
        }
        Ok(combos)
    }

    /// Whether `params` is one of the grid's combinations.
    pub fn contains(&self, params: &HyperParams) -> bool {
        params.len() == self.0.len()
            && params
                .iter()
                .all(|(k, v)| self.0.get(k).is_some_and(|values| values.contains(v)))
    }

    /// Search space as strings, for experiment tracking.
    pub fn to_prefixed_strings(&self, prefix: &str) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, values)| {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                (format!("{}{}", prefix, k), format!("[{}]", rendered.join(", ")))
            })
            .collect()
    }
}
