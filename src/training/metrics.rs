//! Classification metrics with support-weighted averaging

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of true label (rows) against predicted label (columns)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of true and predicted class codes
    pub labels: Vec<i64>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &[i64], y_pred: &[i64]) -> Self {
        let mut labels: Vec<i64> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let k = labels.len();
        let mut matrix = vec![vec![0usize; k]; k];
        for (t, p) in y_true.iter().zip(y_pred) {
            // both present by construction
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                matrix[i][j] += 1;
            }
        }
        Self { labels, matrix }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    fn support(&self, i: usize) -> usize {
        self.matrix[i].iter().sum()
    }

    fn predicted(&self, j: usize) -> usize {
        self.matrix.iter().map(|row| row[j]).sum()
    }

    /// Render with optional names per label.
    pub fn render(&self, names: Option<&dyn Fn(i64) -> String>) -> String {
        let name = |l: i64| names.map(|f| f(l)).unwrap_or_else(|| l.to_string());
        let headers: Vec<String> = self.labels.iter().map(|&l| name(l)).collect();
        let width = headers
            .iter()
            .map(|h| h.len())
            .chain(self.matrix.iter().flatten().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);

        let mut out = format!("{:>w$}", "true\\pred", w = width + 2);
        for h in &headers {
            out.push_str(&format!(" {:>w$}", h, w = width));
        }
        out.push('\n');
        for (h, row) in headers.iter().zip(&self.matrix) {
            out.push_str(&format!("{:>w$}", h, w = width + 2));
            for c in row {
                out.push_str(&format!(" {:>w$}", c, w = width));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(None))
    }
}

/// Held-out evaluation of a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F1
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Evaluate predictions against true labels. Labels are class codes stored as `f64`.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::DataError(format!(
                "label length mismatch: {} true vs {} predicted",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(PipelineError::DataError("cannot score an empty split".to_string()));
        }

        let t: Vec<i64> = y_true.iter().map(|v| v.round() as i64).collect();
        let p: Vec<i64> = y_pred.iter().map(|v| v.round() as i64).collect();
        let cm = ConfusionMatrix::compute(&t, &p);

        let n = t.len() as f64;
        let correct: usize = (0..cm.labels.len()).map(|i| cm.matrix[i][i]).sum();

        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        for i in 0..cm.labels.len() {
            let support = cm.support(i);
            if support == 0 {
                continue;
            }
            let tp = cm.matrix[i][i] as f64;
            let predicted = cm.predicted(i);
            let p_i = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
            let r_i = tp / support as f64;
            let f_i = if p_i + r_i > 0.0 { 2.0 * p_i * r_i / (p_i + r_i) } else { 0.0 };

            let w = support as f64 / n;
            precision += w * p_i;
            recall += w * r_i;
            f1 += w * f_i;
        }

        Ok(Self {
            accuracy: correct as f64 / n,
            precision,
            recall,
            f1,
            confusion_matrix: cm,
            n_samples: t.len(),
        })
    }
}

/// Fraction of exact matches.
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}
