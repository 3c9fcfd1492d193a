//! Bagged ensemble of regression trees.
//!
//! Each tree is grown on a bootstrap resample of the training rows and the
//! forest predicts the mean of its trees. All randomness flows from
//! [`ForestParams::seed`], so the same data and parameters always produce the
//! same forest.

mod tree;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use tree::RegressionTree;
use tree::TreeParams;

#[derive(Debug, Error, PartialEq)]
pub enum ForestError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("{rows} feature rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row} contains a non-finite value")]
    NonFiniteValue { row: usize },

    #[error("invalid forest parameters: {0}")]
    InvalidParams(String),

    #[error("model was trained on {expected} features, got {found}")]
    FeatureCountMismatch { expected: usize, found: usize },

    #[error("malformed forest: {0}")]
    Malformed(String),
}

/// Hyper-parameters, stored with the model for provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all of them when `None`.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    fn validate(&self, n_features: usize) -> Result<(), ForestError> {
        if self.n_trees == 0 {
            return Err(ForestError::InvalidParams("n_trees must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(ForestError::InvalidParams(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForestError::InvalidParams(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if let Some(k) = self.max_features {
            if k == 0 || k > n_features {
                return Err(ForestError::InvalidParams(format!(
                    "max_features must be within 1..={n_features}, got {k}"
                )));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
        }
    }
}

/// A fitted, immutable forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fits a forest on rows `x` and targets `y`.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self, ForestError> {
        if x.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ForestError::LengthMismatch {
                rows: x.len(),
                targets: y.len(),
            });
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(ForestError::InvalidParams("rows have no features".into()));
        }
        for (row, values) in x.iter().enumerate() {
            if values.len() != n_features {
                return Err(ForestError::RaggedRow {
                    row,
                    expected: n_features,
                    found: values.len(),
                });
            }
            if !values.iter().all(|v| v.is_finite()) || !y[row].is_finite() {
                return Err(ForestError::NonFiniteValue { row });
            }
        }
        params.validate(n_features)?;

        let n = x.len();
        let tree_params = params.tree_params();
        let mut master = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let mut rng = StdRng::seed_from_u64(master.random::<u64>());
            let samples: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| rng.random_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            trees.push(RegressionTree::fit(
                x,
                y,
                samples,
                n_features,
                &tree_params,
                &mut rng,
            ));
        }

        debug!(
            trees = trees.len(),
            rows = n,
            features = n_features,
            mean_depth = trees.iter().map(RegressionTree::depth).sum::<usize>() as f64
                / trees.len() as f64,
            "forest fitted"
        );

        Ok(Self { trees, n_features })
    }

    /// Mean of the tree predictions for one row.
    pub fn predict(&self, row: &[f64]) -> Result<f64, ForestError> {
        if row.len() != self.n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.n_features,
                found: row.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Structural check for a forest read back from disk.
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.n_features == 0 {
            return Err(ForestError::Malformed("zero input columns".into()));
        }
        if self.trees.is_empty() {
            return Err(ForestError::Malformed("no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|reason| ForestError::Malformed(format!("tree {i}: {reason}")))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_trees(trees: Vec<RegressionTree>, n_features: usize) -> Self {
        Self { trees, n_features }
    }
}
