//! Random forest regressor
//!
//! Bagged ensemble of CART trees fitted on bootstrap samples. Each tree draws
//! from its own generator seeded with `seed + tree_index`, and trees are
//! fitted in parallel but collected in index order, so the fitted forest does
//! not depend on scheduling.

mod tree;

pub use tree::{Node, RegressionTree, TreeConfig};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tree::TreeBuilder;

/// Model kind recorded in bundle manifests
pub const RANDOM_FOREST_KIND: &str = "random_forest";

/// Trait for regressors that can serve log-space price predictions
pub trait Regressor: Send + Sync {
    /// Predict one encoded row (schema order) in log-price space
    fn predict(&self, features: &[f64]) -> f64;

    /// Number of input features expected
    fn n_features(&self) -> usize;

    /// Short identifier of the model family
    fn kind(&self) -> &str;
}

/// Errors raised while fitting or validating a forest
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForestError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedFeatures {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid forest configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid tree: {0}")]
    InvalidTree(String),
}

/// Forest hyperparameters
#[derive(Clone, Debug, PartialEq)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub tree: TreeConfig,
    /// Fit each tree on a bootstrap resample of the training rows
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            tree: TreeConfig::default(),
            bootstrap: true,
        }
    }
}

/// Fitted random forest; prediction is the mean of all trees
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        config: &ForestConfig,
        seed: u64,
    ) -> Result<Self, ForestError> {
        if config.n_trees == 0 {
            return Err(ForestError::InvalidConfig("n_trees must be at least 1".to_string()));
        }
        if config.tree.max_features == Some(0) {
            return Err(ForestError::InvalidConfig("max_features must be at least 1".to_string()));
        }
        if features.len() != targets.len() {
            return Err(ForestError::LengthMismatch {
                features: features.len(),
                targets: targets.len(),
            });
        }
        if targets.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }
        let n_features = features[0].len();
        if let Some((row, f)) = features.iter().enumerate().find(|(_, f)| f.len() != n_features) {
            return Err(ForestError::RaggedFeatures {
                row,
                expected: n_features,
                found: f.len(),
            });
        }

        let n_rows = targets.len();
        let trees: Vec<RegressionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> = if config.bootstrap {
                    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                let tree = TreeBuilder::new(features, targets, n_features, &config.tree, rng).build(&sample);
                debug!(
                    tree = tree_idx,
                    nodes = tree.nodes().len(),
                    depth = tree.depth(),
                    "Tree fitted"
                );
                tree
            })
            .collect();

        Ok(Self { n_features, trees })
    }

    pub fn from_trees(n_features: usize, trees: Vec<RegressionTree>) -> Result<Self, ForestError> {
        let forest = Self { n_features, trees };
        forest.validate()?;
        Ok(forest)
    }

    /// Check a forest read from disk before it serves traffic
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::InvalidConfig("forest has no trees".to_string()));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).map_err(|e| match e {
                ForestError::InvalidTree(reason) => {
                    ForestError::InvalidTree(format!("tree {}: {}", idx, reason))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn predict(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        sum / self.trees.len() as f64
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn kind(&self) -> &str {
        RANDOM_FOREST_KIND
    }
}
