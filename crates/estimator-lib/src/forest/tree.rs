//! CART regression tree builder
//!
//! Exact-greedy construction minimizing squared error. Candidate thresholds
//! are midpoints between consecutive distinct feature values; ties between
//! equally good splits go to the lowest feature index, then the lowest
//! threshold, so a given sample always yields the same tree.

use super::ForestError;
use rand::{rngs::StdRng, seq::index};
use serde::{Deserialize, Serialize};

/// Training parameters for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all of them
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Tree node; children always sit after their parent in the node list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Fitted regression tree stored as a flat node list rooted at index 0
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Walk from the root to a leaf. Values `<= threshold` go left.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if x <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    /// Structural checks for a tree read from disk
    pub fn validate(&self, n_features: usize) -> Result<(), ForestError> {
        if self.nodes.is_empty() {
            return Err(ForestError::InvalidTree("tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(ForestError::InvalidTree(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ForestError::InvalidTree(format!(
                            "node {} has a non-finite threshold",
                            idx
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(ForestError::InvalidTree(format!(
                                "node {} points at invalid child {}",
                                idx, child
                            )));
                        }
                    }
                }
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(ForestError::InvalidTree(format!(
                        "leaf {} has a non-finite value",
                        idx
                    )));
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// Builds one tree over a (possibly bootstrapped) sample of rows
pub(crate) struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    config: &'a TreeConfig,
    n_features: usize,
    rng: StdRng,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(
        features: &'a [Vec<f64>],
        targets: &'a [f64],
        n_features: usize,
        config: &'a TreeConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            features,
            targets,
            config,
            n_features,
            rng,
        }
    }

    pub(crate) fn build(mut self, sample: &[usize]) -> RegressionTree {
        let mut nodes = Vec::new();
        self.build_node(sample, 0, &mut nodes);
        RegressionTree { nodes }
    }

    fn build_node(&mut self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current_idx = nodes.len();
        let leaf_value = self.mean_target(indices);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split.max(2)
            || self.is_pure(indices)
        {
            nodes.push(Node::Leaf { value: leaf_value });
            return current_idx;
        }

        let split = match self.find_best_split(indices) {
            Some(s) => s,
            None => {
                nodes.push(Node::Leaf { value: leaf_value });
                return current_idx;
            }
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][split.feature] <= split.threshold);

        // Reserve the slot, children are patched in after recursion
        nodes.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left_idx = self.build_node(&left_indices, depth + 1, nodes);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes);

        if let Node::Split { left, right, .. } = &mut nodes[current_idx] {
            *left = left_idx;
            *right = right_idx;
        }

        current_idx
    }

    /// Maximizes `S_l²/n_l + S_r²/n_r`, which minimizes the summed squared
    /// error of the two children.
    fn find_best_split(&mut self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let parent_score = total * total / n as f64;
        let min_gain = 1e-12 * parent_score.abs().max(1.0);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in self.candidate_features() {
            pairs.clear();
            pairs.extend(
                indices
                    .iter()
                    .map(|&i| (self.features[i][feature], self.targets[i])),
            );
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for i in 0..n - 1 {
                left_sum += pairs[i].1;
                let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
                if lo == hi {
                    continue;
                }
                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
                if score - parent_score <= min_gain {
                    continue;
                }
                if best.map_or(true, |b| score > b.score) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(lo, hi),
                        score,
                    });
                }
            }
        }

        best
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        match self.config.max_features {
            Some(k) if k < self.n_features => {
                let mut chosen = index::sample(&mut self.rng, self.n_features, k.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn mean_target(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| self.targets[i]).sum::<f64>() / indices.len() as f64
    }

    fn is_pure(&self, indices: &[usize]) -> bool {
        let first = self.targets[indices[0]];
        indices.iter().all(|&i| self.targets[i] == first)
    }
}

/// Threshold strictly below `hi` and not below `lo`
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}
