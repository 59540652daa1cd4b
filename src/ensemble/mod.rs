//! Ensemble Module - Gradient boosted decision trees
//!
//! The trained ensemble is an external artifact. This module holds its
//! in-memory form, checks its structure once at load time, and evaluates
//! raw margins. The attribution engine walks the same structure.

pub mod loader;
pub mod xgboost;

use serde::{Deserialize, Serialize};

pub use loader::{load_model, LoadedModel};

/// Deepest tree accepted at load time
pub const MAX_TREE_DEPTH: usize = 64;

// ============================================================================
// ERRORS
// ============================================================================

/// Model loading errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported objective '{0}', expected binary:logistic")]
    UnsupportedObjective(String),
    #[error("Invalid model structure: {0}")]
    InvalidStructure(String),
    #[error("Feature layout mismatch: {0}")]
    LayoutMismatch(String),
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidStructure(msg.into())
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// A tree node. Rows with `x < threshold` go left, see [`goes_left`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

/// Split test shared by evaluation and attribution
///
/// XGBoost stores split conditions as `f32` and narrows each feature value
/// to `f32` before comparing, so both sides are narrowed here too.
pub fn goes_left(value: f64, threshold: f64) -> bool {
    (value as f32) < (threshold as f32)
}

impl Node {
    /// Training weight that reached this node
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single decision tree, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Objective {
    #[default]
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
        }
    }
}

/// Additive tree ensemble: margin = base_margin + sum of one leaf per tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_margin: f64,
    #[serde(default)]
    pub objective: Objective,
    pub trees: Vec<Tree>,
}

// ============================================================================
// TREE
// ============================================================================

impl Tree {
    /// Leaf value reached by `x`
    ///
    /// The tree must have passed [`TreeEnsemble::validate`].
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { feature, threshold, left, right, .. } => {
                    idx = if goes_left(x[*feature], *threshold) { *left } else { *right };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value
    pub fn expected_value(&self) -> f64 {
        self.node_mean(0)
    }

    fn node_mean(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf { value, .. } => *value,
            Node::Split { left, right, cover, .. } => {
                let l = &self.nodes[*left];
                let r = &self.nodes[*right];
                (l.cover() * self.node_mean(*left) + r.cover() * self.node_mean(*right)) / cover
            }
        }
    }

    /// Number of splits on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => {
                1 + self.node_depth(*left).max(self.node_depth(*right))
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Every node reachable exactly once from the root, children in bounds,
    /// splits on known features, finite numbers, positive covers.
    fn validate(&self, tree_idx: usize, feature_count: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(invalid(format!("tree {tree_idx} is empty")));
        }

        let mut visited = vec![false; self.nodes.len()];
        // (node, depth)
        let mut stack = vec![(0usize, 0usize)];

        while let Some((idx, depth)) = stack.pop() {
            if idx >= self.nodes.len() {
                return Err(invalid(format!("tree {tree_idx} references missing node {idx}")));
            }
            if visited[idx] {
                return Err(invalid(format!("tree {tree_idx} node {idx} is reached twice")));
            }
            visited[idx] = true;

            let node = &self.nodes[idx];
            let cover = node.cover();
            if !cover.is_finite() || cover <= 0.0 {
                return Err(invalid(format!(
                    "tree {tree_idx} node {idx} has non-positive cover {cover}"
                )));
            }

            match node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(invalid(format!("tree {tree_idx} leaf {idx} is not finite")));
                    }
                }
                Node::Split { feature, threshold, left, right, .. } => {
                    if *feature >= feature_count {
                        return Err(invalid(format!(
                            "tree {tree_idx} node {idx} splits on feature {feature}, model has {feature_count}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(invalid(format!(
                            "tree {tree_idx} node {idx} has a non-finite threshold"
                        )));
                    }
                    if depth + 1 > MAX_TREE_DEPTH {
                        return Err(invalid(format!(
                            "tree {tree_idx} is deeper than {MAX_TREE_DEPTH}"
                        )));
                    }
                    stack.push((*right, depth + 1));
                    stack.push((*left, depth + 1));
                }
            }
        }

        if let Some(orphan) = visited.iter().position(|v| !v) {
            return Err(invalid(format!("tree {tree_idx} node {orphan} is unreachable")));
        }
        Ok(())
    }
}

// ============================================================================
// ENSEMBLE
// ============================================================================

impl TreeEnsemble {
    /// Build and validate an ensemble
    pub fn new(
        feature_names: Vec<String>,
        base_margin: f64,
        trees: Vec<Tree>,
    ) -> Result<Self, ModelError> {
        let ensemble = Self {
            feature_names,
            base_margin,
            objective: Objective::BinaryLogistic,
            trees,
        };
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Validate structural invariants of this ensemble
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.is_empty() {
            return Err(invalid("feature count cannot be zero"));
        }
        if self.trees.is_empty() {
            return Err(invalid("model must contain at least one tree"));
        }
        if !self.base_margin.is_finite() {
            return Err(invalid("base margin is not finite"));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx, self.feature_count())?;
        }
        Ok(())
    }

    /// Raw summed output before the link function
    pub fn margin(&self, x: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    /// Expected margin over the training distribution (attribution baseline)
    pub fn expected_value(&self) -> f64 {
        self.base_margin + self.trees.iter().map(Tree::expected_value).sum::<f64>()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }
}
