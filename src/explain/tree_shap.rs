//! Path-dependent Tree SHAP
//!
//! Exact Shapley values for tree ensembles in polynomial time. Each tree is
//! walked once; along the way a path of unique split features is kept with
//! the weight of every subset size, so subsets are never enumerated.
//!
//! For a path element:
//! - `zero_fraction`: share of training cover that flows this way when the
//!   feature is unknown
//! - `one_fraction`: 1 if `x` itself flows this way, else 0
//! - `pweight`: proportion of feature subsets of a given size that reach here

use crate::ensemble::{goes_left, Node, Tree, TreeEnsemble};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the root placeholder
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// SHAP values of one row against one ensemble, indexed by feature
pub fn shap_values(ensemble: &TreeEnsemble, x: &[f64]) -> Vec<f64> {
    let mut phi = vec![0.0; ensemble.feature_count()];
    for tree in &ensemble.trees {
        tree_shap(tree, x, &mut phi);
    }
    phi
}

/// Add one tree's contributions for `x` into `phi`
pub fn tree_shap(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    let mut walker = Walker { tree, x, phi };
    walker.recurse(0, &[], 0, 1.0, 1.0, None);
}

struct Walker<'a> {
    tree: &'a Tree,
    x: &'a [f64],
    phi: &'a mut [f64],
}

impl Walker<'_> {
    fn recurse(
        &mut self,
        node_idx: usize,
        parent_path: &[PathElement],
        mut unique_depth: usize,
        parent_zero_fraction: f64,
        parent_one_fraction: f64,
        parent_feature: Option<usize>,
    ) {
        let mut path = Vec::with_capacity(unique_depth + 2);
        path.extend_from_slice(&parent_path[..unique_depth]);
        path.push(PathElement {
            feature: parent_feature,
            zero_fraction: parent_zero_fraction,
            one_fraction: parent_one_fraction,
            pweight: 0.0,
        });
        extend_path(&mut path, unique_depth);

        let tree = self.tree;
        match &tree.nodes[node_idx] {
            Node::Leaf { value, .. } => {
                for i in 1..=unique_depth {
                    let w = unwound_path_sum(&path, unique_depth, i);
                    let el = path[i];
                    if let Some(feature) = el.feature {
                        self.phi[feature] += w * (el.one_fraction - el.zero_fraction) * value;
                    }
                }
            }
            Node::Split { feature, threshold, left, right, cover } => {
                let (hot, cold) = if goes_left(self.x[*feature], *threshold) {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                let hot_zero_fraction = tree.nodes[hot].cover() / cover;
                let cold_zero_fraction = tree.nodes[cold].cover() / cover;

                let mut incoming_zero_fraction = 1.0;
                let mut incoming_one_fraction = 1.0;

                // A feature seen earlier on the path is undone and redone here
                if let Some(path_index) =
                    (1..=unique_depth).find(|&i| path[i].feature == Some(*feature))
                {
                    incoming_zero_fraction = path[path_index].zero_fraction;
                    incoming_one_fraction = path[path_index].one_fraction;
                    unwind_path(&mut path, unique_depth, path_index);
                    unique_depth -= 1;
                }

                self.recurse(
                    hot,
                    &path,
                    unique_depth + 1,
                    hot_zero_fraction * incoming_zero_fraction,
                    incoming_one_fraction,
                    Some(*feature),
                );
                self.recurse(
                    cold,
                    &path,
                    unique_depth + 1,
                    cold_zero_fraction * incoming_zero_fraction,
                    0.0,
                    Some(*feature),
                );
            }
        }
    }
}

/// Grow the subset-size weights by the element at `unique_depth`
fn extend_path(path: &mut [PathElement], unique_depth: usize) {
    let zero = path[unique_depth].zero_fraction;
    let one = path[unique_depth].one_fraction;
    path[unique_depth].pweight = if unique_depth == 0 { 1.0 } else { 0.0 };

    let denom = (unique_depth + 1) as f64;
    for i in (0..unique_depth).rev() {
        path[i + 1].pweight += one * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero * path[i].pweight * (unique_depth - i) as f64 / denom;
    }
}

/// Inverse of [`extend_path`] for the element at `path_index`
fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one = path[path_index].one_fraction;
    let zero = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        if one != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one);
            next_one_portion = tmp - path[i].pweight * zero * (unique_depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero * (unique_depth - i) as f64);
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

/// Total pweight the path would have with `path_index` unwound
fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one = path[path_index].one_fraction;
    let zero = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        if one != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero * (unique_depth - i) as f64 / denom;
        } else {
            total += path[i].pweight / zero * denom / (unique_depth - i) as f64;
        }
    }
    total
}
