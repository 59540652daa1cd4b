//! XGBoost JSON model import
//!
//! Reads the document written by `Booster.save_model("model.json")`.
//! Trees are stored column-wise; a node is a leaf when its left child is
//! `-1`, in which case `split_conditions` holds the leaf value.

use serde::Deserialize;
use serde_json::Value;

use super::{invalid, ModelError, Node, Objective, Tree, TreeEnsemble};
use crate::models::logit;

#[derive(Debug, Deserialize)]
struct Document {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
    objective: ObjectiveSpec,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    model: Option<GbTreeModel>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    trees: Vec<XgbTree>,
}

#[derive(Debug, Deserialize)]
struct XgbTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    sum_hessian: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveSpec {
    name: String,
}

/// True when the document looks like an XGBoost model
pub fn is_xgboost_document(value: &Value) -> bool {
    value.get("learner").is_some()
}

/// Convert an XGBoost JSON document into a validated ensemble
pub fn from_value(value: Value) -> Result<TreeEnsemble, ModelError> {
    let doc: Document = serde_json::from_value(value)?;
    let learner = doc.learner;

    if learner.objective.name != Objective::BinaryLogistic.as_str() {
        return Err(ModelError::UnsupportedObjective(learner.objective.name));
    }
    if learner.gradient_booster.name != "gbtree" {
        return Err(invalid(format!(
            "unsupported booster '{}', expected gbtree",
            learner.gradient_booster.name
        )));
    }
    let model = learner
        .gradient_booster
        .model
        .ok_or_else(|| invalid("gbtree booster has no model"))?;

    let num_feature: usize = learner
        .learner_model_param
        .num_feature
        .trim()
        .parse()
        .map_err(|_| invalid("num_feature is not an integer"))?;

    let feature_names = if learner.feature_names.is_empty() {
        (0..num_feature).map(|i| format!("f{i}")).collect()
    } else if learner.feature_names.len() == num_feature {
        learner.feature_names
    } else {
        return Err(invalid(format!(
            "{} feature names for {} features",
            learner.feature_names.len(),
            num_feature
        )));
    };

    let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
    let trees = model
        .trees
        .into_iter()
        .enumerate()
        .map(|(idx, tree)| convert_tree(idx, tree))
        .collect::<Result<Vec<_>, _>>()?;

    let ensemble = TreeEnsemble {
        feature_names,
        base_margin: logit(base_score),
        objective: Objective::BinaryLogistic,
        trees,
    };
    ensemble.validate()?;
    Ok(ensemble)
}

/// `base_score` is a probability, written either as `"5E-1"` or `"[5E-1]"`
fn parse_base_score(raw: &str) -> Result<f64, ModelError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    let score: f64 = trimmed
        .parse()
        .map_err(|_| invalid(format!("base_score '{raw}' is not a number")))?;

    if !(score > 0.0 && score < 1.0) {
        return Err(invalid(format!("base_score {score} is outside (0, 1)")));
    }
    Ok(score)
}

fn convert_tree(idx: usize, tree: XgbTree) -> Result<Tree, ModelError> {
    let n = tree.left_children.len();
    if [
        tree.right_children.len(),
        tree.split_indices.len(),
        tree.split_conditions.len(),
        tree.sum_hessian.len(),
    ]
    .iter()
    .any(|len| *len != n)
    {
        return Err(invalid(format!("tree {idx} has arrays of different lengths")));
    }

    let to_index = |raw: i64, what: &str, node: usize| -> Result<usize, ModelError> {
        usize::try_from(raw)
            .map_err(|_| invalid(format!("tree {idx} node {node} has negative {what} {raw}")))
    };

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let cover = tree.sum_hessian[i];
        if tree.left_children[i] == -1 {
            nodes.push(Node::Leaf {
                value: tree.split_conditions[i],
                cover,
            });
        } else {
            nodes.push(Node::Split {
                feature: to_index(tree.split_indices[i], "split index", i)?,
                threshold: tree.split_conditions[i],
                left: to_index(tree.left_children[i], "left child", i)?,
                right: to_index(tree.right_children[i], "right child", i)?,
                cover,
            });
        }
    }
    Ok(Tree { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(objective: &str, base_score: &str) -> Value {
        json!({
            "learner": {
                "feature_names": ["a", "b"],
                "learner_model_param": { "base_score": base_score, "num_feature": "2" },
                "objective": { "name": objective },
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "trees": [{
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [1, 0, 0],
                            "split_conditions": [0.3, -0.4, 0.6],
                            "sum_hessian": [20.0, 15.0, 5.0]
                        }]
                    }
                }
            }
        })
    }

    #[test]
    fn test_import_tree() {
        let ensemble = from_value(document("binary:logistic", "5E-1")).unwrap();

        assert_eq!(ensemble.feature_names, vec!["a", "b"]);
        assert_eq!(ensemble.trees.len(), 1);
        assert!(ensemble.base_margin.abs() < 1e-12);
        assert_eq!(
            ensemble.trees[0].nodes[0],
            Node::Split { feature: 1, threshold: 0.3, left: 1, right: 2, cover: 20.0 }
        );
        assert_eq!(ensemble.trees[0].nodes[2], Node::Leaf { value: 0.6, cover: 5.0 });
        assert!((ensemble.margin(&[0.0, 0.1]) + 0.4).abs() < 1e-12);
    }

    /// Split at 0.1 on the only feature, leaves -1.0 left and 1.0 right
    fn boundary_document() -> Value {
        json!({
            "learner": {
                "feature_names": ["a"],
                "learner_model_param": { "base_score": "5E-1", "num_feature": "1" },
                "objective": { "name": "binary:logistic" },
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "trees": [{
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [0, 0, 0],
                            "split_conditions": [0.1, -1.0, 1.0],
                            "sum_hessian": [2.0, 1.0, 1.0]
                        }]
                    }
                }
            }
        })
    }

    #[test]
    fn test_threshold_compared_like_xgboost() {
        let ensemble = from_value(boundary_document()).unwrap();

        // 0.1 - 1e-10 rounds to 0.1f32, which is not below the threshold
        assert!((ensemble.margin(&[0.1 - 1e-10]) - 1.0).abs() < 1e-12);
        assert!((ensemble.margin(&[0.099]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bracketed_base_score() {
        let ensemble = from_value(document("binary:logistic", "[2.5E-1]")).unwrap();
        assert!((ensemble.base_margin - logit(0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_other_objectives() {
        let err = from_value(document("reg:squarederror", "5E-1")).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedObjective(name) if name == "reg:squarederror"));
    }

    #[test]
    fn test_rejects_bad_base_score() {
        assert!(from_value(document("binary:logistic", "1.0")).is_err());
        assert!(from_value(document("binary:logistic", "abc")).is_err());
    }

    #[test]
    fn test_detects_document() {
        assert!(is_xgboost_document(&document("binary:logistic", "5E-1")));
        assert!(!is_xgboost_document(&json!({ "trees": [] })));
    }
}
