//! Explain Module - Per-feature attribution of ensemble predictions
//!
//! Every prediction is explained with exact Shapley values computed by
//! Tree SHAP. Attributions always satisfy
//! `sum(attribution) + baseline == margin` within [`EFFICIENCY_TOLERANCE`];
//! a gap beyond that is reported as an error, never returned.

pub mod tree_shap;


use crate::ensemble::TreeEnsemble;
use crate::models::{Attribution, FeatureVector};

use tree_shap::shap_values;

/// Relative tolerance of the efficiency check
pub const EFFICIENCY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributionError {
    #[error("row has {actual} features, ensemble expects {expected}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("attribution for '{0}' is not finite")]
    NonFinite(String),
    #[error("attributions sum to {sum} + baseline {baseline}, margin is {margin}")]
    EfficiencyGap { sum: f64, baseline: f64, margin: f64 },
}

/// Attribute one validated row, keyed by feature name
pub fn explain(
    ensemble: &TreeEnsemble,
    baseline: f64,
    vector: &FeatureVector,
) -> Result<Attribution, AttributionError> {
    let phi = explain_values(ensemble, baseline, vector.as_slice())?;
    Ok(ensemble.feature_names.iter().cloned().zip(phi).collect())
}

/// Attribute raw feature values, indexed like the ensemble's features
pub fn explain_values(
    ensemble: &TreeEnsemble,
    baseline: f64,
    x: &[f64],
) -> Result<Vec<f64>, AttributionError> {
    if x.len() != ensemble.feature_count() {
        return Err(AttributionError::FeatureCount {
            expected: ensemble.feature_count(),
            actual: x.len(),
        });
    }

    let phi = shap_values(ensemble, x);

    if let Some(i) = phi.iter().position(|v| !v.is_finite()) {
        return Err(AttributionError::NonFinite(ensemble.feature_names[i].clone()));
    }

    let margin = ensemble.margin(x);
    let sum: f64 = phi.iter().sum();
    if !efficiency_holds(sum, baseline, margin, &phi) {
        return Err(AttributionError::EfficiencyGap { sum, baseline, margin });
    }
    Ok(phi)
}

fn efficiency_holds(sum: f64, baseline: f64, margin: f64, phi: &[f64]) -> bool {
    let scale = phi
        .iter()
        .map(|v| v.abs())
        .fold(margin.abs().max(baseline.abs()).max(1.0), f64::max);
    (sum + baseline - margin).abs() <= EFFICIENCY_TOLERANCE * scale
}
