//! Shared, immutable model state

use std::sync::Arc;

use chrono::Utc;

use super::model::RiskModel;
use crate::ensemble::{LoadedModel, ModelError};
use crate::models::{matches_layout, FeatureInfo, ModelInfo, FEATURE_COUNT, FEATURE_LAYOUT};
use crate::schema::{input_rule_set, output_rule_set, RuleSet, RuleSetError};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Rules(#[from] RuleSetError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Everything a request pipeline reads, built once at startup
pub struct ModelContext {
    model: Arc<dyn RiskModel>,
    baseline: f64,
    input_rules: RuleSet,
    output_rules: RuleSet,
    info: ModelInfo,
}

impl ModelContext {
    pub fn new(
        model: Arc<dyn RiskModel>,
        model_path: impl Into<String>,
        sha256: impl Into<String>,
    ) -> Result<Self, ContextError> {
        if model.feature_count() != FEATURE_COUNT {
            return Err(ModelError::LayoutMismatch(format!(
                "model has {} features, layout has {}",
                model.feature_count(),
                FEATURE_COUNT
            ))
            .into());
        }

        let ensemble = model.ensemble();
        if !matches_layout(&ensemble.feature_names) {
            return Err(ModelError::LayoutMismatch(
                "model feature names differ from the serving layout".to_string(),
            )
            .into());
        }

        let baseline = ensemble.expected_value();
        let info = ModelInfo {
            model_path: model_path.into(),
            sha256: sha256.into(),
            objective: ensemble.objective.as_str().to_string(),
            tree_count: ensemble.trees.len(),
            leaf_count: ensemble.trees.iter().map(|t| t.leaf_count()).sum(),
            max_depth: ensemble.max_depth(),
            base_value: baseline,
            features: FEATURE_LAYOUT
                .iter()
                .map(|&(name, group)| {
                    let (min, max) = group.bounds();
                    FeatureInfo { name, group, min, max }
                })
                .collect(),
            loaded_at: Utc::now(),
        };

        Ok(Self {
            model,
            baseline,
            input_rules: input_rule_set()?,
            output_rules: output_rule_set()?,
            info,
        })
    }

    pub fn from_loaded(loaded: LoadedModel) -> Result<Self, ContextError> {
        let LoadedModel { ensemble, path, sha256 } = loaded;
        Self::new(Arc::new(ensemble), path, sha256)
    }

    pub fn model(&self) -> &dyn RiskModel {
        self.model.as_ref()
    }

    /// Expected margin over the training distribution
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn input_rules(&self) -> &RuleSet {
        &self.input_rules
    }

    pub fn output_rules(&self) -> &RuleSet {
        &self.output_rules
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}
