//! Model contract
//!
//! The pipeline only needs a model that turns validated rows into
//! predictions and exposes its trees for attribution. The loaded
//! `TreeEnsemble` is the production implementation; tests swap in
//! instrumented ones.

use crate::ensemble::TreeEnsemble;
use crate::explain::AttributionError;
use crate::models::{FeatureVector, Prediction};

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Unexpected failure while scoring or explaining a batch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("model returned {actual} predictions for {expected} rows")]
    RowCountMismatch { expected: usize, actual: usize },
    #[error("model returned a non-finite margin for row {0}")]
    NonFiniteMargin(usize),
    #[error("row {row} could not be converted: {detail}")]
    InvalidRow { row: usize, detail: String },
    #[error("attribution failed for row {row}: {source}")]
    Attribution {
        row: usize,
        #[source]
        source: AttributionError,
    },
}

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// Binary risk classifier backed by a tree ensemble
pub trait RiskModel: Send + Sync {
    /// Tree structure consumed by the attribution engine
    fn ensemble(&self) -> &TreeEnsemble;

    /// Score a batch of rows, one prediction per row in input order
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<Prediction>, InferenceError>;

    fn feature_count(&self) -> usize {
        self.ensemble().feature_count()
    }
}

impl RiskModel for TreeEnsemble {
    fn ensemble(&self) -> &TreeEnsemble {
        self
    }

    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<Prediction>, InferenceError> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let x = row.as_slice();
                if x.len() != self.feature_count() {
                    return Err(InferenceError::InvalidRow {
                        row: i,
                        detail: format!("{} features, model expects {}", x.len(), self.feature_count()),
                    });
                }
                Ok(Prediction::from_margin(self.margin(x)))
            })
            .collect()
    }
}
