//! Prediction model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::features::FeatureGroup;

/// Per-feature signed contribution for one row
pub type Attribution = BTreeMap<String, f64>;

/// Model output for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: u8,
    pub probability: f64,
    pub margin: f64,
}

impl Prediction {
    /// Apply the binary logistic link to a raw margin
    pub fn from_margin(margin: f64) -> Self {
        let probability = sigmoid(margin);
        Self {
            label: u8::from(probability > 0.5),
            probability,
            margin,
        }
    }
}

/// Numerically stable logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`sigmoid`]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Completed pipeline output, one entry per input row in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionBatch {
    pub predictions: Vec<u8>,
    pub probabilities: Vec<f64>,
    pub attributions: Vec<Attribution>,
    pub margins: Vec<f64>,
    /// Expected model output the attributions are measured from
    pub base_value: f64,
}

impl PredictionBatch {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub batch: PredictionBatch,
}

/// JSON alternative to the CSV upload
#[derive(Debug, Deserialize)]
pub struct PredictJsonRequest {
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureInfo {
    pub name: &'static str,
    pub group: FeatureGroup,
    pub min: f64,
    pub max: f64,
}

/// Metadata of the loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub sha256: String,
    pub objective: String,
    pub tree_count: usize,
    pub leaf_count: usize,
    pub max_depth: usize,
    pub base_value: f64,
    pub features: Vec<FeatureInfo>,
    pub loaded_at: DateTime<Utc>,
}
