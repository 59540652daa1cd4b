//! Model file loading
//!
//! Accepts the native `TreeEnsemble` JSON or an XGBoost JSON model, checks
//! structure and feature layout, and fingerprints the file.

use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{xgboost, ModelError, TreeEnsemble};
use crate::models::{feature_index, feature_names, matches_layout, FEATURE_COUNT};

/// A validated ensemble plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub ensemble: TreeEnsemble,
    pub path: String,
    pub sha256: String,
}

/// Load, validate and fingerprint a model file
pub fn load_model(path: impl AsRef<Path>) -> Result<LoadedModel, ModelError> {
    let path = path.as_ref();
    tracing::info!("Loading model from: {}", path.display());

    let bytes = std::fs::read(path)?;
    let sha256 = hash_bytes(&bytes);

    let mut ensemble = parse_model(&bytes)?;
    ensure_layout(&mut ensemble)?;

    tracing::info!(
        "Model loaded: {} trees, max depth {}, sha256 {}",
        ensemble.trees.len(),
        ensemble.max_depth(),
        sha256
    );

    Ok(LoadedModel {
        ensemble,
        path: path.display().to_string(),
        sha256,
    })
}

/// Parse and validate either supported model format
pub fn parse_model(bytes: &[u8]) -> Result<TreeEnsemble, ModelError> {
    let value: Value = serde_json::from_slice(bytes)?;

    if xgboost::is_xgboost_document(&value) {
        tracing::debug!("Detected XGBoost model document");
        return xgboost::from_value(value);
    }

    let ensemble: TreeEnsemble = serde_json::from_value(value)?;
    ensemble.validate()?;
    Ok(ensemble)
}

/// Require the ensemble to score exactly the serving feature layout
///
/// Generic `f0..fN` names (XGBoost without feature names) are replaced by
/// the layout names; real names must match the layout in order.
pub fn ensure_layout(ensemble: &mut TreeEnsemble) -> Result<(), ModelError> {
    if ensemble.feature_count() != FEATURE_COUNT {
        return Err(ModelError::LayoutMismatch(format!(
            "model has {} features, expected {}",
            ensemble.feature_count(),
            FEATURE_COUNT
        )));
    }

    let generic = ensemble
        .feature_names
        .iter()
        .enumerate()
        .all(|(i, name)| *name == format!("f{i}"));

    if generic {
        tracing::warn!("Model has no feature names, assuming serving layout order");
        ensemble.feature_names = feature_names().map(String::from).collect();
        return Ok(());
    }

    if !matches_layout(&ensemble.feature_names) {
        let detail = ensemble
            .feature_names
            .iter()
            .zip(feature_names())
            .enumerate()
            .find(|(_, (actual, expected))| actual != expected)
            .map(|(i, (actual, expected))| match feature_index(actual) {
                Some(at) => format!("column {i} is '{actual}' (layout position {at}), expected '{expected}'"),
                None => format!("column {i} is '{actual}', not a serving feature"),
            })
            .unwrap_or_else(|| "feature names differ from the serving layout".to_string());
        return Err(ModelError::LayoutMismatch(detail));
    }
    Ok(())
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{Node, Tree};
    use std::io::Write;

    fn layout_ensemble() -> TreeEnsemble {
        TreeEnsemble::new(
            feature_names().map(String::from).collect(),
            -0.2,
            vec![Tree {
                nodes: vec![
                    Node::Split { feature: 4, threshold: 0.5, left: 1, right: 2, cover: 8.0 },
                    Node::Leaf { value: -0.3, cover: 5.0 },
                    Node::Leaf { value: 0.7, cover: 3.0 },
                ],
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_load_native_model_file() {
        let ensemble = layout_ensemble();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&ensemble).unwrap().as_bytes()).unwrap();

        let loaded = load_model(file.path()).unwrap();
        assert_eq!(loaded.ensemble, ensemble);
        assert_eq!(loaded.sha256.len(), 64);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_model(b"{ not json"), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_layout_checks() {
        let mut ok = layout_ensemble();
        assert!(ensure_layout(&mut ok).is_ok());

        let mut renamed = layout_ensemble();
        renamed.feature_names[3] = "Something else".to_string();
        assert!(matches!(ensure_layout(&mut renamed), Err(ModelError::LayoutMismatch(_))));

        let mut swapped = layout_ensemble();
        swapped.feature_names.swap(0, 1);
        let err = ensure_layout(&mut swapped).unwrap_err();
        assert!(err.to_string().contains("'Fixed Assets to Assets' (layout position 1)"));

        let mut generic = layout_ensemble();
        generic.feature_names = (0..FEATURE_COUNT).map(|i| format!("f{i}")).collect();
        ensure_layout(&mut generic).unwrap();
        assert_eq!(generic.feature_names[0], "Quick Ratio");

        let mut short = TreeEnsemble::new(
            vec!["a".to_string()],
            0.0,
            vec![Tree { nodes: vec![Node::Leaf { value: 0.0, cover: 1.0 }] }],
        )
        .unwrap();
        assert!(matches!(ensure_layout(&mut short), Err(ModelError::LayoutMismatch(_))));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }
}
