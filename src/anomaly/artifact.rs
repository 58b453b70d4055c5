//! Persisted model artifacts
//!
//! A fitted model is stored as JSON wrapped in a versioned envelope so a
//! reader can reject files from another format revision or another estimator
//! before trusting the model body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{AnomalyError, FitParams, OutlierModel};

/// Bump when the envelope or any model layout changes incompatibly.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around a fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    /// Format version for forward compatibility.
    pub schema_version: u32,
    /// Estimator identifier (`OutlierModel::ALGORITHM`).
    pub algorithm: String,
    pub trained_at: DateTime<Utc>,
    /// Size of the training set.
    pub n_samples: usize,
    pub params: FitParams,
    pub model: M,
}

impl<M: OutlierModel> ModelArtifact<M> {
    pub fn new(model: M, n_samples: usize, params: FitParams) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            algorithm: M::ALGORITHM.to_string(),
            trained_at: Utc::now(),
            n_samples,
            params,
            model,
        }
    }
}

/// Save an artifact atomically (write temp file, then rename).
///
/// Parent directories are created as needed.
pub fn save_artifact<M: OutlierModel>(artifact: &ModelArtifact<M>, path: &Path) -> Result<(), AnomalyError> {
    let json = serde_json::to_vec_pretty(artifact)?;

    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load an artifact and check its schema version and algorithm.
///
/// # Errors
/// `ModelUnavailable` when the file does not exist, `SchemaMismatch` or
/// `AlgorithmMismatch` for a foreign artifact, `Serialization` for a
/// body that does not parse, `CorruptModel` for one that parses but fails
/// `OutlierModel::validate`.
pub fn load_artifact<M: OutlierModel>(path: &Path) -> Result<ModelArtifact<M>, AnomalyError> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AnomalyError::ModelUnavailable(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    // Check the header first so a layout change reports as a version error
    #[derive(Deserialize)]
    struct Header {
        schema_version: u32,
        algorithm: String,
    }
    let header: Header = serde_json::from_slice(&data)?;
    if header.schema_version != ARTIFACT_SCHEMA_VERSION {
        return Err(AnomalyError::SchemaMismatch(
            header.schema_version,
            ARTIFACT_SCHEMA_VERSION,
        ));
    }
    if header.algorithm != M::ALGORITHM {
        return Err(AnomalyError::AlgorithmMismatch {
            found: header.algorithm,
            expected: M::ALGORITHM.to_string(),
        });
    }

    let artifact: ModelArtifact<M> = serde_json::from_slice(&data)?;
    artifact.model.validate()?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{IsolationForest, ZScoreEnvelope};

    fn samples() -> Vec<Vec<f64>> {
        (0..50)
            .map(|i| vec![230.0 + f64::from(i % 7) * 0.1, 0.01 + f64::from(i % 5) * 0.001])
            .collect()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("models").join("zscore.json");
        let params = FitParams::default();
        let model = ZScoreEnvelope::fit(&samples(), &params).expect("fit");
        let probe = [230.3, 0.012];
        let expected = model.decision_function(&probe);

        save_artifact(&ModelArtifact::new(model, 50, params), &path).expect("save");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists(), "temp file left behind");

        let loaded: ModelArtifact<ZScoreEnvelope> = load_artifact(&path).expect("load");
        assert_eq!(loaded.n_samples, 50);
        assert_eq!(loaded.algorithm, "zscore");
        assert!((loaded.model.decision_function(&probe) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let result = load_artifact::<IsolationForest>(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(AnomalyError::ModelUnavailable(_))));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("old.json");
        std::fs::write(&path, r#"{"schema_version": 0, "algorithm": "isolation_forest"}"#).expect("write");
        assert!(matches!(
            load_artifact::<IsolationForest>(&path),
            Err(AnomalyError::SchemaMismatch(0, ARTIFACT_SCHEMA_VERSION))
        ));
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("m.json");
        let params = FitParams::default();
        let model = ZScoreEnvelope::fit(&samples(), &params).expect("fit");
        save_artifact(&ModelArtifact::new(model, 50, params), &path).expect("save");
        assert!(matches!(
            load_artifact::<IsolationForest>(&path),
            Err(AnomalyError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupt_body_is_serialization_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"not json at all").expect("write");
        assert!(matches!(
            load_artifact::<IsolationForest>(&path),
            Err(AnomalyError::Serialization(_))
        ));
    }

    #[test]
    fn test_parseable_but_inconsistent_model_rejected() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("zscore.json");
        let params = FitParams::default();
        let model = ZScoreEnvelope::fit(&samples(), &params).expect("fit");
        save_artifact(&ModelArtifact::new(model, 50, params), &path).expect("save");

        let mut json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        json["model"]["std_devs"] = serde_json::json!([0.5]);
        std::fs::write(&path, serde_json::to_vec(&json).expect("encode")).expect("write");

        assert!(matches!(
            load_artifact::<ZScoreEnvelope>(&path),
            Err(AnomalyError::CorruptModel(_))
        ));
    }
}
