//! Unsupervised anomaly detection over power-quality feature tuples
//!
//! The detector learns what "normal" `(rms, thd)` tuples look like and flags
//! cycles that fall outside that envelope, catching faults the fixed rules
//! have no signature for.
//!
//! ## Architecture
//!
//! - `OutlierModel`: a fitted statistical estimator (isolation forest, z-score envelope)
//! - `ModelHandle`: shared, atomically swappable slot holding the current model
//! - `AnomalyDetector`: train / persist / lazy-load lifecycle around one handle
//! - `AnomalyClassifier`: object-safe seam the diagnoser depends on
//!
//! ## Lifecycle
//!
//! ```ignore
//! let detector = AnomalyDetector::<IsolationForest>::new("data/models/isolation_forest.json", FitParams::default());
//! detector.train(&normal_samples)?;            // fits, persists, swaps in
//! let p = detector.predict(&[231.0, 0.012]);   // Normal / Anomalous
//! ```
//!
//! A detector with no model in memory tries the artifact on every miss; if
//! that fails for any reason it answers `Normal`.

mod artifact;
mod detector;
mod isolation_forest;
mod zscore;

pub use artifact::{load_artifact, save_artifact, ModelArtifact, ARTIFACT_SCHEMA_VERSION};
pub use detector::{AnomalyDetector, DetectorStatus, ModelHandle};
pub use isolation_forest::{average_path_length, IsolationForest, IsolationTree};
pub use zscore::ZScoreEnvelope;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{defaults, AnomalyConfig};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("Invalid training input: {0}")]
    InvalidInput(String),

    #[error("No trained model available at {}", .0.display())]
    ModelUnavailable(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schema version mismatch: file has v{0}, expected v{1}")]
    SchemaMismatch(u32, u32),

    #[error("Artifact holds a '{found}' model, expected '{expected}'")]
    AlgorithmMismatch { found: String, expected: String },

    #[error("Corrupt model: {0}")]
    CorruptModel(String),
}

// ============================================================================
// Predictions
// ============================================================================

/// Outcome of scoring one feature tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    Normal,
    Anomalous,
}

impl Prediction {
    pub fn is_anomalous(self) -> bool {
        matches!(self, Self::Anomalous)
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prediction::Normal => write!(f, "NORMAL"),
            Prediction::Anomalous => write!(f, "ANOMALOUS"),
        }
    }
}

// ============================================================================
// Model Abstractions
// ============================================================================

/// Which estimator backs the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelAlgorithm {
    #[default]
    IsolationForest,
    ZScore,
}

impl ModelAlgorithm {
    /// Stable identifier, also used as the default artifact file stem.
    pub fn name(self) -> &'static str {
        match self {
            Self::IsolationForest => IsolationForest::ALGORITHM,
            Self::ZScore => ZScoreEnvelope::ALGORITHM,
        }
    }
}

/// Hyperparameters shared by every estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    /// Expected outlier share; calibrates the decision offset
    pub contamination: f64,
    /// Base seed for any randomness in fitting
    pub seed: u64,
    /// Trees in an isolation forest
    pub n_estimators: usize,
    /// Per-tree subsample cap
    pub max_samples: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            contamination: defaults::CONTAMINATION,
            seed: defaults::MODEL_SEED,
            n_estimators: defaults::N_ESTIMATORS,
            max_samples: defaults::MAX_SAMPLES,
        }
    }
}

impl From<&AnomalyConfig> for FitParams {
    fn from(cfg: &AnomalyConfig) -> Self {
        Self {
            contamination: cfg.contamination,
            seed: cfg.seed,
            n_estimators: cfg.n_estimators,
            max_samples: cfg.max_samples,
        }
    }
}

/// A fitted unsupervised outlier estimator.
///
/// Scores follow the "higher is more normal" convention; a sample is an
/// outlier when its score falls below the offset calibrated at fit time.
pub trait OutlierModel: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// Identifier recorded in persisted artifacts.
    const ALGORITHM: &'static str;

    /// Fit on samples assumed to be normal operation.
    fn fit(samples: &[Vec<f64>], params: &FitParams) -> Result<Self, AnomalyError>;

    /// Arity of the tuples this model was fitted on.
    fn n_features(&self) -> usize;

    /// Normality score of one tuple (higher = more normal).
    fn score_samples(&self, sample: &[f64]) -> f64;

    /// Decision offset calibrated from the training scores.
    fn offset(&self) -> f64;

    /// Structural check run on every deserialized model before it is scored.
    ///
    /// # Errors
    /// `CorruptModel` when the model could index out of bounds, fail to
    /// terminate, or produce non-finite scores.
    fn validate(&self) -> Result<(), AnomalyError>;

    /// Signed distance to the decision boundary; negative means outlier.
    fn decision_function(&self, sample: &[f64]) -> f64 {
        self.score_samples(sample) - self.offset()
    }

    fn is_outlier(&self, sample: &[f64]) -> bool {
        self.decision_function(sample) < 0.0
    }
}

/// Train/score capability consumed by the diagnoser.
pub trait AnomalyClassifier: Send + Sync {
    /// Fit on normal samples and make the result current.
    fn train(&self, samples: &[Vec<f64>]) -> Result<(), AnomalyError>;

    /// Classify one tuple. Never fails: anything short of a usable model is `Normal`.
    fn predict(&self, sample: &[f64]) -> Prediction;

    fn is_trained(&self) -> bool;

    fn status(&self) -> DetectorStatus;
}

/// Build the detector selected by `cfg.algorithm`.
pub fn detector_from_config(cfg: &AnomalyConfig) -> Arc<dyn AnomalyClassifier> {
    let params = FitParams::from(cfg);
    let path = cfg.artifact_path();
    match cfg.algorithm {
        ModelAlgorithm::IsolationForest => Arc::new(AnomalyDetector::<IsolationForest>::new(path, params)),
        ModelAlgorithm::ZScore => Arc::new(AnomalyDetector::<ZScoreEnvelope>::new(path, params)),
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Check a training matrix and return its arity.
///
/// Requires at least two rows, a common non-zero width and finite values.
pub(crate) fn validate_samples(samples: &[Vec<f64>]) -> Result<usize, AnomalyError> {
    let first = samples
        .first()
        .ok_or_else(|| AnomalyError::InvalidInput("training set is empty".to_string()))?;
    if samples.len() < 2 {
        return Err(AnomalyError::InvalidInput(
            "training set needs at least 2 samples".to_string(),
        ));
    }
    let arity = first.len();
    if arity == 0 {
        return Err(AnomalyError::InvalidInput(
            "training samples have no features".to_string(),
        ));
    }
    for (i, row) in samples.iter().enumerate() {
        if row.len() != arity {
            return Err(AnomalyError::InvalidInput(format!(
                "sample {i} has {} features, expected {arity}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AnomalyError::InvalidInput(format!(
                "sample {i} contains a non-finite value"
            )));
        }
    }
    Ok(arity)
}

/// `contamination` quantile of training scores, the decision offset.
pub(crate) fn contamination_offset(scores: Vec<f64>, contamination: f64) -> f64 {
    use statrs::statistics::{Data, OrderStatistics};
    let mut data = Data::new(scores);
    data.quantile(contamination)
}

pub(crate) fn validate_params(params: &FitParams) -> Result<(), AnomalyError> {
    if !(params.contamination > 0.0 && params.contamination <= 0.5) {
        return Err(AnomalyError::InvalidInput(format!(
            "contamination must be in (0, 0.5], got {}",
            params.contamination
        )));
    }
    if params.n_estimators == 0 || params.max_samples == 0 {
        return Err(AnomalyError::InvalidInput(
            "n_estimators and max_samples must be > 0".to_string(),
        ));
    }
    Ok(())
}
