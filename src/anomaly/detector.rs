//! Detector lifecycle: train, persist, lazy-load and fail-open scoring

use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::artifact::{load_artifact, save_artifact, ModelArtifact};
use super::{validate_samples, AnomalyClassifier, AnomalyError, FitParams, IsolationForest, OutlierModel, Prediction};

// ============================================================================
// Model Handle
// ============================================================================

/// Shared slot for the current model.
///
/// Readers take a snapshot `Arc` and never block; a retrain or reload swaps
/// the whole model in one store, so a reader sees either the old or the new
/// model and never a partially written one.
pub struct ModelHandle<M> {
    inner: Arc<ArcSwapOption<M>>,
}

impl<M> Clone for ModelHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for ModelHandle<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelHandle<M> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Snapshot of the current model, if any.
    pub fn current(&self) -> Option<Arc<M>> {
        self.inner.load_full()
    }

    pub fn replace(&self, model: M) {
        self.inner.store(Some(Arc::new(model)));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.load().is_some()
    }
}

// ============================================================================
// Status
// ============================================================================

/// Point-in-time view of a detector, for logs and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub algorithm: &'static str,
    pub trained: bool,
    pub artifact_path: PathBuf,
    pub artifact_present: bool,
    pub n_features: Option<usize>,
}

impl std::fmt::Display for DetectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} model {} (artifact {}: {})",
            self.algorithm,
            if self.trained { "loaded" } else { "not loaded" },
            self.artifact_path.display(),
            if self.artifact_present { "present" } else { "absent" }
        )
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Unsupervised anomaly detector bound to one artifact path.
///
/// Starts untrained. `train` fits, persists and swaps in a new model;
/// `predict` lazily loads the artifact on a miss and answers `Normal`
/// whenever no usable model exists.
pub struct AnomalyDetector<M: OutlierModel = IsolationForest> {
    handle: ModelHandle<M>,
    artifact_path: PathBuf,
    params: FitParams,
    /// Set after the first failed lazy load is logged, so a live loop
    /// does not repeat the same warning every cycle
    load_failure_logged: AtomicBool,
}

impl<M: OutlierModel> AnomalyDetector<M> {
    pub fn new(artifact_path: impl Into<PathBuf>, params: FitParams) -> Self {
        Self::with_handle(ModelHandle::new(), artifact_path, params)
    }

    /// Detector sharing an existing handle; a retrain through either side is
    /// visible to both.
    pub fn with_handle(handle: ModelHandle<M>, artifact_path: impl Into<PathBuf>, params: FitParams) -> Self {
        Self {
            handle,
            artifact_path: artifact_path.into(),
            params,
            load_failure_logged: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> ModelHandle<M> {
        self.handle.clone()
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn params(&self) -> &FitParams {
        &self.params
    }

    /// Fit on `samples`, persist the artifact, then make the model current.
    ///
    /// If persisting fails the previous model (if any) stays current.
    pub fn fit_and_store(&self, samples: &[Vec<f64>]) -> Result<(), AnomalyError> {
        validate_samples(samples)?;
        let model = M::fit(samples, &self.params)?;

        let artifact = ModelArtifact::new(model, samples.len(), self.params);
        save_artifact(&artifact, &self.artifact_path)?;
        self.handle.replace(artifact.model);
        self.load_failure_logged.store(false, Ordering::Relaxed);

        info!(
            algorithm = M::ALGORITHM,
            n_samples = samples.len(),
            path = %self.artifact_path.display(),
            "Anomaly model trained and saved"
        );
        Ok(())
    }

    /// Replace the in-memory model with the persisted artifact.
    ///
    /// On error the current model is left untouched.
    pub fn load_model(&self) -> Result<(), AnomalyError> {
        let artifact: ModelArtifact<M> = load_artifact(&self.artifact_path)?;
        info!(
            algorithm = M::ALGORITHM,
            trained_at = %artifact.trained_at,
            n_samples = artifact.n_samples,
            path = %self.artifact_path.display(),
            "Anomaly model loaded"
        );
        self.handle.replace(artifact.model);
        self.load_failure_logged.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Current model, loading the artifact on a miss. `None` if neither exists.
    fn ensure_model(&self) -> Option<Arc<M>> {
        if let Some(model) = self.handle.current() {
            return Some(model);
        }
        match self.load_model() {
            Ok(()) => self.handle.current(),
            Err(AnomalyError::ModelUnavailable(_)) => {
                debug!(path = %self.artifact_path.display(), "No anomaly model artifact; treating as normal");
                None
            }
            Err(e) => {
                if !self.load_failure_logged.swap(true, Ordering::Relaxed) {
                    warn!(
                        error = %e,
                        path = %self.artifact_path.display(),
                        "Anomaly model artifact unusable; treating as normal"
                    );
                }
                None
            }
        }
    }

    /// Signed distance to the decision boundary, if a model is available and
    /// the tuple can be scored.
    pub fn decision_score(&self, sample: &[f64]) -> Option<f64> {
        let model = self.ensure_model()?;
        if sample.len() != model.n_features() {
            warn!(
                expected = model.n_features(),
                got = sample.len(),
                "Feature arity mismatch; treating as normal"
            );
            return None;
        }
        if sample.iter().any(|v| !v.is_finite()) {
            warn!("Non-finite feature value; treating as normal");
            return None;
        }
        Some(model.decision_function(sample)).filter(|s| s.is_finite())
    }

    pub fn classify(&self, sample: &[f64]) -> Prediction {
        match self.decision_score(sample) {
            Some(score) if score < 0.0 => Prediction::Anomalous,
            _ => Prediction::Normal,
        }
    }

    pub fn detector_status(&self) -> DetectorStatus {
        DetectorStatus {
            algorithm: M::ALGORITHM,
            trained: self.handle.is_loaded(),
            artifact_path: self.artifact_path.clone(),
            artifact_present: self.artifact_path.exists(),
            n_features: self.handle.current().map(|m| m.n_features()),
        }
    }
}

impl<M: OutlierModel> AnomalyClassifier for AnomalyDetector<M> {
    fn train(&self, samples: &[Vec<f64>]) -> Result<(), AnomalyError> {
        self.fit_and_store(samples)
    }

    fn predict(&self, sample: &[f64]) -> Prediction {
        self.classify(sample)
    }

    fn is_trained(&self) -> bool {
        self.handle.is_loaded()
    }

    fn status(&self) -> DetectorStatus {
        self.detector_status()
    }
}

// ============================================================================
// Tests
// ============================================================================
