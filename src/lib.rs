//! GridWatch: Edge Power-Quality Meter
//!
//! Simulates a mains voltage waveform, injects power-quality faults, and
//! turns the samples into a diagnosis without external connectivity.
//!
//! ## Architecture
//!
//! - **Simulation**: clean sinusoid synthesis plus sag, swell, harmonic and noise injection
//! - **Processing**: FFT spectrum, RMS, peak and total harmonic distortion
//! - **Anomaly**: unsupervised outlier model (isolation forest) with persisted artifacts
//! - **Diagnosis**: threshold rules combined with the anomaly model's verdict
//! - **Pipeline**: one analysis cycle end to end, training trigger, live loop

pub mod anomaly;
pub mod config;
pub mod diagnosis;
pub mod pipeline;
pub mod processing;
pub mod simulation;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, MeterConfig};

// Re-export commonly used types
pub use types::{CycleReport, CycleRequest, FaultSpec, FeatureVector, Spectrum, Thresholds, Waveform};

// Re-export pipeline stages
pub use anomaly::{
    AnomalyClassifier, AnomalyDetector, AnomalyError, FitParams, IsolationForest, ModelAlgorithm,
    ModelHandle, OutlierModel, Prediction, ZScoreEnvelope,
};
pub use diagnosis::{Diagnoser, Diagnosis, Issue};
pub use pipeline::{LiveLoop, LiveStats, MeterPipeline, PipelineError};
pub use processing::{ProcessingError, SpectralAnalyzer};
pub use simulation::{FaultInjector, SimulationError, WaveformGenerator};
