//! Analysis pipeline
//!
//! ```text
//! CycleRequest
//!   → WaveformGenerator      (clean sinusoid at the requested frequency)
//!   → FaultInjector          (sag / swell / harmonics, then noise)
//!   → SpectralAnalyzer       (one-sided magnitude spectrum)
//!   → feature extraction     (RMS, THD, peak)
//!   → Diagnoser              (threshold rules + anomaly model)
//!   → CycleReport
//! ```
//!
//! Each cycle is independent. The only state shared between cycles is the
//! anomaly model, replaced atomically when the model is retrained.

mod live;
mod meter;

pub use live::{LiveLoop, LiveStats};
pub use meter::MeterPipeline;

use thiserror::Error;

use crate::anomaly::AnomalyError;
use crate::processing::ProcessingError;
use crate::simulation::SimulationError;

/// Errors surfaced by a pipeline cycle or a training run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Anomaly(#[from] AnomalyError),
}
