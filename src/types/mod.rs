//! Shared data structures for the power-quality pipeline
//!
//! This module defines the core types passed between stages:
//! - `Waveform`: uniformly sampled voltage series (simulation output)
//! - `FaultSpec`: fault configuration consumed by the injector
//! - `Spectrum`: one-sided magnitude spectrum (spectral analysis output)
//! - `FeatureVector`: RMS / THD / peak (feature extraction output)
//! - `Thresholds`: rule limits for the diagnoser
//! - `CycleRequest` / `CycleReport`: presentation boundary records

mod waveform;
mod fault;
pub mod thresholds;
mod report;

pub use waveform::*;
pub use fault::*;
pub use thresholds::*;
pub use report::*;
