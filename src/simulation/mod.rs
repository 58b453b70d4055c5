//! Waveform simulation - clean sinusoid synthesis and fault injection
//!
//! The generator produces the nominal voltage series; the injector applies
//! one transform per call (sag, swell, harmonics, noise). Composition order
//! is decided by the caller:
//!
//! ```ignore
//! let clean = generator.generate(50.0)?;
//! let sagged = injector.sag(&clean, 0.5, 0.3, 0.7)?;
//! let noisy = injector.noise(&sagged, 0.01, &mut rng)?;
//! ```

mod faults;
mod waveform;

pub use faults::FaultInjector;
pub use waveform::{generate_sine_wave, WaveformGenerator};

use thiserror::Error;

/// Errors raised by the generator and the injector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

impl SimulationError {
    fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter { name, value, reason }
    }
}

/// Reject NaN, infinities and values <= 0.
fn require_positive(name: &'static str, value: f64) -> Result<f64, SimulationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimulationError::invalid(name, value, "must be a finite value > 0"))
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<f64, SimulationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimulationError::invalid(name, value, "must be finite"))
    }
}
