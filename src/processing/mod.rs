//! Signal processing module - FFT spectrum and power-quality features

mod features;
mod fft;

pub use features::*;
pub use fft::*;

use thiserror::Error;

/// Errors in signal processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid sampling rate: {0}")]
    InvalidSamplingRate(f64),

    #[error("FFT size mismatch: analyzer planned for {planned}, got {actual} samples")]
    SizeMismatch { planned: usize, actual: usize },
}
