//! FFT computation using rustfft
//!
//! One-sided magnitude spectrum of a real voltage series.
//!
//! # Conventions
//!
//! - Rectangular window, no zero padding: the transform length is the sample count N
//! - Bins `k = 0..=N/2` at `k · fs / N` Hz (the Nyquist bin appears once for even N)
//! - Magnitude `(2/N)·|X_k|` for every retained bin, DC and Nyquist included
//!
//! # Example
//!
//! ```ignore
//! let spectrum = compute_fft(&waveform.voltage, 1000.0)?;
//! let (peak_hz, peak_v) = spectrum.peak().unwrap_or_default();
//! ```

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use super::ProcessingError;
use crate::types::{Spectrum, Waveform};

// ============================================================================
// Standalone FFT Functions
// ============================================================================

/// Compute the one-sided spectrum of time-domain samples.
///
/// Plans a transform for this length on every call; use [`SpectralAnalyzer`]
/// when analysing many windows of the same size.
///
/// # Errors
/// `InvalidInput` for an empty or non-finite series, `InvalidSamplingRate`
/// for a rate that is not a finite value > 0.
pub fn compute_fft(samples: &[f64], sampling_rate: f64) -> Result<Spectrum, ProcessingError> {
    let analyzer = SpectralAnalyzer::new(samples.len(), sampling_rate)?;
    analyzer.compute(samples)
}

/// Number of bins with frequency >= 0 for an N-point transform.
pub fn non_negative_bins(n: usize) -> usize {
    n / 2 + 1
}

// ============================================================================
// Spectral Analyzer (Pre-planned for repeated use)
// ============================================================================

/// FFT processor with a pre-planned transform for repeated computation.
///
/// Every cycle of the meter analyses the same window length, so the plan is
/// built once and shared.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
    sampling_rate: f64,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size)
            .field("sampling_rate", &self.sampling_rate)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    /// Create an analyzer for `size`-sample windows.
    pub fn new(size: usize, sampling_rate: f64) -> Result<Self, ProcessingError> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(ProcessingError::InvalidSamplingRate(sampling_rate));
        }
        if size == 0 {
            return Err(ProcessingError::InvalidInput(
                "cannot analyse an empty waveform".to_string(),
            ));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        Ok(Self {
            fft,
            size,
            sampling_rate,
        })
    }

    /// Analyse a waveform, checking that its rate matches the plan.
    pub fn analyze(&self, waveform: &Waveform) -> Result<Spectrum, ProcessingError> {
        if (waveform.sampling_rate - self.sampling_rate).abs() > f64::EPSILON * self.sampling_rate {
            return Err(ProcessingError::InvalidSamplingRate(waveform.sampling_rate));
        }
        self.compute(&waveform.voltage)
    }

    /// Compute the spectrum of a real-valued signal of exactly `size` samples.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(&self, signal: &[f64]) -> Result<Spectrum, ProcessingError> {
        if signal.is_empty() {
            return Err(ProcessingError::InvalidInput(
                "cannot analyse an empty waveform".to_string(),
            ));
        }
        if signal.len() != self.size {
            return Err(ProcessingError::SizeMismatch {
                planned: self.size,
                actual: signal.len(),
            });
        }
        if let Some(i) = signal.iter().position(|x| !x.is_finite()) {
            return Err(ProcessingError::InvalidInput(format!(
                "non-finite sample at index {i}"
            )));
        }

        // Convert to complex
        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();

        // Compute FFT in-place
        self.fft.process(&mut buffer);

        let n_positive = non_negative_bins(self.size);
        let scale = 2.0 / self.size as f64;

        let frequencies = self.frequency_bins();
        let magnitudes = buffer
            .iter()
            .take(n_positive)
            .map(|c| c.norm() * scale)
            .collect();

        Ok(Spectrum {
            frequencies,
            magnitudes,
            sampling_rate: self.sampling_rate,
        })
    }

    /// Frequency bins for this configuration, ascending.
    #[allow(clippy::cast_precision_loss)]
    pub fn frequency_bins(&self) -> Vec<f64> {
        let resolution = self.frequency_resolution();
        (0..non_negative_bins(self.size))
            .map(|k| k as f64 * resolution)
            .collect()
    }

    /// Get the FFT size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Frequency resolution (Hz per bin)
    #[allow(clippy::cast_precision_loss)]
    pub fn frequency_resolution(&self) -> f64 {
        self.sampling_rate / self.size as f64
    }
}

// ============================================================================
// Tests
// ============================================================================
