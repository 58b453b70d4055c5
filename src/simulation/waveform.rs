//! Clean sinusoid synthesis

use std::f64::consts::{PI, SQRT_2};

use super::{require_finite, require_positive, SimulationError};
use crate::config::SignalConfig;
use crate::types::Waveform;

/// Synthesize `amplitude · sin(2π·frequency·t)` sampled at `sampling_rate`.
///
/// Produces `N = floor(sampling_rate × duration)` samples at `t_i = i / sampling_rate`
/// for `i ∈ [0, N)`; the endpoint is excluded.
///
/// # Errors
/// `InvalidParameter` if frequency, sampling rate or duration is not a finite
/// value > 0, if the amplitude is not finite, or if the window holds no samples.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn generate_sine_wave(
    frequency: f64,
    sampling_rate: f64,
    duration: f64,
    amplitude: f64,
) -> Result<Waveform, SimulationError> {
    require_positive("frequency", frequency)?;
    require_positive("sampling_rate", sampling_rate)?;
    require_positive("duration", duration)?;
    require_finite("amplitude", amplitude)?;

    let n = (sampling_rate * duration).floor();
    if !(n >= 1.0 && n.is_finite()) {
        return Err(SimulationError::InvalidParameter {
            name: "duration",
            value: duration,
            reason: "window holds no samples at this sampling rate",
        });
    }
    let n = n as usize;

    let omega = 2.0 * PI * frequency;
    let time: Vec<f64> = (0..n).map(|i| i as f64 / sampling_rate).collect();
    let voltage = time.iter().map(|&t| amplitude * (omega * t).sin()).collect();

    Ok(Waveform {
        sampling_rate,
        time,
        voltage,
    })
}

/// Generator bound to the meter's sampling settings and nominal voltage.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    sampling_rate: f64,
    duration: f64,
    nominal_rms: f64,
}

impl WaveformGenerator {
    pub fn new(sampling_rate: f64, duration: f64, nominal_rms: f64) -> Result<Self, SimulationError> {
        Ok(Self {
            sampling_rate: require_positive("sampling_rate", sampling_rate)?,
            duration: require_positive("duration", duration)?,
            nominal_rms: require_positive("nominal_rms", nominal_rms)?,
        })
    }

    pub fn from_config(signal: &SignalConfig) -> Result<Self, SimulationError> {
        Self::new(signal.sampling_rate_hz, signal.duration_secs, signal.nominal_rms_volts)
    }

    /// Peak of a sinusoid whose RMS equals the nominal voltage.
    pub fn nominal_peak(&self) -> f64 {
        self.nominal_rms * SQRT_2
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Full contract: explicit timing, amplitude defaulting to the nominal peak.
    pub fn generate_with(
        &self,
        frequency: f64,
        sampling_rate: f64,
        duration: f64,
        amplitude: Option<f64>,
    ) -> Result<Waveform, SimulationError> {
        let amplitude = amplitude.unwrap_or_else(|| self.nominal_peak());
        generate_sine_wave(frequency, sampling_rate, duration, amplitude)
    }

    /// Nominal-amplitude waveform at `frequency` using the configured timing.
    pub fn generate(&self, frequency: f64) -> Result<Waveform, SimulationError> {
        self.generate_with(frequency, self.sampling_rate, self.duration, None)
    }
}
