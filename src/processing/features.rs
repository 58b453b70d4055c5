//! Power-quality feature extraction: RMS, peak and total harmonic distortion

use tracing::trace;

use super::{compute_fft, ProcessingError};
use crate::config::defaults::THD_EXCLUSION_BINS;
use crate::types::{FeatureVector, Spectrum, Waveform};

/// Root-mean-square of the samples, `sqrt(mean(v²))`.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_rms(samples: &[f64]) -> Result<f64, ProcessingError> {
    if samples.is_empty() {
        return Err(ProcessingError::InvalidInput(
            "RMS of an empty waveform".to_string(),
        ));
    }
    let mean_square = samples.iter().map(|v| v * v).sum::<f64>() / samples.len() as f64;
    Ok(mean_square.sqrt())
}

/// Largest absolute sample.
pub fn calculate_peak(samples: &[f64]) -> Result<f64, ProcessingError> {
    if samples.is_empty() {
        return Err(ProcessingError::InvalidInput(
            "peak of an empty waveform".to_string(),
        ));
    }
    Ok(samples.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())))
}

/// Total harmonic distortion of a time-domain series.
///
/// Computes the spectrum and defers to [`thd_from_spectrum`].
pub fn calculate_thd(
    samples: &[f64],
    fundamental_hz: f64,
    sampling_rate: f64,
) -> Result<f64, ProcessingError> {
    let spectrum = compute_fft(samples, sampling_rate)?;
    thd_from_spectrum(&spectrum, fundamental_hz)
}

/// Total harmonic distortion from an existing spectrum, as a ratio.
///
/// 1. The fundamental is the bin nearest `fundamental_hz` (lowest index on ties).
///    A zero fundamental amplitude gives THD = 0.
/// 2. Residual energy is `Σ|m|²` minus the energy of the half-open windows
///    `[idx-5, idx+5)` around the fundamental and around the bin nearest 0 Hz,
///    clipped at the array bounds. Overlapping windows are subtracted twice.
/// 3. Negative residuals (rounding) clamp to 0.
/// 4. `THD = sqrt(residual) / fundamental_amp`.
pub fn thd_from_spectrum(spectrum: &Spectrum, fundamental_hz: f64) -> Result<f64, ProcessingError> {
    if !fundamental_hz.is_finite() {
        return Err(ProcessingError::InvalidInput(format!(
            "fundamental frequency must be finite (got {fundamental_hz})"
        )));
    }
    let idx = spectrum.nearest_bin(fundamental_hz).ok_or_else(|| {
        ProcessingError::InvalidInput("THD of an empty spectrum".to_string())
    })?;
    let fundamental_amp = spectrum.magnitudes[idx];
    if fundamental_amp == 0.0 {
        return Ok(0.0);
    }

    let mags = &spectrum.magnitudes;
    let total_energy: f64 = mags.iter().map(|m| m * m).sum();
    let fundamental_energy = window_energy(mags, idx);
    let dc_idx = spectrum.nearest_bin(0.0).unwrap_or(0);
    let dc_energy = window_energy(mags, dc_idx);

    let mut residual = total_energy - fundamental_energy - dc_energy;
    trace!(
        idx,
        dc_idx,
        total_energy,
        fundamental_energy,
        dc_energy,
        residual,
        "THD window arithmetic"
    );
    if residual < 0.0 {
        residual = 0.0;
    }

    Ok(residual.sqrt() / fundamental_amp)
}

/// Energy of bins `[centre-5, centre+5)`, clipped to the spectrum.
fn window_energy(magnitudes: &[f64], centre: usize) -> f64 {
    let lo = centre.saturating_sub(THD_EXCLUSION_BINS);
    let hi = (centre + THD_EXCLUSION_BINS).min(magnitudes.len());
    magnitudes[lo..hi].iter().map(|m| m * m).sum()
}

/// RMS, THD and peak of a waveform in one call.
pub fn extract_features(waveform: &Waveform, fundamental_hz: f64) -> Result<FeatureVector, ProcessingError> {
    let spectrum = compute_fft(&waveform.voltage, waveform.sampling_rate)?;
    extract_features_with_spectrum(waveform, &spectrum, fundamental_hz)
}

/// Same as [`extract_features`] but reusing an already computed spectrum.
pub fn extract_features_with_spectrum(
    waveform: &Waveform,
    spectrum: &Spectrum,
    fundamental_hz: f64,
) -> Result<FeatureVector, ProcessingError> {
    Ok(FeatureVector {
        rms: calculate_rms(&waveform.voltage)?,
        thd: thd_from_spectrum(spectrum, fundamental_hz)?,
        peak: Some(calculate_peak(&waveform.voltage)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{PI, SQRT_2};

    fn sine(freq: f64, amplitude: f64, n: usize, fs: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn spectrum(magnitudes: Vec<f64>) -> Spectrum {
        Spectrum {
            frequencies: (0..magnitudes.len()).map(|k| k as f64).collect(),
            magnitudes,
            sampling_rate: 0.0,
        }
    }

    #[test]
    fn test_rms_of_sine() {
        let rms = calculate_rms(&sine(50.0, 230.0 * SQRT_2, 1000, 1000.0)).expect("rms");
        assert!((rms - 230.0).abs() < 1e-9);
    }

    #[test]
    fn test_rms_and_peak_simple() {
        assert!((calculate_rms(&[3.0, -4.0]).expect("rms") - 12.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(calculate_peak(&[1.0, -7.5, 3.0]).expect("peak"), 7.5);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(calculate_rms(&[]), Err(ProcessingError::InvalidInput(_))));
        assert!(matches!(calculate_peak(&[]), Err(ProcessingError::InvalidInput(_))));
        assert!(calculate_thd(&[], 50.0, 1000.0).is_err());
    }

    #[test]
    fn test_thd_of_pure_sine_is_zero() {
        let thd = calculate_thd(&sine(50.0, 325.0, 1000, 1000.0), 50.0, 1000.0).expect("thd");
        assert!(thd < 1e-9, "thd {thd}");
    }

    #[test]
    fn test_thd_matches_injected_ratio() {
        let fs = 1000.0;
        let signal: Vec<f64> = sine(50.0, 325.0, 1000, fs)
            .iter()
            .zip(sine(150.0, 32.5, 1000, fs))
            .map(|(a, b)| a + b)
            .collect();
        let thd = calculate_thd(&signal, 50.0, fs).expect("thd");
        assert!((thd - 0.1).abs() < 1e-6, "thd {thd}");
    }

    #[test]
    fn test_zero_fundamental_defines_zero_thd() {
        let s = spectrum(vec![0.0, 5.0, 0.0, 3.0]);
        assert_eq!(thd_from_spectrum(&s, 2.0).expect("thd"), 0.0);
    }

    #[test]
    fn test_windows_are_half_open() {
        // Fundamental at bin 20: bins 15..=24 excluded, 25 counted.
        let mut mags = vec![0.0; 40];
        mags[20] = 10.0;
        mags[24] = 100.0; // inside window
        mags[25] = 1.0; // outside window
        mags[15] = 100.0; // inside window
        mags[14] = 1.0; // outside window
        let thd = thd_from_spectrum(&spectrum(mags), 20.0).expect("thd");
        assert!((thd - 2.0_f64.sqrt() / 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_dc_window_excluded() {
        let mut mags = vec![0.0; 40];
        mags[20] = 10.0;
        mags[0] = 50.0;
        mags[4] = 50.0;
        mags[5] = 3.0;
        let thd = thd_from_spectrum(&spectrum(mags), 20.0).expect("thd");
        assert!((thd - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_overlapping_windows_subtract_twice_and_clamp() {
        // Fundamental at bin 2: both windows cover bins 0..5 (fundamental one clipped
        // to 0..7), so the shared energy is removed twice and the residual clamps at 0.
        let mut mags = vec![0.0; 20];
        mags[2] = 10.0;
        mags[10] = 1.0;
        let thd = thd_from_spectrum(&spectrum(mags), 2.0).expect("thd");
        assert_eq!(thd, 0.0);
    }

    #[test]
    fn test_nearest_bin_tie_uses_lower_index() {
        // 20.5 Hz is equidistant from bins 20 and 21; bin 20 wins.
        let mut mags = vec![0.0; 40];
        mags[20] = 4.0;
        mags[21] = 8.0;
        mags[30] = 2.0;
        let thd = thd_from_spectrum(&spectrum(mags), 20.5).expect("thd");
        assert!((thd - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_extract_features() {
        let w = Waveform {
            sampling_rate: 1000.0,
            time: (0..1000).map(|i| i as f64 / 1000.0).collect(),
            voltage: sine(50.0, 230.0 * SQRT_2, 1000, 1000.0),
        };
        let fv = extract_features(&w, 50.0).expect("features");
        assert!((fv.rms - 230.0).abs() < 1e-9);
        assert!(fv.thd < 1e-9);
        assert!((fv.peak.unwrap_or_default() - 230.0 * SQRT_2).abs() < 1e-6);
    }
}
