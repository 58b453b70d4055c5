//! Fault injection - sag, swell, harmonic distortion and additive noise
//!
//! Every transform borrows its input and returns a new `Waveform`.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use std::f64::consts::{PI, SQRT_2};

use super::{require_finite, require_positive, SimulationError};
use crate::config::SignalConfig;
use crate::types::{FaultSpec, Waveform};

/// Applies power-quality faults relative to the nominal grid.
///
/// Harmonic frequencies are multiples of the nominal fundamental and all
/// amplitudes are fractions of the nominal peak, independent of the
/// waveform being modified.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    fundamental_hz: f64,
    nominal_peak: f64,
}

impl FaultInjector {
    pub fn new(fundamental_hz: f64, nominal_rms: f64) -> Result<Self, SimulationError> {
        Ok(Self {
            fundamental_hz: require_positive("fundamental_hz", fundamental_hz)?,
            nominal_peak: require_positive("nominal_rms", nominal_rms)? * SQRT_2,
        })
    }

    pub fn from_config(signal: &SignalConfig) -> Result<Self, SimulationError> {
        Self::new(signal.fundamental_hz, signal.nominal_rms_volts)
    }

    pub fn nominal_peak(&self) -> f64 {
        self.nominal_peak
    }

    /// Apply the fault described by `spec`. `FaultSpec::None` returns a copy.
    pub fn apply(&self, waveform: &Waveform, spec: &FaultSpec) -> Result<Waveform, SimulationError> {
        match spec {
            FaultSpec::None => Ok(waveform.clone()),
            FaultSpec::Sag { depth, start_ratio, end_ratio } => {
                self.sag(waveform, *depth, *start_ratio, *end_ratio)
            }
            FaultSpec::Swell { magnitude, start_ratio, end_ratio } => {
                self.swell(waveform, *magnitude, *start_ratio, *end_ratio)
            }
            FaultSpec::Harmonics { orders } => self.harmonics(waveform, orders),
        }
    }

    /// Voltage dip: scale samples in `[floor(N·start), floor(N·end))` by `depth`.
    ///
    /// `depth` is the remaining fraction (0.5 = 50% drop); any value is accepted.
    pub fn sag(
        &self,
        waveform: &Waveform,
        depth: f64,
        start_ratio: f64,
        end_ratio: f64,
    ) -> Result<Waveform, SimulationError> {
        scale_window(waveform, depth, start_ratio, end_ratio)
    }

    /// Voltage rise: scale samples in the window by `magnitude` (1.5 = 150%).
    pub fn swell(
        &self,
        waveform: &Waveform,
        magnitude: f64,
        start_ratio: f64,
        end_ratio: f64,
    ) -> Result<Waveform, SimulationError> {
        scale_window(waveform, magnitude, start_ratio, end_ratio)
    }

    /// Superimpose `ratio · nominal_peak · sin(2π · order · f0 · t)` for each entry.
    ///
    /// `{3: 0.1, 5: 0.05}` adds a 10% 3rd and a 5% 5th harmonic.
    pub fn harmonics(
        &self,
        waveform: &Waveform,
        orders: &BTreeMap<u32, f64>,
    ) -> Result<Waveform, SimulationError> {
        for (&order, &ratio) in orders {
            if order == 0 {
                return Err(SimulationError::InvalidParameter {
                    name: "harmonic_order",
                    value: 0.0,
                    reason: "harmonic order must be >= 1",
                });
            }
            require_finite("harmonic_ratio", ratio)?;
        }

        let mut voltage = waveform.voltage.clone();
        for (&order, &ratio) in orders {
            let omega = 2.0 * PI * f64::from(order) * self.fundamental_hz;
            let amplitude = self.nominal_peak * ratio;
            for (v, &t) in voltage.iter_mut().zip(waveform.time.iter()) {
                *v += amplitude * (omega * t).sin();
            }
            tracing::trace!(order, ratio, freq = f64::from(order) * self.fundamental_hz, "Injected harmonic");
        }

        Ok(waveform.with_voltage(voltage))
    }

    /// Add zero-mean Gaussian noise with σ = `noise_level · nominal_peak`,
    /// drawn independently per sample.
    pub fn noise<R: Rng + ?Sized>(
        &self,
        waveform: &Waveform,
        noise_level: f64,
        rng: &mut R,
    ) -> Result<Waveform, SimulationError> {
        if !(noise_level.is_finite() && noise_level >= 0.0) {
            return Err(SimulationError::InvalidParameter {
                name: "noise_level",
                value: noise_level,
                reason: "must be a finite value >= 0",
            });
        }

        let std_dev = self.nominal_peak * noise_level;
        let dist = Normal::new(0.0, std_dev).map_err(|_| SimulationError::InvalidParameter {
            name: "noise_level",
            value: noise_level,
            reason: "does not yield a valid standard deviation",
        })?;

        let voltage = waveform
            .voltage
            .iter()
            .map(|&v| v + dist.sample(rng))
            .collect();
        Ok(waveform.with_voltage(voltage))
    }
}

/// Resolve `[floor(N·start), floor(N·end))`, requiring `0 <= start <= end <= 1`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn window_indices(n: usize, start_ratio: f64, end_ratio: f64) -> Result<(usize, usize), SimulationError> {
    for (name, value) in [("start_ratio", start_ratio), ("end_ratio", end_ratio)] {
        if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
            return Err(SimulationError::InvalidParameter {
                name,
                value,
                reason: "must be within [0, 1]",
            });
        }
    }
    if start_ratio > end_ratio {
        return Err(SimulationError::InvalidParameter {
            name: "end_ratio",
            value: end_ratio,
            reason: "must not precede start_ratio",
        });
    }

    let start = ((n as f64 * start_ratio).floor() as usize).min(n);
    let end = ((n as f64 * end_ratio).floor() as usize).min(n);
    Ok((start, end))
}

fn scale_window(
    waveform: &Waveform,
    factor: f64,
    start_ratio: f64,
    end_ratio: f64,
) -> Result<Waveform, SimulationError> {
    let (start, end) = window_indices(waveform.len(), start_ratio, end_ratio)?;
    let mut voltage = waveform.voltage.clone();
    for v in &mut voltage[start..end] {
        *v *= factor;
    }
    Ok(waveform.with_voltage(voltage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::generate_sine_wave;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn injector() -> FaultInjector {
        FaultInjector::new(50.0, 230.0).expect("injector")
    }

    fn ramp(n: usize) -> Waveform {
        Waveform {
            sampling_rate: 1000.0,
            time: (0..n).map(|i| i as f64 / 1000.0).collect(),
            voltage: vec![1.0; n],
        }
    }

    #[test]
    fn test_sag_window_bounds() {
        let w = ramp(10);
        let out = injector().sag(&w, 0.5, 0.3, 0.7).expect("sag");
        assert_eq!(out.voltage, vec![1.0, 1.0, 1.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0]);
        // Input untouched
        assert!(w.voltage.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_swell_full_range() {
        let w = ramp(8);
        let out = injector().swell(&w, 1.5, 0.0, 1.0).expect("swell");
        assert!(out.voltage.iter().all(|&v| (v - 1.5).abs() < 1e-12));
    }

    #[test]
    fn test_scale_accepts_any_factor() {
        let w = ramp(4);
        let out = injector().sag(&w, -2.0, 0.0, 0.5).expect("sag");
        assert_eq!(out.voltage, vec![-2.0, -2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_empty_window_is_noop() {
        let w = ramp(10);
        let out = injector().sag(&w, 0.1, 0.55, 0.55).expect("sag");
        assert_eq!(out, w);
    }

    #[test]
    fn test_bad_window_rejected() {
        let w = ramp(10);
        let inj = injector();
        assert!(inj.sag(&w, 0.5, -0.1, 0.5).is_err());
        assert!(inj.sag(&w, 0.5, 0.2, 1.1).is_err());
        assert!(inj.swell(&w, 1.5, 0.8, 0.2).is_err());
        assert!(inj.swell(&w, 1.5, f64::NAN, 0.2).is_err());
    }

    #[test]
    fn test_harmonics_accumulate() {
        let inj = injector();
        let clean = generate_sine_wave(50.0, 1000.0, 1.0, inj.nominal_peak()).expect("generate");
        let orders: BTreeMap<u32, f64> = [(3, 0.1), (5, 0.05)].into_iter().collect();
        let out = inj.harmonics(&clean, &orders).expect("harmonics");

        let t = clean.time[7];
        let expected = clean.voltage[7]
            + inj.nominal_peak() * 0.1 * (2.0 * PI * 150.0 * t).sin()
            + inj.nominal_peak() * 0.05 * (2.0 * PI * 250.0 * t).sin();
        assert!((out.voltage[7] - expected).abs() < 1e-9);
        assert_eq!(out.time, clean.time);
    }

    #[test]
    fn test_harmonic_order_zero_rejected() {
        let orders: BTreeMap<u32, f64> = [(0, 0.1)].into_iter().collect();
        assert!(injector().harmonics(&ramp(4), &orders).is_err());
    }

    #[test]
    fn test_noise_statistics() {
        let inj = injector();
        let w = Waveform {
            voltage: vec![0.0; 20_000],
            ..ramp(20_000)
        };
        let mut rng = StdRng::seed_from_u64(7);
        let out = inj.noise(&w, 0.01, &mut rng).expect("noise");

        let n = out.len() as f64;
        let mean = out.voltage.iter().sum::<f64>() / n;
        let std = (out.voltage.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let expected_std = inj.nominal_peak() * 0.01;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((std - expected_std).abs() / expected_std < 0.05, "std {std}");
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let w = ramp(16);
        let mut rng = StdRng::seed_from_u64(1);
        let out = injector().noise(&w, 0.0, &mut rng).expect("noise");
        assert_eq!(out.voltage, w.voltage);
    }

    #[test]
    fn test_negative_noise_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(injector().noise(&ramp(4), -0.01, &mut rng).is_err());
    }

    #[test]
    fn test_apply_dispatch() {
        let inj = injector();
        let w = ramp(10);
        assert_eq!(inj.apply(&w, &FaultSpec::None).expect("none"), w);
        let swelled = inj.apply(&w, &FaultSpec::swell(2.0)).expect("swell");
        assert_eq!(swelled.voltage[5], 2.0);
        assert_eq!(swelled.voltage[0], 1.0);
    }
}
