//! System-wide default constants.
//!
//! Every `MeterConfig` default is sourced from here so the TOML layer,
//! the CLI and the tests agree on the same numbers.

// ============================================================================
// Signal
// ============================================================================

/// Sampling rate of the simulated ADC (Hz).
pub const SAMPLING_RATE_HZ: f64 = 1_000.0;

/// Length of one analysis window (seconds).
pub const DURATION_SECS: f64 = 1.0;

/// Nominal grid frequency (Hz).
pub const FUNDAMENTAL_HZ: f64 = 50.0;

/// Nominal RMS voltage (V).
pub const NOMINAL_RMS_VOLTS: f64 = 230.0;

// ============================================================================
// Diagnosis Thresholds
// ============================================================================

/// RMS below this is a sag (V). 0.9 × nominal.
pub const SAG_THRESHOLD_VOLTS: f64 = 207.0;

/// RMS above this is a swell (V). 1.1 × nominal.
pub const SWELL_THRESHOLD_VOLTS: f64 = 253.0;

/// THD ratio above this is a harmonic fault (5%).
pub const THD_THRESHOLD_RATIO: f64 = 0.05;

// ============================================================================
// Spectral Analysis
// ============================================================================

/// Half-width (bins) of the exclusion windows around DC and the fundamental.
pub const THD_EXCLUSION_BINS: usize = 5;

// ============================================================================
// Anomaly Model
// ============================================================================

/// Directory holding persisted model artifacts, one `<algorithm>.json` each.
pub const MODEL_DIR: &str = "data/models";

/// Expected share of outliers in the training set.
pub const CONTAMINATION: f64 = 0.1;

/// Seed for tree construction.
pub const MODEL_SEED: u64 = 42;

/// Number of isolation trees.
pub const N_ESTIMATORS: usize = 100;

/// Upper bound on the per-tree subsample size.
pub const MAX_SAMPLES: usize = 256;

/// Waveforms generated by the "train now" trigger.
pub const TRAINING_SAMPLES: usize = 100;

/// Noise level applied to training waveforms (fraction of nominal peak).
pub const TRAINING_NOISE_LEVEL: f64 = 0.01;

// ============================================================================
// Fault Injection (reference UI defaults)
// ============================================================================

/// Remaining voltage fraction during a sag.
pub const SAG_DEPTH: f64 = 0.5;

/// Voltage multiplier during a swell.
pub const SWELL_MAGNITUDE: f64 = 1.5;

/// Fault window start as a fraction of the waveform.
pub const FAULT_START_RATIO: f64 = 0.3;

/// Fault window end as a fraction of the waveform.
pub const FAULT_END_RATIO: f64 = 0.7;

/// Harmonic mix injected when no explicit orders are given: (order, ratio).
pub const HARMONIC_MIX: [(u32, f64); 3] = [(3, 0.1), (5, 0.05), (7, 0.02)];

/// Default additive noise level.
pub const NOISE_LEVEL: f64 = 0.01;

// ============================================================================
// Live Mode
// ============================================================================

/// Interval between live cycles (ms).
pub const LIVE_INTERVAL_MS: u64 = 500;

/// Lower bound of the per-cycle noise jitter multiplier.
pub const LIVE_NOISE_JITTER_MIN: f64 = 0.8;

/// Upper bound of the per-cycle noise jitter multiplier.
pub const LIVE_NOISE_JITTER_MAX: f64 = 1.2;
