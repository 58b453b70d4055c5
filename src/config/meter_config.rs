//! Meter Configuration - signal, threshold and model settings as TOML values
//!
//! Each section implements `Default` with the values from [`super::defaults`],
//! so a missing or empty config file gives the reference behaviour.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::anomaly::ModelAlgorithm;
use crate::types::Thresholds;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "GRIDWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "meter_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a meter deployment.
///
/// Load with `MeterConfig::load()` which searches:
/// 1. `$GRIDWATCH_CONFIG`
/// 2. `./meter_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Sampling and nominal grid parameters
    #[serde(default)]
    pub signal: SignalConfig,

    /// Rule-based diagnosis limits
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Anomaly model training and persistence
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Live-mode loop settings
    #[serde(default)]
    pub live: LiveConfig,
}

impl MeterConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that fails to parse or validate is skipped with a warning.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded meter config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        // 2. Check ./meter_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded meter config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(parent.to_path_buf(), e))?;
        }
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Meter config saved");
        Ok(())
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Signal parameters must be finite and > 0
    /// - sag threshold < swell threshold, THD threshold >= 0
    /// - contamination in (0, 0.5], estimators and sample counts > 0
    /// - live jitter bounds ordered and non-negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let s = &self.signal;
        Self::check_positive(s.sampling_rate_hz, "signal.sampling_rate_hz", &mut errors);
        Self::check_positive(s.duration_secs, "signal.duration_secs", &mut errors);
        Self::check_positive(s.fundamental_hz, "signal.fundamental_hz", &mut errors);
        Self::check_positive(s.nominal_rms_volts, "signal.nominal_rms_volts", &mut errors);
        if s.sample_count() == 0 {
            errors.push(format!(
                "signal: sampling_rate_hz × duration_secs ({:.3}) yields no samples",
                s.sampling_rate_hz * s.duration_secs
            ));
        }

        let t = &self.thresholds;
        if !t.sag_threshold.is_finite() || !t.swell_threshold.is_finite() || !t.thd_threshold.is_finite() {
            errors.push("thresholds: values must be finite".to_string());
        } else {
            if t.sag_threshold >= t.swell_threshold {
                errors.push(format!(
                    "thresholds.sag_threshold ({:.1}) must be less than swell_threshold ({:.1})",
                    t.sag_threshold, t.swell_threshold
                ));
            }
            if t.thd_threshold < 0.0 {
                errors.push(format!(
                    "thresholds.thd_threshold ({:.3}) cannot be negative",
                    t.thd_threshold
                ));
            }
        }

        let a = &self.anomaly;
        if !(a.contamination > 0.0 && a.contamination <= 0.5) {
            errors.push(format!(
                "anomaly.contamination ({}) must be in (0, 0.5]",
                a.contamination
            ));
        }
        if a.n_estimators == 0 {
            errors.push("anomaly.n_estimators must be > 0".to_string());
        }
        if a.max_samples == 0 {
            errors.push("anomaly.max_samples must be > 0".to_string());
        }
        if a.training_samples < 2 {
            errors.push("anomaly.training_samples must be >= 2".to_string());
        }
        if !(a.training_noise_level >= 0.0 && a.training_noise_level.is_finite()) {
            errors.push("anomaly.training_noise_level must be a finite value >= 0".to_string());
        }

        let l = &self.live;
        if l.interval_ms == 0 {
            errors.push("live.interval_ms must be > 0".to_string());
        }
        if !(l.noise_jitter_min >= 0.0 && l.noise_jitter_min <= l.noise_jitter_max && l.noise_jitter_max.is_finite()) {
            errors.push(format!(
                "live: noise_jitter_min ({}) must be >= 0 and not above noise_jitter_max ({})",
                l.noise_jitter_min, l.noise_jitter_max
            ));
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        // NaN comparisons silently pass; catch them explicitly
        if !value.is_finite() || value <= 0.0 {
            errors.push(format!("{name} must be a finite value > 0 (got {value})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Signal
// ============================================================================

/// Sampling and nominal grid parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// ADC sampling rate (Hz)
    pub sampling_rate_hz: f64,
    /// Analysis window length (s)
    pub duration_secs: f64,
    /// Nominal fundamental frequency (Hz)
    pub fundamental_hz: f64,
    /// Nominal RMS voltage (V)
    pub nominal_rms_volts: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: defaults::SAMPLING_RATE_HZ,
            duration_secs: defaults::DURATION_SECS,
            fundamental_hz: defaults::FUNDAMENTAL_HZ,
            nominal_rms_volts: defaults::NOMINAL_RMS_VOLTS,
        }
    }
}

impl SignalConfig {
    /// Peak of a sinusoid whose RMS is the nominal voltage.
    pub fn nominal_peak(&self) -> f64 {
        self.nominal_rms_volts * std::f64::consts::SQRT_2
    }

    /// Samples per analysis window, `floor(rate × duration)`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_count(&self) -> usize {
        let n = (self.sampling_rate_hz * self.duration_secs).floor();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }
}

// ============================================================================
// Anomaly Model
// ============================================================================

/// Anomaly model training and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Estimator backing the detector
    pub algorithm: ModelAlgorithm,
    /// Location of the persisted model artifact; defaults to
    /// `data/models/<algorithm>.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    /// Expected outlier share used to calibrate the decision threshold
    pub contamination: f64,
    /// Seed for tree construction
    pub seed: u64,
    /// Number of isolation trees
    pub n_estimators: usize,
    /// Upper bound on per-tree subsample size
    pub max_samples: usize,
    /// Waveforms generated for the "train now" trigger
    pub training_samples: usize,
    /// Noise level of those waveforms
    pub training_noise_level: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            algorithm: ModelAlgorithm::default(),
            model_path: None,
            contamination: defaults::CONTAMINATION,
            seed: defaults::MODEL_SEED,
            n_estimators: defaults::N_ESTIMATORS,
            max_samples: defaults::MAX_SAMPLES,
            training_samples: defaults::TRAINING_SAMPLES,
            training_noise_level: defaults::TRAINING_NOISE_LEVEL,
        }
    }
}

impl AnomalyConfig {
    /// Resolved artifact location.
    pub fn artifact_path(&self) -> PathBuf {
        self.model_path.clone().unwrap_or_else(|| {
            Path::new(defaults::MODEL_DIR).join(format!("{}.json", self.algorithm.name()))
        })
    }
}

// ============================================================================
// Live Mode
// ============================================================================

/// Live-mode loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Interval between cycles (ms)
    pub interval_ms: u64,
    /// Lower bound of the per-cycle noise multiplier
    pub noise_jitter_min: f64,
    /// Upper bound of the per-cycle noise multiplier
    pub noise_jitter_max: f64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::LIVE_INTERVAL_MS,
            noise_jitter_min: defaults::LIVE_NOISE_JITTER_MIN,
            noise_jitter_max: defaults::LIVE_NOISE_JITTER_MAX,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
