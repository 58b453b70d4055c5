//! Rule-based diagnosis thresholds

use serde::{Deserialize, Serialize};

use crate::config::defaults;

/// Deterministic limits checked before the anomaly model is consulted.
///
/// Read-only once the pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// RMS below this is a sag (V)
    pub sag_threshold: f64,
    /// RMS above this is a swell (V)
    pub swell_threshold: f64,
    /// THD ratio above this is a harmonic fault
    pub thd_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            sag_threshold: defaults::SAG_THRESHOLD_VOLTS,
            swell_threshold: defaults::SWELL_THRESHOLD_VOLTS,
            thd_threshold: defaults::THD_THRESHOLD_RATIO,
        }
    }
}

impl Thresholds {
    /// ±`band` fraction around a nominal RMS, e.g. `around_nominal(230.0, 0.1, 0.05)`.
    pub fn around_nominal(nominal_rms: f64, band: f64, thd_threshold: f64) -> Self {
        Self {
            sag_threshold: nominal_rms * (1.0 - band),
            swell_threshold: nominal_rms * (1.0 + band),
            thd_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_ten_percent_band() {
        let t = Thresholds::default();
        let derived = Thresholds::around_nominal(230.0, 0.1, 0.05);
        assert!((t.sag_threshold - derived.sag_threshold).abs() < 1e-9);
        assert!((t.swell_threshold - derived.swell_threshold).abs() < 1e-9);
        assert_eq!(t.thd_threshold, derived.thd_threshold);
    }
}
