//! Per-cycle input and output records exchanged with the presentation layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FaultSpec;
use crate::config::defaults;

/// Operator input for one analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRequest {
    /// Generator frequency (Hz)
    pub frequency_hz: f64,
    /// Additive noise level as a fraction of the nominal peak
    pub noise_level: f64,
    /// Fault to inject before noise
    #[serde(default)]
    pub fault: FaultSpec,
}

impl Default for CycleRequest {
    fn default() -> Self {
        Self {
            frequency_hz: defaults::FUNDAMENTAL_HZ,
            noise_level: defaults::NOISE_LEVEL,
            fault: FaultSpec::None,
        }
    }
}

/// Everything a dashboard needs to render one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    /// Fault label that produced this cycle
    pub fault: String,
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
    /// RMS voltage (V)
    pub rms: f64,
    /// THD ratio (multiply by 100 for percent)
    pub thd: f64,
    /// Peak absolute voltage (V)
    pub peak: f64,
    /// Final status line, e.g. "Normal Operation"
    pub status: String,
    /// Individual issue messages in the order they were raised
    pub issues: Vec<String>,
}

impl CycleReport {
    pub fn is_normal(&self) -> bool {
        self.issues.is_empty()
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "fault={} rms={:.2} V thd={:.2}% peak={:.1} V -> {}",
            self.fault,
            self.rms,
            self.thd * 100.0,
            self.peak,
            self.status
        )
    }
}
