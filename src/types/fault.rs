//! Fault configuration and extracted feature types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::defaults;

/// Fault to superimpose on a clean waveform.
///
/// Immutable configuration handed to `FaultInjector::apply`. Noise is not a
/// variant: it is applied separately so callers control the ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FaultSpec {
    #[default]
    None,
    /// Scale samples in `[start_ratio, end_ratio)` by `depth` (< 1 expected).
    Sag {
        depth: f64,
        start_ratio: f64,
        end_ratio: f64,
    },
    /// Scale samples in `[start_ratio, end_ratio)` by `magnitude` (> 1 expected).
    Swell {
        magnitude: f64,
        start_ratio: f64,
        end_ratio: f64,
    },
    /// Harmonic order → amplitude ratio relative to the nominal peak.
    Harmonics {
        #[serde(with = "harmonic_orders")]
        orders: BTreeMap<u32, f64>,
    },
}

/// Harmonic orders keyed by decimal strings (`{"3": 0.1}`).
///
/// The tagged enum buffers its fields, after which a JSON object key is only
/// ever a string, so the orders are parsed back by hand.
mod harmonic_orders {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(orders: &BTreeMap<u32, f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(orders.iter().map(|(order, ratio)| (order.to_string(), ratio)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<u32, f64>, D::Error> {
        BTreeMap::<String, f64>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, ratio)| {
                key.trim()
                    .parse::<u32>()
                    .map(|order| (order, ratio))
                    .map_err(|_| D::Error::custom(format!("invalid harmonic order '{key}'")))
            })
            .collect()
    }
}

impl FaultSpec {
    /// Sag with the default window.
    pub fn sag(depth: f64) -> Self {
        Self::Sag {
            depth,
            start_ratio: defaults::FAULT_START_RATIO,
            end_ratio: defaults::FAULT_END_RATIO,
        }
    }

    /// Swell with the default window.
    pub fn swell(magnitude: f64) -> Self {
        Self::Swell {
            magnitude,
            start_ratio: defaults::FAULT_START_RATIO,
            end_ratio: defaults::FAULT_END_RATIO,
        }
    }

    pub fn harmonics<I: IntoIterator<Item = (u32, f64)>>(orders: I) -> Self {
        Self::Harmonics {
            orders: orders.into_iter().collect(),
        }
    }

    /// Default 3rd/5th/7th harmonic mix.
    pub fn default_harmonics() -> Self {
        Self::harmonics(defaults::HARMONIC_MIX)
    }

    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sag { .. } => "sag",
            Self::Swell { .. } => "swell",
            Self::Harmonics { .. } => "harmonics",
        }
    }
}

/// Power-quality features extracted from one waveform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// RMS voltage (V)
    pub rms: f64,
    /// Total harmonic distortion, dimensionless ratio (0 when the fundamental is absent)
    pub thd: f64,
    /// Peak absolute voltage (V)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<f64>,
}

impl FeatureVector {
    /// Number of values fed to the anomaly model.
    pub const MODEL_ARITY: usize = 2;

    /// `[rms, thd]`, the tuple scored by the anomaly model.
    pub fn model_input(&self) -> Vec<f64> {
        vec![self.rms, self.thd]
    }

    /// THD as a percentage, for display.
    pub fn thd_percent(&self) -> f64 {
        self.thd * 100.0
    }
}
