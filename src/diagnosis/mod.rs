//! Two-stage diagnosis: deterministic threshold rules, then the anomaly model
//!
//! Rule order is fixed: sag-or-swell, then harmonic, then the model's verdict.
//! Sag and swell are mutually exclusive; swell is only checked when sag is not.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::anomaly::AnomalyClassifier;
use crate::types::Thresholds;

/// Status returned when no rule fires and the model agrees.
pub const NORMAL_STATUS: &str = "Normal Operation";

/// Joins issue messages in a multi-issue status.
pub const ISSUE_SEPARATOR: &str = " | ";

/// A single power-quality issue raised for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Issue {
    Sag,
    Swell,
    Harmonic,
    UnknownAnomaly,
}

impl Issue {
    pub fn message(self) -> &'static str {
        match self {
            Issue::Sag => "WARNING: Voltage Sag Detected",
            Issue::Swell => "WARNING: Voltage Swell Detected",
            Issue::Harmonic => "WARNING: Harmonic Fault Detected",
            Issue::UnknownAnomaly => "WARNING: Unknown Anomaly Detected (AI)",
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Ordered issues for one cycle. Displays as the final status line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub issues: Vec<Issue>,
}

impl Diagnosis {
    pub fn is_normal(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn contains(&self, issue: Issue) -> bool {
        self.issues.contains(&issue)
    }

    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message().to_string()).collect()
    }

    /// `"Normal Operation"`, or the issue messages joined with `" | "`.
    pub fn status(&self) -> String {
        if self.issues.is_empty() {
            NORMAL_STATUS.to_string()
        } else {
            self.issues
                .iter()
                .map(|i| i.message())
                .collect::<Vec<_>>()
                .join(ISSUE_SEPARATOR)
        }
    }
}

impl std::fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.status())
    }
}

/// Deterministic stage only.
pub fn rule_issues(thresholds: &Thresholds, rms: f64, thd: f64) -> Vec<Issue> {
    let mut issues = Vec::with_capacity(3);
    if rms < thresholds.sag_threshold {
        issues.push(Issue::Sag);
    } else if rms > thresholds.swell_threshold {
        issues.push(Issue::Swell);
    }
    if thd > thresholds.thd_threshold {
        issues.push(Issue::Harmonic);
    }
    issues
}

/// Combines threshold rules with an anomaly classifier.
#[derive(Clone)]
pub struct Diagnoser {
    thresholds: Thresholds,
    classifier: Arc<dyn AnomalyClassifier>,
}

impl std::fmt::Debug for Diagnoser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnoser")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl Diagnoser {
    pub fn new(thresholds: Thresholds, classifier: Arc<dyn AnomalyClassifier>) -> Self {
        Self {
            thresholds,
            classifier,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn classifier(&self) -> &Arc<dyn AnomalyClassifier> {
        &self.classifier
    }

    /// Diagnose one cycle from its RMS (V) and THD (ratio).
    pub fn diagnose(&self, rms: f64, thd: f64) -> Diagnosis {
        let mut issues = rule_issues(&self.thresholds, rms, thd);
        let prediction = self.classifier.predict(&[rms, thd]);
        if prediction.is_anomalous() {
            issues.push(Issue::UnknownAnomaly);
        }
        let diagnosis = Diagnosis { issues };
        debug!(rms, thd, %prediction, status = %diagnosis, "Cycle diagnosed");
        diagnosis
    }
}
