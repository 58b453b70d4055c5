//! Per-feature z-score envelope
//!
//! Learns mean and standard deviation of each feature; a tuple's normality
//! score is the negated largest |z| across features. Cheap, deterministic,
//! and a useful baseline against the isolation forest.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use super::{contamination_offset, validate_params, validate_samples, AnomalyError, FitParams, OutlierModel};

/// Minimum standard deviation, relative to |mean| with the same absolute floor.
pub const MIN_STD_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZScoreEnvelope {
    means: Vec<f64>,
    std_devs: Vec<f64>,
    offset: f64,
}

impl ZScoreEnvelope {
    /// Std dev used for feature `i`, floored to avoid divide-by-zero.
    fn effective_std(&self, i: usize) -> f64 {
        let floor = (self.means[i].abs() * MIN_STD_FLOOR).max(MIN_STD_FLOOR);
        self.std_devs[i].max(floor)
    }

    /// Largest absolute z-score of `sample` across features.
    pub fn max_abs_z(&self, sample: &[f64]) -> f64 {
        sample
            .iter()
            .enumerate()
            .map(|(i, v)| ((v - self.means[i]) / self.effective_std(i)).abs())
            .fold(0.0, f64::max)
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }
}

impl OutlierModel for ZScoreEnvelope {
    const ALGORITHM: &'static str = "zscore";

    fn fit(samples: &[Vec<f64>], params: &FitParams) -> Result<Self, AnomalyError> {
        validate_params(params)?;
        let n_features = validate_samples(samples)?;

        let (means, std_devs): (Vec<f64>, Vec<f64>) = (0..n_features)
            .map(|i| {
                let column: Vec<f64> = samples.iter().map(|s| s[i]).collect();
                (column.iter().mean(), column.iter().std_dev())
            })
            .unzip();

        let mut model = Self {
            means,
            std_devs,
            offset: 0.0,
        };
        let scores = samples.iter().map(|s| model.score_samples(s)).collect();
        model.offset = contamination_offset(scores, params.contamination);

        debug!(n_samples = samples.len(), offset = model.offset, "Z-score envelope fitted");
        Ok(model)
    }

    fn n_features(&self) -> usize {
        self.means.len()
    }

    /// `-max|z|`. NaN for a tuple of the wrong arity.
    fn score_samples(&self, sample: &[f64]) -> f64 {
        if sample.len() != self.means.len() {
            return f64::NAN;
        }
        -self.max_abs_z(sample)
    }

    fn offset(&self) -> f64 {
        self.offset
    }

    fn validate(&self) -> Result<(), AnomalyError> {
        if self.means.is_empty() || self.means.len() != self.std_devs.len() {
            return Err(AnomalyError::CorruptModel(format!(
                "{} means and {} std devs",
                self.means.len(),
                self.std_devs.len()
            )));
        }
        let finite = self.means.iter().chain(&self.std_devs).all(|v| v.is_finite());
        if !finite || self.std_devs.iter().any(|&s| s < 0.0) || !self.offset.is_finite() {
            return Err(AnomalyError::CorruptModel(
                "moments must be finite with std devs >= 0".to_string(),
            ));
        }
        Ok(())
    }
}
