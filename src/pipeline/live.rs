//! Live mode: repeat independent cycles on a fixed interval until cancelled

use rand::Rng;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{MeterPipeline, PipelineError};
use crate::types::{CycleReport, CycleRequest};

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub cycles_run: u64,
    pub abnormal_cycles: u64,
}

/// Drives `MeterPipeline::run_cycle` from a tokio interval.
///
/// Each tick scales the base noise level by a factor drawn uniformly from
/// `[noise_jitter_min, noise_jitter_max)` so consecutive cycles differ.
pub struct LiveLoop<'a> {
    pipeline: &'a MeterPipeline,
    base: CycleRequest,
    interval: Duration,
    max_cycles: Option<u64>,
    cancel_token: CancellationToken,
}

impl<'a> LiveLoop<'a> {
    pub fn new(pipeline: &'a MeterPipeline, base: CycleRequest, cancel_token: CancellationToken) -> Self {
        Self {
            interval: Duration::from_millis(pipeline.live_config().interval_ms),
            pipeline,
            base,
            max_cycles: None,
            cancel_token,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop after `n` cycles; `None` runs until cancelled.
    pub fn with_max_cycles(mut self, n: Option<u64>) -> Self {
        self.max_cycles = n;
        self
    }

    /// The base request with jittered noise.
    pub fn jittered_request<R: Rng + ?Sized>(&self, rng: &mut R) -> CycleRequest {
        let live = self.pipeline.live_config();
        let factor = if live.noise_jitter_min < live.noise_jitter_max {
            rng.gen_range(live.noise_jitter_min..live.noise_jitter_max)
        } else {
            live.noise_jitter_min
        };
        CycleRequest {
            noise_level: self.base.noise_level * factor,
            ..self.base.clone()
        }
    }

    /// Run until cancellation or `max_cycles`, handing every report to `on_report`.
    ///
    /// A cycle error stops the loop and is returned.
    pub async fn run<R, F>(self, rng: &mut R, mut on_report: F) -> Result<LiveStats, PipelineError>
    where
        R: Rng + ?Sized,
        F: FnMut(&CycleReport),
    {
        let mut stats = LiveStats::default();
        if self.max_cycles == Some(0) {
            return Ok(stats);
        }

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            fault = self.base.fault.label(),
            "Live mode started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!(cycles = stats.cycles_run, "Live mode received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    let request = self.jittered_request(rng);
                    let report = self.pipeline.run_cycle(&request, rng)?;
                    stats.cycles_run += 1;
                    if !report.is_normal() {
                        stats.abnormal_cycles += 1;
                    }
                    debug!(cycle = stats.cycles_run, status = %report.status, "Live cycle");
                    on_report(&report);

                    if self.max_cycles.is_some_and(|max| stats.cycles_run >= max) {
                        break;
                    }
                }
            }
        }

        info!(
            cycles = stats.cycles_run,
            abnormal = stats.abnormal_cycles,
            "Live mode stopped"
        );
        Ok(stats)
    }
}
