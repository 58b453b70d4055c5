//! GridWatch - Edge Power-Quality Meter
//!
//! Simulates a mains waveform, injects faults, and prints the meter's
//! diagnosis for each analysis cycle.
//!
//! # Usage
//!
//! ```bash
//! # One clean cycle
//! gridwatch analyze
//!
//! # 50% sag with the full report as JSON
//! gridwatch analyze --fault sag --depth 0.5 --json
//!
//! # Custom harmonic mix
//! gridwatch analyze --fault harmonics --harmonic 3=0.12 --harmonic 5=0.04
//!
//! # Train the anomaly model on nominal cycles, then stream live cycles
//! gridwatch train
//! gridwatch live --fault swell --cycles 20
//! ```
//!
//! # Environment Variables
//!
//! - `GRIDWATCH_CONFIG`: Path to a meter config TOML (default: `./meter_config.toml`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gridwatch::config::{self, defaults, MeterConfig};
use gridwatch::pipeline::{LiveLoop, MeterPipeline};
use gridwatch::types::{CycleReport, CycleRequest, FaultSpec};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "gridwatch")]
#[command(about = "GridWatch edge power-quality meter")]
#[command(version)]
struct CliArgs {
    /// Meter config TOML; takes precedence over GRIDWATCH_CONFIG and ./meter_config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Run one analysis cycle and print the diagnosis
    Analyze {
        #[command(flatten)]
        cycle: CycleArgs,

        /// Print the full cycle report (waveform, spectrum, features) as JSON
        #[arg(long)]
        json: bool,
    },
    /// Train the anomaly model on nominal cycles and persist it
    Train {
        /// Number of nominal waveforms (default: anomaly.training_samples)
        #[arg(long)]
        samples: Option<usize>,

        /// Seed for the training noise
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Repeat analysis cycles on a fixed interval until Ctrl+C
    Live {
        #[command(flatten)]
        cycle: CycleArgs,

        /// Interval between cycles (default: live.interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Show the anomaly model status
    Status,
    /// Print the effective configuration as TOML
    Config {
        /// Also write it to this path
        #[arg(long, value_name = "PATH")]
        write: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FaultKind {
    None,
    Sag,
    Swell,
    Harmonics,
}

/// Per-cycle operator input.
#[derive(Args, Debug, Clone)]
struct CycleArgs {
    /// Generator frequency (Hz)
    #[arg(long, default_value_t = defaults::FUNDAMENTAL_HZ)]
    frequency: f64,

    /// Noise level as a fraction of the nominal peak
    #[arg(long, default_value_t = defaults::NOISE_LEVEL)]
    noise: f64,

    /// Fault to inject
    #[arg(long, value_enum, default_value_t = FaultKind::None)]
    fault: FaultKind,

    /// Sag depth: remaining fraction of the voltage
    #[arg(long, default_value_t = defaults::SAG_DEPTH)]
    depth: f64,

    /// Swell magnitude: multiple of the voltage
    #[arg(long, default_value_t = defaults::SWELL_MAGNITUDE)]
    magnitude: f64,

    /// Fault window start as a fraction of the waveform
    #[arg(long, default_value_t = defaults::FAULT_START_RATIO)]
    start: f64,

    /// Fault window end as a fraction of the waveform
    #[arg(long, default_value_t = defaults::FAULT_END_RATIO)]
    end: f64,

    /// Harmonic as ORDER=RATIO, repeatable (default: 3=0.1 5=0.05 7=0.02)
    #[arg(long = "harmonic", value_name = "ORDER=RATIO", value_parser = parse_harmonic)]
    harmonics: Vec<(u32, f64)>,

    /// Seed for the noise generator (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
}

impl Default for CycleArgs {
    fn default() -> Self {
        Self {
            frequency: defaults::FUNDAMENTAL_HZ,
            noise: defaults::NOISE_LEVEL,
            fault: FaultKind::None,
            depth: defaults::SAG_DEPTH,
            magnitude: defaults::SWELL_MAGNITUDE,
            start: defaults::FAULT_START_RATIO,
            end: defaults::FAULT_END_RATIO,
            harmonics: Vec::new(),
            seed: None,
        }
    }
}

impl CycleArgs {
    fn fault_spec(&self) -> FaultSpec {
        match self.fault {
            FaultKind::None => FaultSpec::None,
            FaultKind::Sag => FaultSpec::Sag {
                depth: self.depth,
                start_ratio: self.start,
                end_ratio: self.end,
            },
            FaultKind::Swell => FaultSpec::Swell {
                magnitude: self.magnitude,
                start_ratio: self.start,
                end_ratio: self.end,
            },
            FaultKind::Harmonics if self.harmonics.is_empty() => FaultSpec::default_harmonics(),
            FaultKind::Harmonics => FaultSpec::Harmonics {
                orders: self.harmonics.iter().copied().collect::<BTreeMap<_, _>>(),
            },
        }
    }

    fn request(&self) -> CycleRequest {
        CycleRequest {
            frequency_hz: self.frequency,
            noise_level: self.noise,
            fault: self.fault_spec(),
        }
    }

    fn rng(&self) -> StdRng {
        seeded_rng(self.seed)
    }
}

fn parse_harmonic(s: &str) -> Result<(u32, f64), String> {
    let (order, ratio) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ORDER=RATIO, got '{s}'"))?;
    let order: u32 = order
        .trim()
        .parse()
        .map_err(|e| format!("invalid harmonic order '{order}': {e}"))?;
    let ratio: f64 = ratio
        .trim()
        .parse()
        .map_err(|e| format!("invalid harmonic ratio '{ratio}': {e}"))?;
    Ok((order, ratio))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<MeterConfig> {
    match path {
        Some(p) => MeterConfig::load_from_file(p)
            .with_context(|| format!("Failed to load meter config from {}", p.display())),
        None => Ok(MeterConfig::load()),
    }
}

fn print_report(report: &CycleReport) {
    println!("{}", report.summary());
    for issue in &report.issues {
        println!("  - {issue}");
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_analyze(pipeline: &MeterPipeline, cycle: &CycleArgs, json: bool) -> Result<()> {
    let mut rng = cycle.rng();
    let report = pipeline
        .run_cycle(&cycle.request(), &mut rng)
        .context("Analysis cycle failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_train(pipeline: &MeterPipeline, samples: Option<usize>, seed: Option<u64>) -> Result<()> {
    let mut rng = seeded_rng(seed);
    let n = match samples {
        Some(n) => pipeline.train_with_samples(n, &mut rng),
        None => pipeline.train_anomaly_model(&mut rng),
    }
    .context("Anomaly model training failed")?;
    println!("Trained on {n} nominal cycles");
    println!("{}", pipeline.classifier().status());
    Ok(())
}

async fn run_live(
    pipeline: &MeterPipeline,
    cycle: &CycleArgs,
    interval_ms: Option<u64>,
    cycles: Option<u64>,
) -> Result<()> {
    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, stopping live mode");
        shutdown_token.cancel();
    });

    let mut live = LiveLoop::new(pipeline, cycle.request(), cancel_token).with_max_cycles(cycles);
    if let Some(ms) = interval_ms {
        live = live.with_interval(Duration::from_millis(ms.max(1)));
    }

    let mut rng = cycle.rng();
    let stats = live
        .run(&mut rng, print_report)
        .await
        .context("Live mode stopped on a cycle error")?;
    println!(
        "{} cycles, {} abnormal",
        stats.cycles_run, stats.abnormal_cycles
    );
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    config::init(load_config(args.config.as_ref())?);
    let cfg = config::get();

    if let Some(SubCommand::Config { write }) = &args.command {
        print!("{}", cfg.to_toml()?);
        if let Some(path) = write {
            cfg.save_to_file(path)?;
        }
        return Ok(());
    }

    let pipeline = MeterPipeline::from_config(cfg).context("Failed to build meter pipeline")?;

    match args.command {
        None => run_analyze(&pipeline, &CycleArgs::default(), false),
        Some(SubCommand::Analyze { cycle, json }) => run_analyze(&pipeline, &cycle, json),
        Some(SubCommand::Train { samples, seed }) => run_train(&pipeline, samples, seed),
        Some(SubCommand::Live {
            cycle,
            interval_ms,
            cycles,
        }) => run_live(&pipeline, &cycle, interval_ms, cycles).await,
        Some(SubCommand::Status) => {
            println!("{}", pipeline.classifier().status());
            Ok(())
        }
        Some(SubCommand::Config { .. }) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_harmonic() {
        assert_eq!(parse_harmonic("3=0.1"), Ok((3, 0.1)));
        assert_eq!(parse_harmonic(" 5 = 0.05 "), Ok((5, 0.05)));
        assert!(parse_harmonic("3").is_err());
        assert!(parse_harmonic("x=0.1").is_err());
    }

    #[test]
    fn test_analyze_args_to_request() {
        let args = CliArgs::parse_from([
            "gridwatch", "analyze", "--fault", "harmonics", "--harmonic", "3=0.2", "--seed", "7",
        ]);
        let Some(SubCommand::Analyze { cycle, json }) = args.command else {
            panic!("expected analyze");
        };
        assert!(!json);
        assert_eq!(cycle.request().fault, FaultSpec::harmonics([(3, 0.2)]));
        assert_eq!(cycle.seed, Some(7));
    }

    #[test]
    fn test_default_harmonics_when_none_given() {
        let args = CliArgs::parse_from(["gridwatch", "analyze", "--fault", "harmonics"]);
        let Some(SubCommand::Analyze { cycle, .. }) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(cycle.fault_spec(), FaultSpec::default_harmonics());
    }

    #[test]
    fn test_defaults_match_bare_analyze() {
        let args = CliArgs::parse_from(["gridwatch", "analyze"]);
        let Some(SubCommand::Analyze { cycle, .. }) = args.command else {
            panic!("expected analyze");
        };
        assert_eq!(cycle.request(), CycleArgs::default().request());
    }

    #[test]
    fn test_sag_window_flags() {
        let args = CliArgs::parse_from([
            "gridwatch", "live", "--fault", "sag", "--depth", "0.3", "--start", "0.1", "--end", "0.2",
            "--cycles", "5",
        ]);
        let Some(SubCommand::Live { cycle, cycles, .. }) = args.command else {
            panic!("expected live");
        };
        assert_eq!(cycles, Some(5));
        assert_eq!(
            cycle.fault_spec(),
            FaultSpec::Sag {
                depth: 0.3,
                start_ratio: 0.1,
                end_ratio: 0.2
            }
        );
    }
}
