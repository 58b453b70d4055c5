//! Meter Configuration Module
//!
//! Provides the meter configuration loaded from TOML files, replacing the
//! hardcoded signal and threshold constants with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `GRIDWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `meter_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! The binary calls `config::init()` once at startup. Library components take
//! their configuration explicitly, so `config::get()` is only for the edges:
//!
//! ```ignore
//! config::init(MeterConfig::load());
//! let pipeline = MeterPipeline::from_config(config::get())?;
//! ```

mod meter_config;
pub mod defaults;
pub mod validation;

pub use meter_config::*;

use std::sync::OnceLock;

/// Global meter configuration, initialized once at startup.
static METER_CONFIG: OnceLock<MeterConfig> = OnceLock::new();

/// Initialize the global meter configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: MeterConfig) {
    if METER_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global meter configuration.
///
/// Falls back to the built-in defaults if `init()` was never called.
pub fn get() -> &'static MeterConfig {
    METER_CONFIG.get_or_init(|| {
        tracing::debug!("config::get() before config::init(), using defaults");
        MeterConfig::default()
    })
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    METER_CONFIG.get().is_some()
}
