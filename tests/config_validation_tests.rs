//! Config Validation Tests
//!
//! Typo detection, electrical range checks and file loading for
//! `MeterConfig`, exercised independently from the rest of the pipeline.

use gridwatch::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use gridwatch::config::{ConfigError, MeterConfig};
use gridwatch::ModelAlgorithm;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_thd_threshold_warns_with_suggestion() {
    let toml_str = r#"
[thresholds]
thd_treshold = 0.08
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("thd_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("thresholds.thd_threshold"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn misspelled_section_warns() {
    let warnings = validate_unknown_keys("[signl]\nfundamental_hz = 60.0\n");
    assert!(warnings.iter().any(|w| w.field == "signl"));
    assert!(warnings
        .iter()
        .any(|w| w.suggestion.as_deref() == Some("signal")));
}

#[test]
fn valid_config_produces_no_warnings() {
    let toml_str = r#"
[signal]
sampling_rate_hz = 2000.0
fundamental_hz = 60.0

[anomaly]
algorithm = "z_score"
contamination = 0.05
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn unrelated_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely_unrelated_key_name", &known).is_none());
}

#[test]
fn unknown_keys_do_not_fail_parsing() {
    let config = MeterConfig::from_toml_str("[live]\nintervl_ms = 100\n").expect("parse");
    assert_eq!(config.live.interval_ms, 500, "typo'd key must not override");
}

#[test]
fn malformed_toml_yields_no_key_warnings() {
    assert!(validate_unknown_keys("[signal\nbroken").is_empty());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn sixty_hz_grid_validates() {
    let toml_str = r#"
[signal]
fundamental_hz = 60.0
nominal_rms_volts = 120.0

[thresholds]
sag_threshold = 108.0
swell_threshold = 132.0
"#;
    let config = MeterConfig::from_toml_str(toml_str).expect("60 Hz config should load");
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn fundamental_above_nyquist_is_rejected() {
    let toml_str = r#"
[signal]
sampling_rate_hz = 80.0
"#;
    match MeterConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("Nyquist")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn thresholds_not_bracketing_nominal_warn_only() {
    let mut config = MeterConfig::default();
    config.thresholds.sag_threshold = 235.0;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "thresholds"));
    assert!(config.validate().is_ok());
}

#[test]
fn short_window_warns() {
    let mut config = MeterConfig::default();
    config.signal.duration_secs = 0.02; // one cycle at 50 Hz
    let (_, warnings) = validate_physical_ranges(&config);
    assert!(warnings.iter().any(|w| w.field == "signal.duration_secs"));
}

#[test]
fn inverted_jitter_is_rejected() {
    let mut config = MeterConfig::default();
    config.live.noise_jitter_min = 1.5;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn equal_jitter_bounds_fix_the_noise_factor() {
    let config = MeterConfig::from_toml_str("[live]\nnoise_jitter_min = 1.0\nnoise_jitter_max = 1.0\n")
        .expect("fixed jitter factor should validate");
    assert_eq!(config.live.noise_jitter_min, config.live.noise_jitter_max);
}

#[test]
fn validation_error_lists_every_problem() {
    let mut config = MeterConfig::default();
    config.anomaly.n_estimators = 0;
    config.live.interval_ms = 0;
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.len() >= 2);
            let rendered = ConfigError::Validation(errors).to_string();
            assert!(rendered.contains("n_estimators"));
            assert!(rendered.contains("interval_ms"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let path = dir.path().join("meter_config.toml");

    let mut config = MeterConfig::default();
    config.anomaly.algorithm = ModelAlgorithm::ZScore;
    config.anomaly.model_path = Some(dir.path().join("models").join("custom.json"));
    config.thresholds.thd_threshold = 0.08;
    config.save_to_file(&path).expect("save");

    let loaded = MeterConfig::load_from_file(&path).expect("load");
    assert_eq!(loaded.anomaly.algorithm, ModelAlgorithm::ZScore);
    assert_eq!(loaded.anomaly.artifact_path(), dir.path().join("models").join("custom.json"));
    assert_eq!(loaded.thresholds.thd_threshold, 0.08);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tmpdir");
    assert!(matches!(
        MeterConfig::load_from_file(&dir.path().join("nope.toml")),
        Err(ConfigError::Io(_, _))
    ));
}
