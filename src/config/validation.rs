//! Config validation: unknown-key detection with Levenshtein suggestions
//! and electrical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ": did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `MeterConfig`.
///
/// Maintained by hand to match meter_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [signal]
        "signal",
        "signal.sampling_rate_hz",
        "signal.duration_secs",
        "signal.fundamental_hz",
        "signal.nominal_rms_volts",
        // [thresholds]
        "thresholds",
        "thresholds.sag_threshold",
        "thresholds.swell_threshold",
        "thresholds.thd_threshold",
        // [anomaly]
        "anomaly",
        "anomaly.algorithm",
        "anomaly.model_path",
        "anomaly.contamination",
        "anomaly.seed",
        "anomaly.n_estimators",
        "anomaly.max_samples",
        "anomaly.training_samples",
        "anomaly.training_noise_level",
        // [live]
        "live",
        "live.interval_ms",
        "live.noise_jitter_min",
        "live.noise_jitter_max",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Equal distances resolve alphabetically so the suggestion is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Electrical Range Validation
// ============================================================================

/// Validate electrical ranges on a parsed `MeterConfig`.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::MeterConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let s = &config.signal;

    // Nyquist: the fundamental must be representable
    if s.fundamental_hz * 2.0 >= s.sampling_rate_hz {
        errors.push(format!(
            "signal.fundamental_hz = {:.1} is at or above Nyquist for sampling_rate_hz = {:.1}",
            s.fundamental_hz, s.sampling_rate_hz
        ));
    }

    // Grid frequencies outside 40-70 Hz are not utility mains
    if s.fundamental_hz < 40.0 || s.fundamental_hz > 70.0 {
        warnings.push(ValidationWarning {
            field: "signal.fundamental_hz".to_string(),
            message: format!(
                "fundamental_hz = {:.1} is outside typical mains range (40-70 Hz)",
                s.fundamental_hz
            ),
            suggestion: None,
        });
    }

    // Fewer than two full cycles gives a meaningless THD
    if s.fundamental_hz * s.duration_secs < 2.0 {
        warnings.push(ValidationWarning {
            field: "signal.duration_secs".to_string(),
            message: format!(
                "duration_secs = {:.3} covers fewer than 2 fundamental cycles",
                s.duration_secs
            ),
            suggestion: None,
        });
    }

    // Thresholds that don't bracket the nominal voltage flag every cycle
    let t = &config.thresholds;
    if t.sag_threshold >= s.nominal_rms_volts || t.swell_threshold <= s.nominal_rms_volts {
        warnings.push(ValidationWarning {
            field: "thresholds".to_string(),
            message: format!(
                "sag/swell thresholds ({:.1} / {:.1} V) do not bracket nominal_rms_volts = {:.1}",
                t.sag_threshold, t.swell_threshold, s.nominal_rms_volts
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
