use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "MindHue";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hosted backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "https://app.base44.com/api";

/// Upload ceiling for both fundus images and ERG reports (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,mindhue_lib=debug,reqwest=warn,hyper=warn"
}

/// Tunables for the diagnosis workflow.
///
/// Defaults reproduce the dashboard's observed behavior. Every field can be
/// overridden from the environment through [`WorkflowConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Base URL of the hosted backend (files, entities, LLM integration).
    pub backend_url: String,
    /// Fundus results below this confidence are reported as mild.
    pub confidence_threshold: f64,
    /// Confidence reported for ERG results that omit one.
    pub erg_default_confidence: f64,
    /// Largest file accepted by ingestion, in bytes.
    pub max_upload_bytes: u64,
    /// Total inference attempts per diagnosis run (1 = no retry).
    pub max_inference_attempts: u32,
    /// HTTP timeout for backend calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            confidence_threshold: 70.0,
            erg_default_confidence: 85.0,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_inference_attempts: 1,
            request_timeout_secs: 120,
        }
    }
}

impl WorkflowConfig {
    /// Defaults overridden by `MINDHUE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    /// Unparsable values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("MINDHUE_BACKEND_URL") {
            let url = url.trim();
            if !url.is_empty() {
                config.backend_url = url.trim_end_matches('/').to_string();
            }
        }
        override_parsed(&lookup, "MINDHUE_CONFIDENCE_THRESHOLD", &mut config.confidence_threshold);
        override_parsed(&lookup, "MINDHUE_ERG_DEFAULT_CONFIDENCE", &mut config.erg_default_confidence);
        override_parsed(&lookup, "MINDHUE_MAX_UPLOAD_BYTES", &mut config.max_upload_bytes);
        override_parsed(&lookup, "MINDHUE_MAX_INFERENCE_ATTEMPTS", &mut config.max_inference_attempts);
        override_parsed(&lookup, "MINDHUE_REQUEST_TIMEOUT_SECS", &mut config.request_timeout_secs);

        // Zero attempts would make every diagnosis fail without a call.
        config.max_inference_attempts = config.max_inference_attempts.max(1);
        config
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparsable config override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_dashboard_behavior() {
        let config = WorkflowConfig::default();
        assert!((config.confidence_threshold - 70.0).abs() < f64::EPSILON);
        assert!((config.erg_default_confidence - 85.0).abs() < f64::EPSILON);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_inference_attempts, 1);
    }

    #[test]
    fn env_overrides_apply() {
        let config = WorkflowConfig::from_lookup(lookup_from(&[
            ("MINDHUE_BACKEND_URL", "http://localhost:8080/"),
            ("MINDHUE_CONFIDENCE_THRESHOLD", "60"),
            ("MINDHUE_MAX_INFERENCE_ATTEMPTS", "3"),
        ]));
        assert_eq!(config.backend_url, "http://localhost:8080");
        assert!((config.confidence_threshold - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.max_inference_attempts, 3);
    }

    #[test]
    fn unparsable_override_keeps_default() {
        let config = WorkflowConfig::from_lookup(lookup_from(&[(
            "MINDHUE_MAX_UPLOAD_BYTES",
            "ten megabytes",
        )]));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let config =
            WorkflowConfig::from_lookup(lookup_from(&[("MINDHUE_MAX_INFERENCE_ATTEMPTS", "0")]));
        assert_eq!(config.max_inference_attempts, 1);
    }

    #[test]
    fn app_name_is_mindhue() {
        assert_eq!(APP_NAME, "MindHue");
    }
}
