// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment
//! (Cloud Run secret bindings) and read once at startup.

use std::env;

/// Cloud Tasks queue allowed to call `/tasks/*`.
pub const TASKS_QUEUE_NAME: &str = "match-recheck";

/// Overlaps shorter than this are never matches.
pub const MIN_OVERLAP_MINUTES: i64 = 30;

/// Smallest pre-filter padding that keeps the filter a superset of the
/// exact checks for radii up to `MAX_RADIUS_LIMIT_KM` and |lat| <= 85.
pub const MIN_SEARCH_PADDING_KM: f64 = 50.0;

/// Largest radius limit the pre-filter padding is known to cover.
pub const MAX_RADIUS_LIMIT_KM: f64 = 200.0;

/// Matching policy constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Overlaps shorter than this are not matches
    pub min_overlap_minutes: i64,
    /// Slack added to the combined radius in the rough pre-filter
    pub search_padding_km: f64,
    /// Largest radius an event may declare
    pub max_radius_km: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_overlap_minutes: MIN_OVERLAP_MINUTES,
            search_padding_km: MIN_SEARCH_PADDING_KM,
            max_radius_km: MAX_RADIUS_LIMIT_KM,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL (CORS origin)
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Push gateway endpoint; notifications are only logged when unset
    pub push_gateway_url: Option<String>,
    /// Matching constants
    pub policy: MatchPolicy,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared token expected on `/tasks/*` requests
    pub tasks_auth_token: String,
    /// Bearer token for the push gateway
    pub push_gateway_token: Option<String>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            push_gateway_url: None,
            policy: MatchPolicy::default(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            tasks_auth_token: "test_tasks_token".to_string(),
            push_gateway_token: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is read first if present (local development).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let policy = MatchPolicy::from_lookup(optional_var)?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            push_gateway_url: optional_var("PUSH_GATEWAY_URL"),
            policy,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            tasks_auth_token: env::var("TASKS_AUTH_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TASKS_AUTH_TOKEN"))?,
            push_gateway_token: optional_var("PUSH_GATEWAY_TOKEN"),
        })
    }
}

/// Read a trimmed, non-empty variable.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MatchPolicy {
    /// Build the policy from `SEARCH_PADDING_KM` and `MAX_RADIUS_KM`
    /// overrides. Padding may only grow and the radius limit may only
    /// shrink; the minimum overlap is fixed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let search_padding_km = parse_km(
            &lookup,
            "SEARCH_PADDING_KM",
            defaults.search_padding_km,
            MIN_SEARCH_PADDING_KM..=f64::MAX,
        )?;
        let max_radius_km = parse_km(
            &lookup,
            "MAX_RADIUS_KM",
            defaults.max_radius_km,
            0.0..=MAX_RADIUS_LIMIT_KM,
        )?;
        Ok(Self {
            min_overlap_minutes: MIN_OVERLAP_MINUTES,
            search_padding_km,
            max_radius_km,
        })
    }
}

fn parse_km(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: f64,
    allowed: std::ops::RangeInclusive<f64>,
) -> Result<f64, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && allowed.contains(&value) => Ok(value),
        _ => Err(ConfigError::Invalid(name, raw)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("TASKS_AUTH_TOKEN", " tasks-secret \n");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.tasks_auth_token, "tasks-secret");
        assert_eq!(config.policy.min_overlap_minutes, 30);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_policy_overrides_within_bounds() {
        let policy =
            MatchPolicy::from_lookup(lookup(&[("SEARCH_PADDING_KM", "75"), ("MAX_RADIUS_KM", "80")]))
                .unwrap();
        assert_eq!(policy.search_padding_km, 75.0);
        assert_eq!(policy.max_radius_km, 80.0);
        assert_eq!(policy.min_overlap_minutes, MIN_OVERLAP_MINUTES);
    }

    #[test]
    fn test_policy_rejects_out_of_domain_values() {
        for (name, value) in [
            ("SEARCH_PADDING_KM", "-100"),
            ("SEARCH_PADDING_KM", "10"),
            ("SEARCH_PADDING_KM", "NaN"),
            ("MAX_RADIUS_KM", "5000"),
            ("MAX_RADIUS_KM", "-1"),
            ("MAX_RADIUS_KM", "wide"),
        ] {
            let result = MatchPolicy::from_lookup(lookup(&[(name, value)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid(n, _)) if n == name),
                "{}={} should be rejected",
                name,
                value
            );
        }
    }

    #[test]
    fn test_min_overlap_is_not_configurable() {
        let policy = MatchPolicy::from_lookup(lookup(&[("MIN_OVERLAP_MINUTES", "0")])).unwrap();
        assert_eq!(policy.min_overlap_minutes, 30);
    }

    #[test]
    fn test_default_policy() {
        let policy = MatchPolicy::default();
        assert_eq!(policy.min_overlap_minutes, 30);
        assert_eq!(policy.search_padding_km, 50.0);
        assert_eq!(policy.max_radius_km, 200.0);
    }
}
