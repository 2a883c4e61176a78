//! Configuration structures for jsmod.
//!
//! This module defines configuration options for the runtime:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EvaluationConfig`]: Module graph evaluation settings (deadline, main module, loop limit)
//! - [`FetchConfig`]: Remote module fetch settings (timeout, user agent)

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// It can be loaded from files (TOML, JSON) through [`crate::ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Module graph evaluation configuration.
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Remote module fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Module graph evaluation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationConfig {
    /// Wall-clock deadline for linking and evaluating the module graph, in milliseconds.
    ///
    /// Invocations of the resulting handler are not bounded by this value.
    #[serde(default = "defaults::deadline_ms")]
    pub deadline_ms: u64,

    /// Name the main script is registered under in the virtual source tree.
    #[serde(default = "defaults::main_module")]
    pub main_module: String,

    /// Maximum iterations of any single loop while the module graph evaluates.
    ///
    /// A top-level loop that exceeds it fails the evaluation, so the
    /// instance thread exits instead of spinning past the deadline.
    #[serde(default = "defaults::loop_iteration_limit")]
    pub loop_iteration_limit: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: defaults::deadline_ms(),
            main_module: defaults::main_module(),
            loop_iteration_limit: defaults::loop_iteration_limit(),
        }
    }
}

impl EvaluationConfig {
    /// Get the deadline as a `Duration`.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Remote module fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Timeout of a single fetch in seconds, independent of the evaluation deadline.
    #[serde(default = "defaults::fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with every fetch.
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::fetch_timeout_secs(),
            user_agent: defaults::user_agent(),
        }
    }
}

impl FetchConfig {
    /// Get the timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn deadline_ms() -> u64 {
        15_000
    }

    pub fn main_module() -> String {
        "main.js".to_string()
    }

    pub const fn loop_iteration_limit() -> u64 {
        100_000_000
    }

    pub const fn fetch_timeout_secs() -> u64 {
        60
    }

    pub fn user_agent() -> String {
        concat!("jsmod/", env!("CARGO_PKG_VERSION")).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert_eq!(config.evaluation.deadline_ms, 15_000);
        assert_eq!(config.evaluation.main_module, "main.js");
        assert_eq!(config.evaluation.loop_iteration_limit, 100_000_000);
        assert_eq!(config.fetch.timeout_secs, 60);
        assert!(config.fetch.user_agent.starts_with("jsmod/"));
    }

    #[test]
    fn test_config_serialization() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.evaluation.deadline_ms,
            deserialized.evaluation.deadline_ms
        );
        assert_eq!(config.fetch.timeout_secs, deserialized.fetch.timeout_secs);
    }

    #[test]
    fn test_durations() {
        let evaluation = EvaluationConfig {
            deadline_ms: 500,
            ..Default::default()
        };
        assert_eq!(evaluation.deadline(), Duration::from_millis(500));
        assert_eq!(FetchConfig::default().timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"evaluation": {"deadline_ms": 250}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert_eq!(config.evaluation.deadline_ms, 250);
        // Default values for unspecified fields
        assert_eq!(config.evaluation.main_module, "main.js");
        assert_eq!(config.fetch.timeout_secs, 60);
    }
}
