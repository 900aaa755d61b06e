mod drafting;
mod llm;
mod observability;
mod server;

pub use drafting::*;
pub use llm::*;
pub use observability::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub drafting: DraftingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Env var overriding `drafting.default_concurrency`.
pub const CONCURRENCY_ENV: &str = "DRAFTS_GENERATE_CONCURRENCY";
/// Env var overriding `llm.temperature`.
pub const TEMPERATURE_ENV: &str = "OPENROUTER_TEMPERATURE";

impl Config {
    /// Apply environment overrides on top of the file values.
    ///
    /// `lookup` is `std::env::var` in production; unparseable values are
    /// logged and ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(CONCURRENCY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.drafting.default_concurrency = n,
                Err(_) => tracing::warn!(
                    env_var = CONCURRENCY_ENV,
                    value = %raw,
                    "ignoring non-numeric concurrency override"
                ),
            }
        }
        if let Some(raw) = lookup(TEMPERATURE_ENV) {
            match raw.trim().parse::<f32>() {
                Ok(t) if t.is_finite() => self.llm.temperature = t,
                _ => tracing::warn!(
                    env_var = TEMPERATURE_ENV,
                    value = %raw,
                    "ignoring invalid temperature override"
                ),
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        let drafting = &self.drafting;
        if drafting.allowed_models.is_empty() {
            errors.push(ConfigError::error(
                "drafting.allowed_models",
                "at least one drafting model must be allowed",
            ));
        }
        if let Some(i) = drafting.allowed_models.iter().position(|m| m.trim().is_empty()) {
            errors.push(ConfigError::error(
                format!("drafting.allowed_models[{i}]"),
                "model id must not be empty",
            ));
        }
        if drafting.max_concurrency == 0 {
            errors.push(ConfigError::error(
                "drafting.max_concurrency",
                "max_concurrency must be greater than 0",
            ));
        }
        if drafting.default_concurrency == 0
            || drafting.default_concurrency > drafting.max_concurrency
        {
            errors.push(ConfigError::warning(
                "drafting.default_concurrency",
                format!(
                    "default_concurrency {} is clamped into [1, {}]",
                    drafting.default_concurrency, drafting.max_concurrency
                ),
            ));
        }
        if drafting.heartbeat_secs == 0 {
            errors.push(ConfigError::error(
                "drafting.heartbeat_secs",
                "heartbeat interval must be greater than 0",
            ));
        }
        if drafting.event_backlog == 0 {
            errors.push(ConfigError::error(
                "drafting.event_backlog",
                "event_backlog must be greater than 0",
            ));
        }
        if drafting.system_prompts.is_empty() {
            errors.push(ConfigError::error(
                "drafting.system_prompts",
                "at least one system prompt template is required",
            ));
        }
        if drafting.slow_timeout_ms / 1000 >= drafting.max_duration_secs {
            errors.push(ConfigError::warning(
                "drafting.slow_timeout_ms",
                "a single slow call can outlive the whole operation budget",
            ));
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.auth.env.is_none() && self.llm.auth.key.is_none() {
            errors.push(ConfigError::warning(
                "llm.auth",
                "no API key source configured; only --dry-run generation will work",
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(ConfigError::warning(
                "llm.temperature",
                "temperature is clamped into [0, 2]",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        assert!(
            issues.iter().all(|i| i.severity == ConfigSeverity::Warning),
            "unexpected errors: {issues:?}"
        );
    }

    #[test]
    fn empty_allow_list_is_an_error() {
        let mut cfg = Config::default();
        cfg.drafting.allowed_models.clear();
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "drafting.allowed_models" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        assert!(cfg.validate().iter().any(|i| i.field == "server.port"));
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|name| match name {
            CONCURRENCY_ENV => Some("12".into()),
            TEMPERATURE_ENV => Some("warm".into()),
            _ => None,
        });
        assert_eq!(cfg.drafting.default_concurrency, 12);
        assert!((cfg.llm.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn display_includes_severity_tag() {
        let issue = ConfigError::warning("llm.auth", "missing");
        assert_eq!(issue.to_string(), "[WARN] llm.auth: missing");
    }
}
