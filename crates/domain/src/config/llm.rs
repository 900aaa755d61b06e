use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider (OpenRouter chat completions)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Identifier used in logs and trace events.
    #[serde(default = "d_provider_id")]
    pub provider_id: String,
    /// Base URL of an OpenAI-compatible API; `/chat/completions` is appended.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_auth")]
    pub auth: AuthConfig,
    /// Sampling temperature, clamped into `[0, 2]` when the request is built.
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_top_p")]
    pub top_p: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_id: d_provider_id(),
            base_url: d_base_url(),
            auth: d_auth(),
            temperature: d_temperature(),
            top_p: d_top_p(),
            max_tokens: d_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn clamped_temperature(&self) -> f32 {
        if self.temperature.is_finite() {
            self.temperature.clamp(0.0, 2.0)
        } else {
            d_temperature()
        }
    }
}

/// Where the provider API key comes from.
///
/// `key` wins over `env` when both are set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_provider_id() -> String {
    "openrouter".into()
}
fn d_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn d_auth() -> AuthConfig {
    AuthConfig {
        env: Some("OPENROUTER_API_KEY".into()),
        key: None,
    }
}
fn d_temperature() -> f32 {
    0.8
}
fn d_top_p() -> f32 {
    0.95
}
fn d_max_tokens() -> u32 {
    1200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reads_key_from_openrouter_env() {
        let cfg = LlmConfig::default();
        assert_eq!(cfg.auth.env.as_deref(), Some("OPENROUTER_API_KEY"));
        assert!(cfg.auth.key.is_none());
    }

    #[test]
    fn temperature_is_clamped() {
        let mut cfg = LlmConfig::default();
        cfg.temperature = 3.5;
        assert_eq!(cfg.clamped_temperature(), 2.0);
        cfg.temperature = -1.0;
        assert_eq!(cfg.clamped_temperature(), 0.0);
        cfg.temperature = f32::NAN;
        assert_eq!(cfg.clamped_temperature(), 0.8);
    }
}
