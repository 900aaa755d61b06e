use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bulk draft generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tuning for the bulk draft generation engine.
///
/// Every field has a default, so an empty `[drafting]` table (or none at
/// all) yields the production settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftingConfig {
    /// Worker count used when a request does not ask for one.
    /// Overridden by `DRAFTS_GENERATE_CONCURRENCY`.
    #[serde(default = "d_5")]
    pub default_concurrency: usize,
    /// Hard ceiling on workers per operation.
    #[serde(default = "d_20")]
    pub max_concurrency: usize,
    /// Retries after the first attempt (so `max_retries + 1` attempts).
    #[serde(default = "d_5u")]
    pub max_retries: u32,
    /// Backoff unit; retry `n` waits `2^(n-1)` units.
    #[serde(default = "d_1000")]
    pub backoff_base_ms: u64,
    #[serde(default = "d_15")]
    pub heartbeat_secs: u64,
    /// Per-call timeout for models not matching `slow_model_markers`.
    #[serde(default = "d_45000")]
    pub fast_timeout_ms: u64,
    /// Per-call timeout for models matching `slow_model_markers`.
    #[serde(default = "d_110000")]
    pub slow_timeout_ms: u64,
    /// Substrings that mark a model id as slow.
    #[serde(default = "d_slow_markers")]
    pub slow_model_markers: Vec<String>,
    /// Model ids callers may request. The first entry is the fallback
    /// when nothing requested survives the allow-list.
    #[serde(default = "d_allowed_models")]
    pub allowed_models: Vec<String>,
    /// Wall-clock budget for a whole operation; the operation is cancelled
    /// when it elapses.
    #[serde(default = "d_120")]
    pub max_duration_secs: u64,
    /// Frames buffered for a slow stream consumer before workers wait.
    #[serde(default = "d_256")]
    pub event_backlog: usize,
    /// System prompt templates. `{recipient_first_name}` and `{company}`
    /// are substituted per contact.
    #[serde(default = "d_system_prompts")]
    pub system_prompts: Vec<String>,
}

impl Default for DraftingConfig {
    fn default() -> Self {
        Self {
            default_concurrency: d_5(),
            max_concurrency: d_20(),
            max_retries: d_5u(),
            backoff_base_ms: d_1000(),
            heartbeat_secs: d_15(),
            fast_timeout_ms: d_45000(),
            slow_timeout_ms: d_110000(),
            slow_model_markers: d_slow_markers(),
            allowed_models: d_allowed_models(),
            max_duration_secs: d_120(),
            event_backlog: d_256(),
            system_prompts: d_system_prompts(),
        }
    }
}

impl DraftingConfig {
    /// The model used when no requested model is allow-listed.
    pub fn default_model(&self) -> &str {
        self.allowed_models
            .first()
            .map(String::as_str)
            .unwrap_or(FALLBACK_MODEL)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn fast_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_timeout_ms)
    }

    pub fn slow_timeout(&self) -> Duration {
        Duration::from_millis(self.slow_timeout_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

const FALLBACK_MODEL: &str = "openai/gpt-4o-mini";

// ── serde default helpers ───────────────────────────────────────────

fn d_5() -> usize {
    5
}
fn d_20() -> usize {
    20
}
fn d_5u() -> u32 {
    5
}
fn d_1000() -> u64 {
    1000
}
fn d_15() -> u64 {
    15
}
fn d_45000() -> u64 {
    45_000
}
fn d_110000() -> u64 {
    110_000
}
fn d_120() -> u64 {
    120
}
fn d_256() -> usize {
    256
}
fn d_slow_markers() -> Vec<String> {
    ["gpt", "deepseek", "qwen", "claude", "235b", "70b", "gemini", "pro"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn d_allowed_models() -> Vec<String> {
    [
        "x-ai/grok-4-fast",
        "openai/gpt-4o-mini",
        "google/gemini-2.5-flash",
        "deepseek/deepseek-chat-v3.1",
        "meta-llama/llama-3.3-70b-instruct",
        "mistralai/mistral-small-3.2-24b-instruct",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn d_system_prompts() -> Vec<String> {
    vec![
        "You write short, warm booking-inquiry emails from a performing artist to a \
         venue contact named {recipient_first_name} at {company}. Respond with JSON \
         only: {\"subject\": string, \"message\": string}. Do not add a signature."
            .into(),
        "You are drafting a first-contact email to {recipient_first_name} at {company} \
         on behalf of the sender described in the user message. Keep it under 150 \
         words, specific to the recipient, and free of em-dashes. Reply with a JSON \
         object containing \"subject\" and \"message\" and nothing else."
            .into(),
    ]
}
