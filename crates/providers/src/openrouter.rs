//! OpenRouter (OpenAI-compatible) streaming chat completions.
//!
//! The completion is always requested with `stream: true`; deltas are
//! accumulated until `[DONE]` or the body ends. The per-call timeout and
//! the caller's cancellation token both cut the request short.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use mm_domain::config::LlmConfig;
use mm_domain::error::Result;

use crate::error::ProviderError;
use crate::sse::{SseData, SseLineBuffer};
use crate::traits::{ChatCompleter, CompletionRequest};
use crate::util::{from_reqwest, resolve_api_key};

/// Longest slice of an error body echoed into a [`ProviderError`].
const ERROR_BODY_LIMIT: usize = 500;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenRouterCompleter {
    id: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenRouterCompleter {
    /// Build the client from the `[llm]` config, resolving the API key now.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;

        // No overall client timeout: each call carries its own.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| mm_domain::error::Error::Http(e.to_string()))?;

        Ok(Self {
            id: cfg.provider_id.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key,
            temperature: cfg.clamped_temperature(),
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
            client,
        })
    }

    fn build_body(&self, req: &CompletionRequest) -> Value {
        serde_json::json!({
            "model": req.model,
            "stream": true,
            "temperature": self.temperature,
            "top_p": self.top_p,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": req.system_prompt },
                { "role": "user", "content": req.user_prompt },
            ],
        })
    }

    async fn stream_completion(&self, req: &CompletionRequest) -> std::result::Result<String, ProviderError> {
        let mut resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(req))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), error_message(&raw)));
        }

        let mut lines = SseLineBuffer::new();
        let mut text = String::new();

        'body: loop {
            let (data, ended) = match resp.chunk().await.map_err(from_reqwest)? {
                Some(bytes) => (lines.push(&bytes), false),
                None => (lines.finish(), true),
            };
            for item in data {
                match item {
                    SseData::Done => break 'body,
                    SseData::Payload(json) => {
                        // Keep-alive junk and partial frames are skipped.
                        if let Ok(chunk) = serde_json::from_str::<Value>(&json) {
                            if let Some(delta) = delta_text(&chunk) {
                                text.push_str(&delta);
                            }
                        }
                    }
                }
            }
            if ended {
                break;
            }
        }

        if text.is_empty() {
            return Err(ProviderError::new("Empty response from OpenRouter streaming"));
        }
        Ok(text)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pull `choices[0].delta.content`, which is either a string or an array
/// of text parts.
fn delta_text(chunk: &Value) -> Option<String> {
    let content = chunk
        .get("choices")?
        .as_array()?
        .first()?
        .get("delta")?
        .get("content")?;

    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(_) => part
                        .get("text")
                        .and_then(Value::as_str)
                        .or_else(|| part.get("content").and_then(Value::as_str)),
                    _ => None,
                })
                .collect();
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

/// Best human-readable message from an error response body.
fn error_message(raw: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        let nested = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str);
        if let Some(msg) = nested.or_else(|| v.get("message").and_then(Value::as_str)) {
            return msg.to_string();
        }
    }
    if raw.is_empty() {
        return "OpenRouter request failed".into();
    }
    raw.chars().take(ERROR_BODY_LIMIT).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatCompleter for OpenRouterCompleter {
    async fn complete(
        &self,
        req: CompletionRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        tracing::debug!(provider = %self.id, model = %req.model, "openrouter stream request");
        let start = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::cancelled()),
            outcome = tokio::time::timeout(req.timeout, self.stream_completion(&req)) => {
                outcome.unwrap_or_else(|_| Err(ProviderError::timeout("OpenRouter request timed out")))
            }
        };

        tracing::debug!(
            provider = %self.id,
            model = %req.model,
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "openrouter stream finished"
        );
        result
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use mm_domain::config::AuthConfig;

    fn completer() -> OpenRouterCompleter {
        let cfg = LlmConfig {
            base_url: "https://example.test/api/v1/".into(),
            auth: AuthConfig {
                key: Some("sk-test".into()),
                env: None,
            },
            temperature: 5.0,
            ..Default::default()
        };
        OpenRouterCompleter::from_config(&cfg).unwrap()
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(completer().endpoint, "https://example.test/api/v1/chat/completions");
    }

    #[test]
    fn body_streams_with_clamped_temperature() {
        let req = CompletionRequest {
            model: "m1".into(),
            system_prompt: "sys".into(),
            user_prompt: "usr".into(),
            timeout: Duration::from_secs(1),
        };
        let body = completer().build_body(&req);
        assert_eq!(body["model"], "m1");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 2.0);
        assert_eq!(body["max_tokens"], 1200);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
    }

    #[test]
    fn delta_text_reads_string_content() {
        let chunk = serde_json::json!({"choices":[{"delta":{"content":"Hel"}}]});
        assert_eq!(delta_text(&chunk).as_deref(), Some("Hel"));
    }

    #[test]
    fn delta_text_joins_part_arrays() {
        let chunk = serde_json::json!({"choices":[{"delta":{"content":[
            "a", {"text":"b"}, {"content":"c"}, {"other":"x"}
        ]}}]});
        assert_eq!(delta_text(&chunk).as_deref(), Some("abc"));
    }

    #[test]
    fn delta_text_ignores_role_only_chunks() {
        let chunk = serde_json::json!({"choices":[{"delta":{"role":"assistant"}}]});
        assert!(delta_text(&chunk).is_none());
    }

    #[test]
    fn error_message_prefers_nested_error() {
        assert_eq!(error_message(r#"{"error":{"message":"No credits"}}"#), "No credits");
        assert_eq!(error_message(r#"{"message":"flat"}"#), "flat");
        assert_eq!(error_message(""), "OpenRouter request failed");
        assert_eq!(error_message(&"x".repeat(900)).len(), ERROR_BODY_LIMIT);
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let req = CompletionRequest {
            model: "m1".into(),
            system_prompt: String::new(),
            user_prompt: String::new(),
            timeout: Duration::from_secs(30),
        };
        let err = completer().complete(req, cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
