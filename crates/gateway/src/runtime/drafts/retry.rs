//! Failure classification, backoff, and the per-contact attempt loop.
//!
//! A contact moves `Pending -> Attempting -> Succeeded`, or through
//! `Retrying -> Attempting` on transient failures, or ends `Failed` on a
//! terminal failure or once retries are exhausted. Cancellation ends the
//! loop with no outcome reported.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use mm_domain::config::DraftingConfig;
use mm_domain::trace::TraceEvent;
use mm_providers::{ChatCompleter, CompletionRequest, ProviderError};

use super::parse::{parse_draft_response, ParseError};
use super::prompt;
use super::DraftJob;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A failed attempt, reduced to whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Transient { code: String, message: String },
    Terminal { code: String, message: String },
}

impl AttemptFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Transient { code, .. } | Self::Terminal { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Terminal { message, .. } => message,
        }
    }
}

/// Reduce a provider error to a retry decision.
pub fn classify(err: &ProviderError) -> AttemptFailure {
    let code = err.error_code();
    let message = if err.message.is_empty() {
        "Unknown error".to_string()
    } else {
        err.message.clone()
    };
    if err.is_transient() {
        AttemptFailure::Transient { code, message }
    } else {
        AttemptFailure::Terminal { code, message }
    }
}

/// Unparseable output is usually provider nondeterminism: retry it.
impl From<ParseError> for AttemptFailure {
    fn from(err: ParseError) -> Self {
        AttemptFailure::Transient {
            code: "parse_error".into(),
            message: err.to_string(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backoff
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &DraftingConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff_base: cfg.backoff_base(),
        }
    }

    /// Wait before attempt `retry`: zero for the first attempt, then
    /// `2^(retry-1) * base`.
    pub fn delay_before(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DraftingConfig::default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-contact state machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Terminal result for one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactOutcome {
    Succeeded {
        model: String,
        subject: String,
        message: String,
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    Failed {
        model: String,
        code: String,
        message: String,
        /// Retry index of the final attempt.
        retry_count: u32,
    },
    /// The operation was cancelled; nothing is reported for this contact.
    Cancelled,
}

/// Run contact `index` of `job` to a terminal outcome.
pub async fn draft_contact(
    job: &DraftJob,
    completer: &dyn ChatCompleter,
    index: usize,
    cancel: &CancellationToken,
) -> ContactOutcome {
    let contact = &job.contacts[index];
    let user_prompt = prompt::build_user_prompt(
        contact,
        &job.identity,
        &job.prompt,
        job.booking_for.as_deref(),
    );

    let mut retry: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return ContactOutcome::Cancelled;
        }
        let delay = job.retry.delay_before(retry);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ContactOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let model = job.rotation.select(index, retry).to_string();
        let req = CompletionRequest {
            model: model.clone(),
            system_prompt: prompt::build_system_prompt(&job.system_prompts, contact, index, retry),
            user_prompt: user_prompt.clone(),
            timeout: job.timeouts.for_model(&model),
        };

        let started = Instant::now();
        let result = completer.complete(req, cancel.clone()).await;
        // A reply that lands after cancellation is discarded.
        if cancel.is_cancelled() {
            return ContactOutcome::Cancelled;
        }

        let failure = match result {
            Ok(raw) => match parse_draft_response(&raw, &job.identity) {
                Ok(draft) => {
                    trace_attempt(job, contact.id, &model, retry, started, true);
                    return ContactOutcome::Succeeded {
                        model,
                        subject: draft.subject,
                        message: draft.message,
                        attempts: retry + 1,
                    };
                }
                Err(err) => AttemptFailure::from(err),
            },
            Err(err) => classify(&err),
        };
        trace_attempt(job, contact.id, &model, retry, started, false);

        if !failure.is_transient() || retry >= job.retry.max_retries {
            return ContactOutcome::Failed {
                model,
                code: failure.code().to_string(),
                message: failure.message().to_string(),
                retry_count: retry,
            };
        }

        tracing::debug!(
            operation_id = %job.operation_id,
            contact_id = contact.id,
            model = %model,
            retry_count = retry,
            code = failure.code(),
            "transient draft failure, retrying"
        );
        retry += 1;
    }
}

fn trace_attempt(job: &DraftJob, contact_id: i64, model: &str, retry: u32, started: Instant, ok: bool) {
    TraceEvent::LlmAttempt {
        operation_id: job.operation_id.clone(),
        contact_id,
        model: model.to_string(),
        retry_count: retry,
        duration_ms: started.elapsed().as_millis() as u64,
        ok,
    }
    .emit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let failure = classify(&ProviderError::http(429, "Too Many Requests"));
        assert!(failure.is_transient());
        assert_eq!(failure.code(), "rate_limited");
    }

    #[test]
    fn bad_request_is_terminal() {
        let failure = classify(&ProviderError::http(400, "bad model"));
        assert!(!failure.is_transient());
        assert_eq!(failure.code(), "http_400");
        assert_eq!(failure.message(), "bad model");
    }

    #[test]
    fn empty_message_becomes_unknown_error() {
        let failure = classify(&ProviderError::new(""));
        assert_eq!(failure.message(), "Unknown error");
        assert_eq!(failure.code(), "unknown");
    }

    #[test]
    fn parse_errors_are_retried() {
        let failure = AttemptFailure::from(ParseError);
        assert!(failure.is_transient());
        assert_eq!(failure.code(), "parse_error");
        assert_eq!(failure.message(), "Prompt parsing failed");
    }

    #[test]
    fn backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        let delays: Vec<u64> = (1..=5)
            .map(|r| policy.delay_before(r).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_before(64) >= policy.delay_before(20));
    }
}
