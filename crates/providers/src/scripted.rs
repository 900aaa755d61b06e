//! In-process completer driven by a script.
//!
//! Used for `--dry-run` and by the engine tests: every call is recorded,
//! and the reply is decided by a closure over `(call_index, request)`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::traits::{ChatCompleter, CompletionRequest};

/// What one scripted call does.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(ProviderError),
    /// Never answers; only the request timeout or cancellation ends it.
    Stall,
}

type ScriptFn = dyn Fn(usize, &CompletionRequest) -> Scripted + Send + Sync;

pub struct ScriptedCompleter {
    script: Box<ScriptFn>,
    latency: Duration,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedCompleter {
    pub fn from_fn<F>(script: F) -> Self
    where
        F: Fn(usize, &CompletionRequest) -> Scripted + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            latency: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call gets the same reply.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::from_fn(move |_, _| Scripted::Reply(reply.clone()))
    }

    /// Canned, well-formed drafts that echo the model id. Lets the whole
    /// pipeline run without network access.
    pub fn dry_run() -> Self {
        Self::from_fn(|i, req| {
            Scripted::Reply(format!(
                "Subject: Dry run draft #{n}\n\n\
                 Hello,\n\n\
                 This placeholder was produced by {model} without contacting any provider.\n\n\
                 Best regards",
                n = i + 1,
                model = req.model,
            ))
        })
        .with_latency(Duration::from_millis(50))
    }

    /// Delay every call by `latency` before the script runs.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Snapshot of every request seen so far, in call order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn run(&self, index: usize, req: &CompletionRequest) -> Result<String, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match (self.script)(index, req) {
            Scripted::Reply(text) => Ok(text),
            Scripted::Fail(err) => Err(err),
            Scripted::Stall => std::future::pending().await,
        }
    }
}

#[async_trait::async_trait]
impl ChatCompleter for ScriptedCompleter {
    async fn complete(
        &self,
        req: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, ProviderError> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(req.clone());
            calls.len() - 1
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::cancelled()),
            outcome = tokio::time::timeout(req.timeout, self.run(index, &req)) => {
                outcome.unwrap_or_else(|_| Err(ProviderError::timeout("scripted request timed out")))
            }
        }
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(model: &str, timeout: Duration) -> CompletionRequest {
        CompletionRequest {
            model: model.into(),
            system_prompt: "s".into(),
            user_prompt: "u".into(),
            timeout,
        }
    }

    #[tokio::test]
    async fn script_sees_call_index() {
        let c = ScriptedCompleter::from_fn(|i, _| {
            if i == 0 {
                Scripted::Fail(ProviderError::http(429, "slow"))
            } else {
                Scripted::Reply("ok".into())
            }
        });
        let first = c.complete(req("a", Duration::from_secs(1)), CancellationToken::new()).await;
        let second = c.complete(req("b", Duration::from_secs(1)), CancellationToken::new()).await;
        assert_eq!(first.unwrap_err().status, Some(429));
        assert_eq!(second.unwrap(), "ok");
        let models: Vec<_> = c.calls().into_iter().map(|r| r.model).collect();
        assert_eq!(models, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stall_ends_in_timeout() {
        let c = ScriptedCompleter::from_fn(|_, _| Scripted::Stall);
        let err = c
            .complete(req("a", Duration::from_secs(45)), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "timeout");
        assert!(err.aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn stall_ends_on_cancel() {
        let c = Arc::new(ScriptedCompleter::from_fn(|_, _| Scripted::Stall));
        let cancel = CancellationToken::new();
        let task = {
            let c = c.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { c.complete(req("a", Duration::from_secs(45)), cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_mentions_model() {
        let c = ScriptedCompleter::dry_run();
        let text = c
            .complete(req("x-ai/grok-4-fast", Duration::from_secs(5)), CancellationToken::new())
            .await
            .unwrap();
        assert!(text.starts_with("Subject: Dry run draft #1"));
        assert!(text.contains("x-ai/grok-4-fast"));
        assert_eq!(c.call_count(), 1);
    }
}
