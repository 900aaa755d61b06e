use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single system + user prompt completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Provider model id (e.g. "openai/gpt-4o-mini").
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Hard limit for the whole call, including streaming the body.
    pub timeout: Duration,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every completion backend must implement.
///
/// Implementations must return (not hang) once `req.timeout` elapses, and
/// must return [`ProviderError::cancelled`] promptly when `cancel` fires.
#[async_trait::async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Run the completion and return the full response text.
    async fn complete(
        &self,
        req: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String, ProviderError>;

    /// A unique identifier for this backend.
    fn provider_id(&self) -> &str;
}
