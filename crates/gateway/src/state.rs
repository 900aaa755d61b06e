use std::sync::Arc;

use mm_domain::config::Config;
use mm_providers::ChatCompleter;

use crate::runtime::cancel::OperationRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Completion backend used for every draft attempt.
    pub completer: Arc<dyn ChatCompleter>,
    /// Running operations, by `operationId`.
    pub operations: Arc<OperationRegistry>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
