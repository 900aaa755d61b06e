pub mod error;
pub mod openrouter;
pub mod scripted;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use error::ProviderError;
pub use openrouter::OpenRouterCompleter;
pub use scripted::{Scripted, ScriptedCompleter};
pub use traits::{ChatCompleter, CompletionRequest};
pub use util::resolve_api_key;
