//! Shared utility functions for provider adapters.

use mm_domain::config::AuthConfig;
use mm_domain::error::{Error, Result};

use crate::error::ProviderError;

/// Convert a [`reqwest::Error`] into a [`ProviderError`].
///
/// Timeouts map to `timeout`, body decoding failures stay uncoded, and
/// everything else (connect, TLS, reset) is a `network` failure.
pub(crate) fn from_reqwest(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(e.to_string())
    } else if e.is_decode() {
        ProviderError::new(e.to_string())
    } else {
        ProviderError::network(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `env` field (reads environment variable)
/// 3. Error
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key', prefer 'env' instead"
        );
        return Ok(key.clone());
    }

    if let Some(ref env_var) = auth.env {
        return match std::env::var(env_var) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(Error::Auth(format!(
                "environment variable '{env_var}' not set or empty"
            ))),
        };
    }

    Err(Error::Auth(
        "no API key configured: set 'key' or 'env' in [llm.auth]".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_key_wins() {
        let auth = AuthConfig {
            key: Some("sk-test-123".into()),
            env: Some("MM_TEST_SHOULD_NOT_BE_READ".into()),
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "sk-test-123");
    }

    #[test]
    fn env_var_is_read() {
        let var_name = "MM_TEST_RESOLVE_ENV_KEY_4821";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            key: None,
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn missing_env_var_names_the_variable() {
        let auth = AuthConfig {
            env: Some("MM_TEST_NONEXISTENT_VAR_9173".into()),
            key: None,
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("MM_TEST_NONEXISTENT_VAR_9173"));
    }

    #[test]
    fn no_source_is_an_auth_error() {
        let err = resolve_api_key(&AuthConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }
}
