//! AppState construction shared by `serve` and `generate`.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use mm_domain::config::{Config, ConfigSeverity};
use mm_providers::{ChatCompleter, OpenRouterCompleter, ScriptedCompleter};

use crate::runtime::cancel::OperationRegistry;
use crate::state::AppState;

/// Log every config issue and fail if any of them is an error.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// The completion backend: OpenRouter, or canned replies for `--dry-run`.
pub fn build_completer(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn ChatCompleter>> {
    if dry_run {
        tracing::warn!("dry run: drafts are canned and no provider is contacted");
        return Ok(Arc::new(ScriptedCompleter::dry_run()));
    }
    let completer = OpenRouterCompleter::from_config(&config.llm)
        .context("initializing OpenRouter client")?;
    tracing::info!(
        provider = %config.llm.provider_id,
        base_url = %config.llm.base_url,
        "LLM provider ready"
    );
    Ok(Arc::new(completer))
}

/// Validate config, read the API token and return a fully-wired [`AppState`].
pub fn build_app_state(
    config: Arc<Config>,
    completer: Arc<dyn ChatCompleter>,
) -> anyhow::Result<AppState> {
    check_config(&config)?;

    let api_token_hash = read_api_token_hash(&config.server.api_token_env);

    tracing::info!(
        models = config.drafting.allowed_models.len(),
        default_concurrency = config.drafting.default_concurrency,
        "drafting engine ready"
    );

    Ok(AppState {
        config,
        completer,
        operations: Arc::new(OperationRegistry::new()),
        api_token_hash,
    })
}

/// Read the bearer token once and keep only its digest.
fn read_api_token_hash(env_var: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
            Some(hash_token(&token))
        }
        None => {
            tracing::warn!("API bearer-token auth DISABLED, set the {env_var} env var");
            None
        }
    }
}

pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}
