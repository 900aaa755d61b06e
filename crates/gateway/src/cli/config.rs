use mm_domain::config::{Config, ConfigSeverity};

/// Parse and validate the config, printing any issues.
///
/// Returns false when errors are found so the caller can exit non-zero.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Render the resolved config (with all defaults filled in) as TOML.
///
/// The API key is never printed, only whether one is set inline.
pub fn show(config: &Config) -> anyhow::Result<String> {
    let mut redacted = config.clone();
    if redacted.llm.auth.key.is_some() {
        redacted.llm.auth.key = Some("<redacted>".into());
    }
    toml::to_string_pretty(&redacted).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default(), "config.toml"));
    }

    #[test]
    fn show_redacts_inline_key() {
        let mut config = Config::default();
        config.llm.auth.key = Some("sk-live-123".into());
        let out = show(&config).unwrap();
        assert!(!out.contains("sk-live-123"));
        assert!(out.contains("<redacted>"));
        assert!(out.contains("[drafting]"));
    }
}
