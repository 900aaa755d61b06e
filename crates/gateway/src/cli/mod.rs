pub mod config;
pub mod generate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mm_domain::config::Config;

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "MURMUR_CONFIG";

/// Murmur Drafts: bulk outreach email drafting over streamed LLM calls.
#[derive(Debug, Parser)]
#[command(name = "murmur-drafts", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve {
        /// Answer every draft with canned text instead of calling a provider.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one generation request from a JSON file and print its events.
    Generate {
        /// Path to a request body (same shape as POST /v1/drafts/generate).
        request: PathBuf,
        /// Answer every draft with canned text instead of calling a provider.
        #[arg(long)]
        dry_run: bool,
        /// Print one JSON object per event instead of a readable summary.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `MURMUR_CONFIG` (or
/// `config.toml` by default), then apply environment overrides. Returns
/// the parsed [`Config`] and the path that was used.
///
/// A missing file is not an error: every field has a default.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into());

    let mut config: Config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };
    config.apply_env_overrides(|name| std::env::var(name).ok());

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["murmur-drafts"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn generate_flags_parse() {
        let cli =
            Cli::try_parse_from(["murmur-drafts", "generate", "req.json", "--dry-run", "--json"])
                .unwrap();
        match cli.command {
            Some(Command::Generate { request, dry_run, json }) => {
                assert_eq!(request, PathBuf::from("req.json"));
                assert!(dry_run && json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_validate_parses() {
        let cli = Cli::try_parse_from(["murmur-drafts", "config", "validate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Validate))));
    }
}
