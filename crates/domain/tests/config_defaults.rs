use mm_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn empty_file_yields_production_drafting_settings() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.drafting.default_concurrency, 5);
    assert_eq!(config.drafting.max_retries, 5);
    assert_eq!(config.drafting.heartbeat_secs, 15);
    assert_eq!(config.llm.base_url, "https://openrouter.ai/api/v1");
}

#[test]
fn drafting_allow_list_parses() {
    let toml_str = r#"
[drafting]
allowed_models = ["m1", "m2"]
default_concurrency = 3

[llm.auth]
key = "sk-test"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.drafting.allowed_models, vec!["m1", "m2"]);
    assert_eq!(config.drafting.default_model(), "m1");
    assert_eq!(config.drafting.default_concurrency, 3);
    assert_eq!(config.llm.auth.key.as_deref(), Some("sk-test"));
    assert!(config.llm.auth.env.is_none());
}

#[test]
fn config_roundtrips_through_toml() {
    let config = Config::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.drafting.allowed_models, config.drafting.allowed_models);
    assert_eq!(parsed.server.port, config.server.port);
}
