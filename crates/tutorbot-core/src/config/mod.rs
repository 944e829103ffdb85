use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration for tutorbot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub line: LineConfig,
    pub store: StoreConfig,
    pub ai: AiConfig,
    pub stripe: StripeConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Check that every secret the service needs at runtime is present.
    /// Secrets have no defaults, so an empty value is always an error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 7] = [
            ("LINE_CHANNEL_SECRET", &self.line.channel_secret),
            ("LINE_CHANNEL_ACCESS_TOKEN", &self.line.channel_access_token),
            ("GAS_WEB_APP_URL", &self.store.endpoint),
            ("OPENAI_API_KEY", &self.ai.api_key),
            ("STRIPE_SECRET_KEY", &self.stripe.secret_key),
            ("STRIPE_PRICE_ID", &self.stripe.price_id),
            ("STRIPE_WEBHOOK_SECRET", &self.stripe.webhook_secret),
        ];

        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
}

/// Spreadsheet automation endpoint (a Google Apps Script web app).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StripeConfig {
    pub secret_key: String,
    pub price_id: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            price_id: String::new(),
            webhook_secret: String::new(),
            success_url: "https://line.me/R/".to_string(),
            cancel_url: "https://line.me/R/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutorbot")
        .join("config.json")
}

/// Load configuration from a JSON file. A missing file yields defaults;
/// an unreadable or unparseable one is an error.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `TUTORBOT_CONFIG` env var: full JSON config
/// 2. Individual env vars, merged on top of the file config
/// 3. File fallback (`~/.tutorbot/config.json` or `config_path`)
pub fn load_config_from_env(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Ok(json) = std::env::var("TUTORBOT_CONFIG") {
        return Ok(serde_json::from_str(&json)?);
    }

    let mut cfg = load_config(config_path)?;
    apply_env_overrides(&mut cfg, |name| std::env::var(name).ok());
    Ok(cfg)
}

/// Overlay individual settings looked up by env var name.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // LINE
    if let Some(v) = lookup("LINE_CHANNEL_SECRET") {
        cfg.line.channel_secret = v;
    }
    if let Some(v) = lookup("LINE_CHANNEL_ACCESS_TOKEN") {
        cfg.line.channel_access_token = v;
    }

    // Record store
    if let Some(v) = lookup("GAS_WEB_APP_URL") {
        cfg.store.endpoint = v;
    }

    // AI
    if let Some(v) = lookup("OPENAI_API_KEY") {
        cfg.ai.api_key = v;
    }
    if let Some(v) = lookup("OPENAI_API_BASE") {
        cfg.ai.api_base = Some(v);
    }
    if let Some(v) = lookup("TUTORBOT_MODEL") {
        cfg.ai.model = v;
    }
    if let Some(v) = lookup("TUTORBOT_MAX_TOKENS") {
        match v.parse() {
            Ok(n) => cfg.ai.max_tokens = n,
            Err(_) => tracing::warn!("Ignoring invalid TUTORBOT_MAX_TOKENS: {}", v),
        }
    }

    // Stripe
    if let Some(v) = lookup("STRIPE_SECRET_KEY") {
        cfg.stripe.secret_key = v;
    }
    if let Some(v) = lookup("STRIPE_PRICE_ID") {
        cfg.stripe.price_id = v;
    }
    if let Some(v) = lookup("STRIPE_WEBHOOK_SECRET") {
        cfg.stripe.webhook_secret = v;
    }
    if let Some(v) = lookup("CHECKOUT_SUCCESS_URL") {
        cfg.stripe.success_url = v;
    }
    if let Some(v) = lookup("CHECKOUT_CANCEL_URL") {
        cfg.stripe.cancel_url = v;
    }

    // Server
    if let Some(v) = lookup("PORT") {
        match v.parse() {
            Ok(p) => cfg.server.port = p,
            Err(_) => tracing::warn!("Ignoring invalid PORT: {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete_config() -> Config {
        let mut cfg = Config::default();
        cfg.line.channel_secret = "secret".to_string();
        cfg.line.channel_access_token = "token".to_string();
        cfg.store.endpoint = "https://script.google.com/macros/s/x/exec".to_string();
        cfg.ai.api_key = "sk-test".to_string();
        cfg.stripe.secret_key = "sk_test_123".to_string();
        cfg.stripe.price_id = "price_123".to_string();
        cfg.stripe.webhook_secret = "whsec_123".to_string();
        cfg
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.ai.model, "gpt-4o-mini");
        assert_eq!(cfg.ai.max_tokens, 500);
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.line.channel_secret.is_empty());
    }

    #[test]
    fn test_validate_lists_every_missing_secret() {
        let err = Config::default().validate().unwrap_err();
        match err {
            ConfigError::Missing(names) => {
                assert_eq!(names.len(), 7);
                assert!(names.contains(&"LINE_CHANNEL_SECRET"));
                assert!(names.contains(&"STRIPE_WEBHOOK_SECRET"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_complete_config() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_whitespace_secret() {
        let mut cfg = complete_config();
        cfg.ai.api_key = "   ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_config_camelcase_compat() {
        let json = r#"{
            "line": { "channelSecret": "s", "channelAccessToken": "t" },
            "ai": { "apiKey": "sk-1", "maxTokens": 800 },
            "stripe": { "priceId": "price_1", "successUrl": "https://example.com/ok" }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.line.channel_secret, "s");
        assert_eq!(cfg.ai.max_tokens, 800);
        assert_eq!(cfg.ai.model, "gpt-4o-mini");
        assert_eq!(cfg.stripe.price_id, "price_1");
        assert_eq!(cfg.stripe.success_url, "https://example.com/ok");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LINE_CHANNEL_SECRET", "line-secret"),
            ("GAS_WEB_APP_URL", "https://gas.example/exec"),
            ("STRIPE_PRICE_ID", "price_abc"),
            ("TUTORBOT_MAX_TOKENS", "not-a-number"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.line.channel_secret, "line-secret");
        assert_eq!(cfg.store.endpoint, "https://gas.example/exec");
        assert_eq!(cfg.stripe.price_id, "price_abc");
        assert_eq!(cfg.ai.max_tokens, 500);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_load_config_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"store": {"endpoint": "https://gas.example/exec"}}"#).unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.store.endpoint, "https://gas.example/exec");
    }

    #[test]
    fn test_load_config_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&tmp.path().join("absent.json"))).unwrap();
        assert_eq!(cfg.ai.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_config_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Parse(_))));
    }
}
