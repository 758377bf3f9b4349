//! Runtime configuration, loaded from environment variables via the `config`
//! crate with defaults suitable for local development.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::SoulBrowserError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// URL the browser navigates to when a session starts.
    pub start_url: String,
    /// Domains an action may navigate to without triggering a guardrail pause.
    pub allowed_domains: Vec<String>,
    /// Keywords that, when matched against an action's target label, force a
    /// CONFIRM pause before the action executes.
    pub require_confirmation_keywords: Vec<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub llm_api_key: String,
    pub listen_port: u16,
    pub db_path: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            start_url: "about:blank".to_string(),
            allowed_domains: Vec::new(),
            require_confirmation_keywords: vec![
                "delete".to_string(),
                "purchase".to_string(),
                "pay".to_string(),
                "submit".to_string(),
            ],
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            llm_api_key: String::new(),
            listen_port: 8787,
            db_path: PathBuf::from("./data/soulbrowser.db"),
            artifacts_dir: PathBuf::from("./data/artifacts"),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from `SOULBROWSER_*` environment variables,
    /// falling back to [`RuntimeConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self, SoulBrowserError> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("start_url", defaults.start_url.clone())
            .map_err(config_err)?
            .set_default("allowed_domains", Vec::<String>::new())
            .map_err(config_err)?
            .set_default(
                "require_confirmation_keywords",
                defaults.require_confirmation_keywords.clone(),
            )
            .map_err(config_err)?
            .set_default("headless", defaults.headless)
            .map_err(config_err)?
            .set_default("viewport_width", defaults.viewport_width)
            .map_err(config_err)?
            .set_default("viewport_height", defaults.viewport_height)
            .map_err(config_err)?
            .set_default("llm_api_key", defaults.llm_api_key.clone())
            .map_err(config_err)?
            .set_default("listen_port", defaults.listen_port as i64)
            .map_err(config_err)?
            .set_default("db_path", defaults.db_path.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default(
                "artifacts_dir",
                defaults.artifacts_dir.to_string_lossy().to_string(),
            )
            .map_err(config_err)?
            .add_source(
                config::Environment::with_prefix("SOULBROWSER")
                    .separator("_")
                    .list_separator(",")
                    .with_list_parse_key("allowed_domains")
                    .with_list_parse_key("require_confirmation_keywords")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        settings
            .try_deserialize::<RuntimeConfigRaw>()
            .map(RuntimeConfigRaw::into_config)
            .map_err(config_err)
    }
}

// `config` deserializes path fields most reliably as strings; this mirrors
// that and converts once at the boundary.
#[derive(Debug, Deserialize)]
struct RuntimeConfigRaw {
    start_url: String,
    allowed_domains: Vec<String>,
    require_confirmation_keywords: Vec<String>,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    llm_api_key: String,
    listen_port: u16,
    db_path: String,
    artifacts_dir: String,
}

impl RuntimeConfigRaw {
    fn into_config(self) -> RuntimeConfig {
        RuntimeConfig {
            start_url: self.start_url,
            allowed_domains: self.allowed_domains,
            require_confirmation_keywords: self.require_confirmation_keywords,
            headless: self.headless,
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            llm_api_key: self.llm_api_key,
            listen_port: self.listen_port,
            db_path: PathBuf::from(self.db_path),
            artifacts_dir: PathBuf::from(self.artifacts_dir),
        }
    }
}

fn config_err(err: config::ConfigError) -> SoulBrowserError {
    SoulBrowserError::validation_error("invalid runtime configuration", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.listen_port, 8787);
        assert!(cfg.headless);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("SOULBROWSER_START_URL", "https://example.com");
        std::env::set_var("SOULBROWSER_ALLOWED_DOMAINS", "example.com,example.org");
        let cfg = RuntimeConfig::from_env().expect("config loads");
        assert_eq!(cfg.start_url, "https://example.com");
        assert_eq!(
            cfg.allowed_domains,
            vec!["example.com".to_string(), "example.org".to_string()]
        );
        std::env::remove_var("SOULBROWSER_START_URL");
        std::env::remove_var("SOULBROWSER_ALLOWED_DOMAINS");
    }
}
