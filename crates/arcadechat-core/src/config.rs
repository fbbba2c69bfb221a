use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::DEFAULT_AGENT_URL;
use crate::error::StoreError;
use crate::extract::{Extractor, DEFAULT_AUTH_URL_PREFIX, DEFAULT_INTEGRATION};

pub const AGENT_URL_ENV: &str = "ARCADECHAT_AGENT_URL";
pub const LOG_ENV: &str = "ARCADECHAT_LOG";

const APP_DIR: &str = "arcadechat";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub agent_url: Option<String>,
    pub auth_url_prefix: Option<String>,
    pub default_integration: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Agent endpoint: env var first, then config file, then the built-in agent.
    pub fn agent_url(&self) -> String {
        self.agent_url_with(std::env::var(AGENT_URL_ENV).ok())
    }

    fn agent_url_with(&self, env_value: Option<String>) -> String {
        env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.agent_url.clone())
            .unwrap_or_else(|| DEFAULT_AGENT_URL.to_string())
    }

    pub fn log_level(&self) -> String {
        std::env::var(LOG_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.log_level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn extractor(&self) -> Extractor {
        Extractor::new(
            self.auth_url_prefix
                .as_deref()
                .unwrap_or(DEFAULT_AUTH_URL_PREFIX),
            self.default_integration
                .as_deref()
                .unwrap_or(DEFAULT_INTEGRATION),
        )
    }

    fn get_config_path() -> Result<PathBuf, StoreError> {
        let config_dir = dirs::config_dir().ok_or(StoreError::NoDataDir("config"))?;
        Ok(config_dir.join(APP_DIR).join("config.json"))
    }
}

/// Per-user directory for history, scores and logs.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir("data"))?;
    Ok(data_dir.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            agent_url: Some("https://agents.example/a1".to_string()),
            default_integration: Some("dropbox".to_string()),
            ..Config::new()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_agent_url_precedence() {
        let config = Config {
            agent_url: Some("https://from-file".to_string()),
            ..Config::new()
        };
        assert_eq!(
            config.agent_url_with(Some("https://from-env".to_string())),
            "https://from-env"
        );
        assert_eq!(config.agent_url_with(Some("  ".to_string())), "https://from-file");
        assert_eq!(Config::new().agent_url_with(None), DEFAULT_AGENT_URL);
    }

    #[test]
    fn test_extractor_uses_configured_integration() {
        let config = Config {
            auth_url_prefix: Some("https://auth.example/".to_string()),
            default_integration: Some("dropbox".to_string()),
            ..Config::new()
        };
        let out = config
            .extractor()
            .extract("Please authorize here: https://auth.example/go");
        assert_eq!(out.structured.unwrap().integration, "dropbox");
    }
}
