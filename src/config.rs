use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PRO_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_THINKING_BUDGET: u32 = 32768;

/// Environment variables checked for the API key, in order
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub fast_model: String,
    pub pro_model: String,
    pub thinking_budget: u32,
    pub default_thinking_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            pro_model: DEFAULT_PRO_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            default_thinking_mode: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    pub fn save_thinking_mode(enabled: bool) -> Result<()> {
        let mut config = Self::load().unwrap_or_default();
        config.default_thinking_mode = enabled;
        config.save()
    }

    /// Environment first, then the config file
    pub fn resolve_api_key(&self) -> Option<String> {
        Self::env_api_key().or_else(|| {
            self.api_key
                .as_ref()
                .filter(|k| !k.trim().is_empty())
                .cloned()
        })
    }

    /// Where the key came from: "env", "config", or None
    pub fn key_source(&self) -> Option<&'static str> {
        if Self::env_api_key().is_some() {
            Some("env")
        } else if self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            Some("config")
        } else {
            None
        }
    }

    fn env_api_key() -> Option<String> {
        API_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|k| !k.trim().is_empty())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("study-helper"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "pro_model": "gemini-exp", "default_thinking_mode": true }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pro_model, "gemini-exp");
        assert!(config.default_thinking_mode);
        assert_eq!(config.fast_model, DEFAULT_FAST_MODEL);
        assert_eq!(config.thinking_budget, DEFAULT_THINKING_BUDGET);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
