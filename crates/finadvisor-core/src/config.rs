use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::ai::RetryPolicy;
use crate::provider::Provider;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_PROFILE_URL: &str = "http://localhost:5000";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub backend_url: Option<String>,
    pub profile_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub chat_max_retries: Option<u32>,
    pub chat_retry_delay_ms: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some("gemini".to_string()),
            ..Self::default()
        }
    }

    /// Load the config, writing the defaults out on first run so there is a
    /// file to edit.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::get_config_path()?)
    }

    fn load_or_create_at(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load_from(config_path);
        }
        let config = Self::new();
        config.save_to(config_path)?;
        Ok(config)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("finadvisor"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Gemini)
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    // Environment first, then the config file
    pub fn gemini_api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY").ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }

    pub fn openai_api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY").ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.openai_api_key.clone())
    }

    pub fn backend_url(&self) -> String {
        std::env::var("FINADVISOR_BACKEND_URL").ok()
            .filter(|u| !u.is_empty())
            .or_else(|| self.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn profile_url(&self) -> String {
        self.profile_url.clone().unwrap_or_else(|| DEFAULT_PROFILE_URL.to_string())
    }

    pub fn ollama_url(&self) -> String {
        self.ollama_url.clone().unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    pub fn poll_interval(&self) -> Duration {
        let ms = self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        Duration::from_millis(ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.chat_max_retries.unwrap_or(default.max_retries),
            base_delay: self
                .chat_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.base_delay),
        }
    }
}
