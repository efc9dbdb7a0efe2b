use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::module::supply::Provider;

/// Environment variable that overrides `base_url`
pub const BASE_URL_ENV: &str = "BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Public origin used for absolute links in frame documents
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub provider: Provider,

    /// Overrides the provider's default endpoint
    #[serde(default)]
    pub upstream_url: Option<String>,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Rolled log files older than this are removed
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_enable_cors() -> bool {
    true
}

fn default_log_retention_days() -> u64 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            base_url: None,
            provider: Provider::default(),
            upstream_url: None,
            upstream_timeout_secs: default_upstream_timeout_secs(),
            enable_cors: default_enable_cors(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

impl TrackerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: TrackerConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// `BASE_URL` in the environment always wins over the file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::load_with_base_url(path, std::env::var(BASE_URL_ENV).ok())
    }

    /// As [`load`](Self::load), with the environment's base URL passed in.
    pub fn load_with_base_url(
        path: impl AsRef<Path>,
        env_base_url: Option<String>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if let Some(base_url) = env_base_url.filter(|url| !url.trim().is_empty()) {
            config.base_url = Some(base_url);
        }

        config.base_url = config
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn log_retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.log_retention_days.max(1) * 24 * 60 * 60)
    }

    pub fn upstream_url(&self) -> &str {
        self.upstream_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_url())
    }
}

pub static CONFIG: OnceLock<TrackerConfig> = OnceLock::new();

pub fn read_config() -> anyhow::Result<()> {
    let path = "config.toml";
    let config = TrackerConfig::load(path)?;

    CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Configuration already initialized"))?;

    Ok(())
}
