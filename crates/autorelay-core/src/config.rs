//! Autorelay configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AutorelayError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutorelayConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl AutorelayConfig {
    /// Load config from the default path (~/.autorelay/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AutorelayError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AutorelayError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".autorelay")
            .join("config.toml")
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Served behind TLS — switches Set-Cookie attributes to
    /// `SameSite=None; Secure` for cross-site session continuity.
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secure_cookies: false,
        }
    }
}

/// Remote API (the proxied third-party service) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://api.example.com".into()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Autorelay/0.2".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Scheduled check-in workflow tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Max bonus-claim attempts per tick.
    #[serde(default = "default_bonus_attempts")]
    pub bonus_attempts: u32,
    /// Lower bound of the randomized pause between bonus claims (seconds).
    #[serde(default = "default_backoff_min")]
    pub backoff_min_secs: u64,
    /// Upper bound (exclusive) of the randomized pause (seconds).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

fn default_bonus_attempts() -> u32 {
    8
}
fn default_backoff_min() -> u64 {
    30
}
fn default_backoff_max() -> u64 {
    40
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            bonus_attempts: default_bonus_attempts(),
            backoff_min_secs: default_backoff_min(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}
