//! AutoScore configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScoreConfig {
    /// Data directory holding the `automatic/` and `script/` namespaces.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Rule document file name inside the `automatic` namespace.
    #[serde(default = "default_rules_file")]
    pub rules_file: String,
    /// Settings-store key used as the degraded-mode fallback.
    #[serde(default = "default_settings_key")]
    pub settings_key: String,
    /// Default tracing filter when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_data_dir() -> PathBuf {
    AutoScoreConfig::home_dir().join("data")
}
fn default_rules_file() -> String {
    "auto_score_rules.json".into()
}
fn default_settings_key() -> String {
    "auto_score_rules".into()
}
fn default_log_filter() -> String {
    "autoscore=info".into()
}

impl Default for AutoScoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rules_file: default_rules_file(),
            settings_key: default_settings_key(),
            log_filter: default_log_filter(),
        }
    }
}

impl AutoScoreConfig {
    /// Load config from the default path (~/.autoscore/config.toml).
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
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AutoScoreError::Config(format!("Failed to read config: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::AutoScoreError::Config(format!("Failed to parse config: {e}"))
        })?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::AutoScoreError::Config(format!("Failed to serialize config: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the AutoScore home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".autoscore")
    }
}
