// Network Profiles - Application Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Application configuration model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::CONFIG_DIR_NAME;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Retry behaviour for the transient "device not available" failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of consecutive re-issues of the same action.
    /// Unset means retry for as long as the service keeps reporting the
    /// condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable_retries: Option<u32>,

    /// Delay before each re-issue, in milliseconds.
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_unavailable_retries: None,
            retry_delay_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Activation workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Overall deadline for one workflow, in seconds. Zero disables the
    /// watchdog.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Save added/committed profiles to disk rather than memory only.
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            persist: true,
            retry: RetryConfig::default(),
        }
    }
}

impl ActivationConfig {
    /// Watchdog deadline, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Activation workflow settings.
    #[serde(default)]
    pub activation: ActivationConfig,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            activation: ActivationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from the default location, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load {:?}, using defaults: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load configuration from TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| super::Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &Path) -> Result<(), super::Error> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.activation.timeout(), Some(Duration::from_secs(60)));
        assert!(config.activation.persist);
        assert_eq!(config.activation.retry.max_unavailable_retries, None);
        assert_eq!(config.activation.retry.delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            "[activation]\ntimeout_secs = 0\n\n[activation.retry]\nmax_unavailable_retries = 5\n",
        )
        .expect("partial config should parse");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.activation.timeout(), None);
        assert!(config.activation.persist);
        assert_eq!(config.activation.retry.max_unavailable_retries, Some(5));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.log_level = "debug".to_string();
        config.activation.retry.retry_delay_ms = 250;
        config.save_to_file(&path).expect("config should save");

        let loaded = AppConfig::load_from_file(&path).expect("config should load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AppConfig::load_from_file(&dir.path().join("missing.toml"))
            .expect_err("missing file should fail");
        assert!(matches!(err, crate::models::Error::ConfigReadFailed(_)));
    }
}
