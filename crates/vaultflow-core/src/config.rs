use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VaultflowError};

/// Top-level configuration for Vaultflow.
///
/// Loaded from `~/.vaultflow/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultflowConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default = "default_rate_limits")]
    pub rate_limits: BTreeMap<String, u32>,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub watchers: WatcherSettings,
    #[serde(default)]
    pub record_store: RecordStoreSettings,
    #[serde(default)]
    pub mail: MailSettings,
}

impl Default for VaultflowConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            rate_limits: default_rate_limits(),
            circuit_breaker: CircuitBreakerSettings::default(),
            watchers: WatcherSettings::default(),
            record_store: RecordStoreSettings::default(),
            mail: MailSettings::default(),
        }
    }
}

impl VaultflowConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VaultflowConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VaultflowError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

fn default_rate_limits() -> BTreeMap<String, u32> {
    BTreeMap::from([
        ("send_email".to_string(), 50),
        ("post_facebook_page".to_string(), 25),
    ])
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Vault root holding Inbox, Needs_Action, Plans, ... folders.
    pub vault_root: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Seconds between reasoning passes while watching.
    pub reasoning_interval_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            vault_root: "~/.vaultflow/vault".to_string(),
            log_level: "info".to_string(),
            reasoning_interval_secs: 300,
        }
    }
}

/// Thresholds for the per-integration circuit breakers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Seconds an open breaker waits before allowing a trial call.
    pub timeout_secs: u64,
    /// Consecutive half-open successes needed to close again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_secs: 60,
            success_threshold: 3,
        }
    }
}

/// Folder watcher settings shared by all watchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    pub debounce_secs: u64,
    /// Consecutive processing errors before a watcher reports circuit_open.
    pub max_errors: u32,
    /// Scan interval of the polling event source.
    pub poll_interval_ms: u64,
    pub file_pattern: String,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            debounce_secs: 2,
            max_errors: 5,
            poll_interval_ms: 500,
            file_pattern: "*.md".to_string(),
        }
    }
}

/// Advisory lock tuning for record files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordStoreSettings {
    pub lock_timeout_ms: u64,
    pub lock_poll_ms: u64,
}

impl Default for RecordStoreSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            lock_poll_ms: 100,
        }
    }
}

/// Inbound mail intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_secs: 300,
        }
    }
}
