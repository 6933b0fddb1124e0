//! Configuration for timeouts and protection rules.
//!
//! Stored as JSON at `~/.portsweep/config.json`. Every key is optional; a
//! missing key or a missing file gives the default.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::ProtectionPolicy;
use crate::error::{Error, Result};

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Bound on one run of the diagnostic command.
    #[serde(default = "default_diagnostic_timeout_ms")]
    pub diagnostic_timeout_ms: u64,

    /// How long diagnostic output is reused.
    #[serde(default = "default_diagnostic_cache_ttl_ms")]
    pub diagnostic_cache_ttl_ms: u64,

    /// Wait between SIGTERM and SIGKILL.
    #[serde(default = "default_kill_grace_period_ms")]
    pub kill_grace_period_ms: u64,

    /// Bound on waiting for a terminated process to exit.
    #[serde(default = "default_exit_wait_ms")]
    pub exit_wait_ms: u64,

    /// Bound on the elevated kill command, prompt included.
    #[serde(default = "default_elevated_kill_timeout_ms")]
    pub elevated_kill_timeout_ms: u64,

    /// Names protected in addition to the platform's own list.
    #[serde(default)]
    pub extra_protected_names: Vec<String>,
}

fn default_diagnostic_timeout_ms() -> u64 {
    8000
}

fn default_diagnostic_cache_ttl_ms() -> u64 {
    1000
}

fn default_kill_grace_period_ms() -> u64 {
    500
}

fn default_exit_wait_ms() -> u64 {
    5000
}

fn default_elevated_kill_timeout_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            diagnostic_timeout_ms: default_diagnostic_timeout_ms(),
            diagnostic_cache_ttl_ms: default_diagnostic_cache_ttl_ms(),
            kill_grace_period_ms: default_kill_grace_period_ms(),
            exit_wait_ms: default_exit_wait_ms(),
            elevated_kill_timeout_ms: default_elevated_kill_timeout_ms(),
            extra_protected_names: Vec::new(),
        }
    }
}

impl Config {
    pub fn diagnostic_timeout(&self) -> Duration {
        Duration::from_millis(self.diagnostic_timeout_ms)
    }

    pub fn diagnostic_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.diagnostic_cache_ttl_ms)
    }

    pub fn kill_grace_period(&self) -> Duration {
        Duration::from_millis(self.kill_grace_period_ms)
    }

    pub fn exit_wait(&self) -> Duration {
        Duration::from_millis(self.exit_wait_ms)
    }

    pub fn elevated_kill_timeout(&self) -> Duration {
        Duration::from_millis(self.elevated_kill_timeout_ms)
    }

    /// Platform protection policy plus the configured extra names.
    pub fn protection_policy(&self) -> ProtectionPolicy {
        ProtectionPolicy::platform_default().with_extra_names(self.extra_protected_names.iter().cloned())
    }
}

/// Configuration store for reading and writing settings.
///
/// Handles reading and writing configuration to `~/.portsweep/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.portsweep/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            config_path: home.join(".portsweep").join("config.json"),
        })
    }

    /// Create a config store with a custom path (for testing).
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist. The file is written
    /// to a temporary path and renamed into place.
    pub async fn save(&self, config: &Config) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(config)?;
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }

    /// Add a name to the extra protected list.
    pub async fn add_protected_name(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Config("Protected name must not be empty".to_string()));
        }

        let mut config = self.load().await?;
        if !config
            .extra_protected_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
        {
            config.extra_protected_names.push(name.to_string());
            config.extra_protected_names.sort();
        }
        self.save(&config).await
    }

    /// Remove a name from the extra protected list.
    pub async fn remove_protected_name(&self, name: &str) -> Result<()> {
        let mut config = self.load().await?;
        config
            .extra_protected_names
            .retain(|n| !n.eq_ignore_ascii_case(name.trim()));
        self.save(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store();
        let config = store.load().await.unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.diagnostic_timeout(), Duration::from_secs(8));
        assert_eq!(config.diagnostic_cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.kill_grace_period(), Duration::from_millis(500));
        assert_eq!(config.exit_wait(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _dir) = test_store();

        let config = Config {
            diagnostic_timeout_ms: 2000,
            diagnostic_cache_ttl_ms: 250,
            kill_grace_period_ms: 100,
            exit_wait_ms: 1500,
            elevated_kill_timeout_ms: 60_000,
            extra_protected_names: vec!["postgres".to_string()],
        };

        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let (store, _dir) = test_store();
        fs::create_dir_all(store.config_path().parent().unwrap())
            .await
            .unwrap();
        fs::write(store.config_path(), r#"{ "exitWaitMs": 750 }"#)
            .await
            .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.exit_wait_ms, 750);
        assert_eq!(config.diagnostic_timeout_ms, 8000);
        assert!(config.extra_protected_names.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_config_error() {
        let (store, _dir) = test_store();
        fs::create_dir_all(store.config_path().parent().unwrap())
            .await
            .unwrap();
        fs::write(store.config_path(), "not json").await.unwrap();

        assert!(matches!(store.load().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_protected_names() {
        let (store, _dir) = test_store();

        store.add_protected_name("postgres").await.unwrap();
        store.add_protected_name("Postgres").await.unwrap();
        store.add_protected_name("redis-server").await.unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.extra_protected_names, vec!["postgres", "redis-server"]);
        assert!(config.protection_policy().is_protected_name("POSTGRES"));

        store.remove_protected_name("postgres").await.unwrap();
        let config = store.load().await.unwrap();
        assert_eq!(config.extra_protected_names, vec!["redis-server"]);

        assert!(store.add_protected_name("  ").await.is_err());
    }
}
