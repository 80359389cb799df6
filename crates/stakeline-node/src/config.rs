//! Node configuration types

use serde::{Deserialize, Serialize};
use stakeline_ledger::LedgerConfig;
use stakeline_storage::Backend;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `STAKELINE__SERVER__LISTEN_ADDR`
pub const ENV_PREFIX: &str = "STAKELINE";

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reward engine tunables
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP listener settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            cors_origins: Vec::new(),
        }
    }
}

/// Storage backend kind
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    RocksDb,
}

/// Storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// RocksDB directory
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/ledger")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn backend(&self) -> Backend {
        match self.backend {
            StorageKind::Memory => Backend::Memory,
            StorageKind::RocksDb => Backend::RocksDb(self.path.clone()),
        }
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl NodeConfig {
    /// Layer an optional TOML file and `STAKELINE__*` environment variables
    /// over the defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .prefix_separator("__")
                .separator("__"),
        );
        let config: NodeConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.storage.backend, StorageKind::RocksDb);
        assert_eq!(config.ledger.commit_retries, 3);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let rendered = NodeConfig::default().to_toml().unwrap();
        let parsed = NodeConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.ledger, LedgerConfig::default());
        assert_eq!(parsed.storage.path, default_db_path());
    }

    #[test]
    fn test_partial_toml() {
        let config = NodeConfig::from_toml(
            r#"
            [storage]
            backend = "memory"

            [ledger]
            referral_link_base = "https://stake.example.org"
            signup_reward = "5"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend(), Backend::Memory);
        assert_eq!(config.ledger.signup_reward.to_string(), "5");
        assert_eq!(config.ledger.commit_retries, 3);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stakeline.toml");
        std::fs::write(&path, "[server]\nlisten_addr = \"127.0.0.1:9000\"\n").unwrap();

        let config = NodeConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");

        let missing = NodeConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(missing.server.listen_addr, "0.0.0.0:8000");
    }
}
