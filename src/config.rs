//! Runtime configuration shared by the CLI and the server binary

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV: &str = "FEE_LEDGER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite store file
    pub store_path: PathBuf,

    /// Address the server binary binds (sync + API)
    pub listen_addr: String,

    /// Peer used by `sync` when none is given on the command line
    pub remote_url: Option<String>,

    /// Per-request timeout for the sync client (seconds)
    pub request_timeout_secs: u64,

    /// Largest store accepted by POST /db
    pub max_snapshot_bytes: usize,

    /// tracing EnvFilter directive, used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("fee_ledger.db"),
            listen_addr: "0.0.0.0:8000".to_string(),
            remote_url: None,
            request_timeout_secs: 30,
            max_snapshot_bytes: 64 * 1024 * 1024,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file; missing keys fall back to defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults overridden by `FEE_LEDGER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `$FEE_LEDGER_CONFIG` if set, else the environment
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from(path),
            Err(_) => Self::from_env(),
        }
    }

    /// TOML file at `path`, then `FEE_LEDGER_*` overrides on top
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_from_with(path, |key| std::env::var(key).ok())
    }

    fn load_from_with(
        path: impl AsRef<Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env(lookup)?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = lookup("FEE_LEDGER_STORE") {
            self.store_path = PathBuf::from(path);
        }

        if let Some(addr) = lookup("FEE_LEDGER_LISTEN") {
            self.listen_addr = addr;
        }

        if let Some(remote) = lookup("FEE_LEDGER_REMOTE") {
            self.remote_url = Some(remote);
        }

        if let Some(raw) = lookup("FEE_LEDGER_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("FEE_LEDGER_TIMEOUT_SECS", &raw)?;
        }

        if let Some(raw) = lookup("FEE_LEDGER_MAX_SNAPSHOT_BYTES") {
            self.max_snapshot_bytes = parse_env("FEE_LEDGER_MAX_SNAPSHOT_BYTES", &raw)?;
        }

        if let Some(filter) = lookup("FEE_LEDGER_LOG") {
            self.log_filter = filter;
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            store_path = "/var/lib/fees/school.db"
            remote_url = "http://192.168.1.20:8000"
            "#,
        )
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/var/lib/fees/school.db"));
        assert_eq!(config.remote_url.as_deref(), Some("http://192.168.1.20:8000"));
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = Config::from_toml("request_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FEE_LEDGER_STORE", "other.db"),
            ("FEE_LEDGER_TIMEOUT_SECS", "5"),
            ("FEE_LEDGER_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store_path, PathBuf::from("other.db"));
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.max_snapshot_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_file_then_env_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fees.toml");
        std::fs::write(
            &path,
            "store_path = \"from_file.db\"\nlisten_addr = \"127.0.0.1:9000\"\n",
        )
        .unwrap();

        let config = Config::load_from_with(&path, |key| {
            (key == "FEE_LEDGER_STORE").then(|| "from_env.db".to_string())
        })
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("from_env.db"));
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load_from_with("/nonexistent/fees.toml", |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_env_rejects_garbage_numbers() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == "FEE_LEDGER_MAX_SNAPSHOT_BYTES").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
