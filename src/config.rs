//! Proxy configuration
//!
//! Settings come from built-in defaults, an optional configuration file
//! (TOML, YAML or JSON, chosen by extension) and `PHOTON_PROXY_*` environment
//! variables, later sources overriding earlier ones.

use crate::error::{Error, Result};
use crate::storage::ConnectionString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `PHOTON_PROXY_DATABASE`.
pub const ENV_PREFIX: &str = "PHOTON_PROXY";

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Database to open collections from
    pub database: String,
    /// Collection name; derived from the model name when unset
    pub table: Option<String>,
    /// Store host
    pub host: String,
    /// Store port
    pub port: u16,
    /// chrono format for date fields without their own format
    pub default_date_format: String,
    /// Per-command timeout (milliseconds)
    pub command_timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            database: "Sencha".to_string(),
            table: None,
            host: crate::storage::connection::DEFAULT_HOST.to_string(),
            port: crate::storage::connection::DEFAULT_PORT,
            default_date_format: "%Y-%m-%d %H:%M:%S%.6f".to_string(),
            command_timeout_ms: 30_000,
        }
    }
}

impl ProxyConfig {
    /// Load defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// `host:port/database` for this configuration.
    pub fn connection_string(&self) -> ConnectionString {
        ConnectionString::new(&self.host, self.port, &self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.database, "Sencha");
        assert_eq!(config.table, None);
        assert_eq!(config.connection_string().to_string(), "localhost:27017/Sencha");
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "database = \"inventory\"\ntable = \"items\"\nport = 28017\ncommand_timeout_ms = 250"
        )
        .unwrap();

        let config = ProxyConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database, "inventory");
        assert_eq!(config.table.as_deref(), Some("items"));
        assert_eq!(config.port, 28017);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.command_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_builders_feed_connection_string() {
        let config = ProxyConfig::default()
            .with_database("archive")
            .with_table("orders")
            .with_command_timeout(Duration::from_millis(1500));
        assert_eq!(config.connection_string().to_string(), "localhost:27017/archive");
        assert_eq!(config.table.as_deref(), Some("orders"));
        assert_eq!(config.command_timeout_ms, 1500);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = ProxyConfig::load(Some(Path::new("/nonexistent/proxy.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
