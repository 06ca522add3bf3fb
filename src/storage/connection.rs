//! Connection resource strings in the `host:port/database` convention.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;

/// Location of a database on a document store server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionString {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl ConnectionString {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
        }
    }

    /// Default host and port for `database`.
    pub fn local(database: impl Into<String>) -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, database)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    /// Accepts `host:port/database`, `host/database`, or a bare `database`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (authority, database) = match s.split_once('/') {
            Some((authority, database)) => (authority, database),
            None => ("", s),
        };

        if database.is_empty() || database.contains('/') {
            return Err(Error::InvalidArgument(format!(
                "invalid connection string '{}': expected host:port/database",
                s
            )));
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    Error::InvalidArgument(format!("invalid port '{}': {}", port, e))
                })?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        Ok(Self::new(host, port, database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_convention() {
        assert_eq!(
            ConnectionString::local("Sencha").to_string(),
            "localhost:27017/Sencha"
        );
    }

    #[test]
    fn test_parse_variants() {
        let full: ConnectionString = "db.internal:28017/inventory".parse().unwrap();
        assert_eq!(full, ConnectionString::new("db.internal", 28017, "inventory"));

        let no_port: ConnectionString = "db.internal/inventory".parse().unwrap();
        assert_eq!(no_port.port, DEFAULT_PORT);

        let bare: ConnectionString = "inventory".parse().unwrap();
        assert_eq!(bare, ConnectionString::local("inventory"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("localhost:27017/".parse::<ConnectionString>().is_err());
        assert!("localhost:http/db".parse::<ConnectionString>().is_err());
        assert!("a/b/c".parse::<ConnectionString>().is_err());
    }
}
