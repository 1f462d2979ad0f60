//! Environment-driven settings for the server and proxy binaries.

use std::path::PathBuf;
use std::str::FromStr;

use crate::{ConfigError, ProxyTable};

/// Settings of the document/chat service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub upload_dir: PathBuf,
    pub python_base_url: String,
    /// Number of concurrent streaming-chat workers.
    pub chat_workers: usize,
    /// Pending streaming-chat jobs accepted before requests are rejected.
    pub chat_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            database_path: "data/docchat.db".into(),
            upload_dir: PathBuf::from("uploads"),
            python_base_url: "http://localhost:8000".into(),
            chat_workers: 3,
            chat_queue_capacity: 100,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            upload_dir: lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            python_base_url: lookup("PYTHON_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.python_base_url),
            chat_workers: positive(&lookup, "CHAT_WORKERS", defaults.chat_workers)?,
            chat_queue_capacity: positive(&lookup, "CHAT_QUEUE_CAPACITY", defaults.chat_queue_capacity)?,
        })
    }
}

/// Settings of the development proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub bind_addr: String,
    pub table: ProxyTable,
    /// Built front-end served for paths no route matches.
    pub static_dir: Option<PathBuf>,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let table = match lookup("PROXY_TABLE") {
            Some(path) => ProxyTable::load(&PathBuf::from(path))?,
            None => ProxyTable::default_table(),
        };
        Ok(Self {
            bind_addr: lookup("PROXY_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:5173".into()),
            table,
            static_dir: lookup("PROXY_STATIC_DIR").map(PathBuf::from),
        })
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => Ok(v),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.chat_workers, 3);
        assert_eq!(config.chat_queue_capacity, 100);
    }

    #[test]
    fn test_server_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("BIND_ADDR", "127.0.0.1:9090"),
            ("PYTHON_BASE_URL", "http://rag:8000/"),
            ("CHAT_WORKERS", "8"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.python_base_url, "http://rag:8000");
        assert_eq!(config.chat_workers, 8);
    }

    #[test]
    fn test_server_rejects_bad_numbers() {
        for value in ["zero", "0", "-1"] {
            let err = ServerConfig::from_lookup(lookup_from(&[("CHAT_QUEUE_CAPACITY", value)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHAT_QUEUE_CAPACITY"));
        }
    }

    #[test]
    fn test_proxy_defaults() {
        let config = ProxyConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5173");
        assert_eq!(config.table, ProxyTable::default_table());
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn test_proxy_missing_table_file() {
        let err = ProxyConfig::from_lookup(lookup_from(&[("PROXY_TABLE", "/nonexistent/proxy.json")])).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
