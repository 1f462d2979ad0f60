//! Configuration for docchat: the development proxy table and the
//! environment-driven settings of the server and proxy binaries.

mod proxy;
mod settings;

pub use proxy::{ProxyRoute, ProxyTable, Rewrite};
pub use settings::{ProxyConfig, ServerConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid proxy route {prefix}: {reason}")]
    InvalidRoute { prefix: String, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
