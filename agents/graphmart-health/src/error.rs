//! Error types for the Graphmart Health Agent
//!
//! Fetch errors are recoverable and never escape classification or
//! aggregation. Readiness errors are terminal for one wait call.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single call to the artifact service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS, TLS or request timeout failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        FetchError::Network(msg.into())
    }

    /// Short label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Server { .. } => "server",
            FetchError::Auth(_) => "auth",
            FetchError::Parse(_) => "parse",
        }
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Terminal failure of a readiness wait
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    /// Deadline passed without the artifact coming online
    #[error("Graphmart {title} not ready after {} seconds, final status: {last_status}", .timeout.as_secs())]
    Timeout {
        title: String,
        timeout: Duration,
        last_status: String,
    },

    /// Online, but some layers failed
    #[error("Graphmart {title} has {count} failed layers")]
    FailedLayers {
        title: String,
        count: u32,
        last_status: String,
    },

    /// Online, but some layers are stale
    #[error("Graphmart {title} has {count} dirty layers")]
    DirtyLayers {
        title: String,
        count: u32,
        last_status: String,
    },

    /// A fetch outside the retry loop failed
    #[error("Graphmart {title} status unavailable: {source}")]
    Transport {
        title: String,
        last_status: String,
        #[source]
        source: FetchError,
    },
}

impl ReadinessError {
    pub fn title(&self) -> &str {
        match self {
            ReadinessError::Timeout { title, .. }
            | ReadinessError::FailedLayers { title, .. }
            | ReadinessError::DirtyLayers { title, .. }
            | ReadinessError::Transport { title, .. } => title,
        }
    }

    pub fn last_status(&self) -> &str {
        match self {
            ReadinessError::Timeout { last_status, .. }
            | ReadinessError::FailedLayers { last_status, .. }
            | ReadinessError::DirtyLayers { last_status, .. }
            | ReadinessError::Transport { last_status, .. } => last_status,
        }
    }
}

/// Failure reported by a report observer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Observer error: {0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(msg: impl Into<String>) -> Self {
        ObserverError(msg.into())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReadinessError::Timeout {
            title: "Sales".to_string(),
            timeout: Duration::from_secs(60),
            last_status: "Activating".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Graphmart Sales not ready after 60 seconds, final status: Activating"
        );

        let err = ReadinessError::FailedLayers {
            title: "Sales".to_string(),
            count: 2,
            last_status: "Online".to_string(),
        };
        assert_eq!(err.to_string(), "Graphmart Sales has 2 failed layers");
        assert_eq!(err.title(), "Sales");
        assert_eq!(err.last_status(), "Online");
    }

    #[test]
    fn test_fetch_error_kind() {
        assert_eq!(FetchError::network("refused").kind(), "network");
        assert_eq!(
            FetchError::Server {
                status: 503,
                message: "down".into()
            }
            .to_string(),
            "Server error 503: down"
        );
    }
}
