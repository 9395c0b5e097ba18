//! Agent configuration
//!
//! Connection details are passed explicitly to the client; nothing is kept
//! in process-wide state. Values come from a YAML/JSON settings file, from
//! `ANZO_*` environment variables, or from CLI flags.

use crate::contracts::ArtifactId;
use crate::engine::{MonitorConfig, PollerConfig, ReloadTarget};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Connection settings for the artifact service
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server: String,

    #[serde(default = "default_port")]
    pub port: String,

    pub username: String,

    pub password: String,

    #[serde(default = "default_https")]
    pub https: bool,

    /// Self-signed certificates are common on these servers
    #[serde(default)]
    pub verify_ssl: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_port() -> String {
    "8443".to_string()
}

fn default_https() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    180
}

impl ClientConfig {
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: default_port(),
            username: username.into(),
            password: password.into(),
            https: default_https(),
            verify_ssl: false,
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    /// Read `ANZO_SERVER`, `ANZO_USERNAME`, `ANZO_PASSWORD` and the optional
    /// `ANZO_PORT`, `ANZO_HTTPS`, `ANZO_VERIFY_SSL`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let mut config = Self::new(
            required("ANZO_SERVER")?,
            required("ANZO_USERNAME")?,
            required("ANZO_PASSWORD")?,
        );
        if let Some(port) = lookup("ANZO_PORT") {
            config.port = port;
        }
        if let Some(https) = lookup("ANZO_HTTPS") {
            config.https = parse_bool("ANZO_HTTPS", &https)?;
        }
        if let Some(verify) = lookup("ANZO_VERIFY_SSL") {
            config.verify_ssl = parse_bool("ANZO_VERIFY_SSL", &verify)?;
        }
        Ok(config)
    }

    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    /// `{scheme}://{server}:{port}`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.server, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("server must not be empty".to_string()));
        }
        if self.port.parse::<u16>().is_err() {
            return Err(ConfigError::Invalid(format!("port '{}' is not a number", self.port)));
        }
        if self.username.is_empty() {
            return Err(ConfigError::Invalid("username must not be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("https", &self.https)
            .field("verify_ssl", &self.verify_ssl)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{key}={other} is not a boolean"))),
    }
}

/// Settings file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,

    /// Artifacts to check or monitor
    #[serde(default)]
    pub graphmarts: Vec<ArtifactId>,

    /// Artifacts to reload, in dependency order
    #[serde(default)]
    pub reload_plan: Vec<ReloadTarget>,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Settings {
    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Client config from the file, falling back to the environment
    pub fn client_or_env(&self) -> Result<ClientConfig, ConfigError> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => ClientConfig::from_env(),
        }
    }

    /// Client config with command-line values applied over it
    pub fn resolve_client(&self, overrides: &ClientOverrides) -> Result<ClientConfig, ConfigError> {
        overrides.apply(self.client_or_env())
    }
}

/// Connection values given on the command line
#[derive(Clone, Default)]
pub struct ClientOverrides {
    pub server: Option<String>,
    pub port: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub plain_http: bool,
}

impl ClientOverrides {
    /// Overlay onto `base`. A missing base is only an error when server,
    /// username and password are not all given here.
    pub fn apply(
        &self,
        base: Result<ClientConfig, ConfigError>,
    ) -> Result<ClientConfig, ConfigError> {
        let mut config = match (base, &self.server, &self.username, &self.password) {
            (Ok(config), _, _, _) => config,
            (Err(ConfigError::Missing(_)), Some(server), Some(username), Some(password)) => {
                ClientConfig::new(server, username, password)
            }
            (Err(e), _, _, _) => return Err(e),
        };
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if self.plain_http {
            config.https = false;
        }
        config.validate()?;
        Ok(config)
    }
}
