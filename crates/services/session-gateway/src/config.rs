//! Configuration for the Session Gateway
//!
//! Configuration can be loaded from a TOML file and/or environment variables.
//! It is read once at startup and handed to the router; request handling
//! never consults the process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the Session Gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// API key configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Session query behavior
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per session
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("/var/app/sessions")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
        }
    }
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Comma-separated list of accepted keys. Empty disables enforcement.
    #[serde(default)]
    pub api_keys: String,
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted upload body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// How `GET /sessions/:id` answers for a session directory that does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSessionPolicy {
    /// Respond 200 with an empty file map
    #[default]
    Empty,
    /// Respond 404
    NotFound,
}

impl std::str::FromStr for MissingSessionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "not_found" | "not-found" | "404" => Ok(Self::NotFound),
            other => Err(ConfigError::Parse(format!(
                "unknown missing-session policy: {}",
                other
            ))),
        }
    }
}

/// Session query behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub missing_session: MissingSessionPolicy,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults plus whatever `lookup` returns
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_overrides(lookup);
        config
    }

    /// Apply environment-style overrides on top of the current values
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("HTTP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid HTTP_PORT"),
            }
        }

        // Storage
        if let Some(dir) = lookup("SESSIONS_DIR") {
            self.storage.sessions_dir = PathBuf::from(dir);
        }

        // Auth
        if let Some(keys) = lookup("API_KEY") {
            self.auth.api_keys = keys;
        }

        // Limits
        if let Some(max) = lookup("MAX_UPLOAD_BYTES") {
            match max.parse() {
                Ok(m) => self.limits.max_upload_bytes = m,
                Err(_) => tracing::warn!(value = %max, "ignoring invalid MAX_UPLOAD_BYTES"),
            }
        }

        // Sessions
        if let Some(policy) = lookup("MISSING_SESSION_POLICY") {
            match policy.parse() {
                Ok(p) => self.sessions.missing_session = p,
                Err(e) => tracing::warn!(error = %e, "ignoring MISSING_SESSION_POLICY"),
            }
        }
    }

    /// Load configuration from file if it exists, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                let mut config = Self::from_file(p)?;
                config.apply_overrides(|key| std::env::var(key).ok());
                return Ok(config);
            }
        }
        Ok(Self::from_env())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
