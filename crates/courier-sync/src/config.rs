//! # Client Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     COURIER_API_URL=https://api.example.com                            │
//! │     COURIER_SOCKET_URL=wss://api.example.com                           │
//! │     COURIER_DB_PATH=/tmp/courier.db                                    │
//! │     COURIER_REQUEST_TIMEOUT_SECS=20                                    │
//! │     COURIER_LOCATION_INTERVAL_SECS=15                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/courier/courier.toml (Linux)                             │
//! │     ~/Library/Application Support/com.courier.client/courier.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! base_url = "https://api.example.com"
//! # request_timeout_secs = 20   # unset = HTTP client default
//!
//! [socket]
//! url = "wss://api.example.com"
//! connect_timeout_secs = 10
//! initial_backoff_ms = 500
//! max_backoff_secs = 60
//!
//! [storage]
//! # db_path = "/custom/courier.db"
//!
//! [location]
//! interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Sections
// =============================================================================

/// REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Per-request timeout. `None` keeps the HTTP client default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_api_url(),
            request_timeout_secs: None,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Notification socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketSettings {
    /// Server origin; the Socket.IO path is appended when missing.
    #[serde(default = "default_socket_url")]
    pub url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Reconnect attempts before giving up (0 = infinite).
    #[serde(default)]
    pub max_retries: u32,
}

fn default_socket_url() -> String {
    "ws://localhost:3000".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for SocketSettings {
    fn default() -> Self {
        SocketSettings {
            url: default_socket_url(),
            connect_timeout_secs: default_connect_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            max_retries: 0,
        }
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file. Defaults to `courier.db` in the project data dir.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Background location reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSettings {
    #[serde(default = "default_location_interval")]
    pub interval_secs: u64,
}

fn default_location_interval() -> u64 {
    30
}

impl Default for LocationSettings {
    fn default() -> Self {
        LocationSettings {
            interval_secs: default_location_interval(),
        }
    }
}

impl LocationSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub socket: SocketSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub location: LocationSettings,
}

impl ClientConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (courier.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ClientError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let api = url::Url::parse(&self.api.base_url)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        let socket = url::Url::parse(&self.socket.url)?;
        if !matches!(socket.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "Socket URL must use ws, wss, http or https, got: {}",
                self.socket.url
            )));
        }

        if self.location.interval_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "location.interval_secs must be greater than 0".into(),
            ));
        }

        if self.api.request_timeout_secs == Some(0) {
            return Err(ClientError::InvalidConfig(
                "api.request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("COURIER_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(url) = std::env::var("COURIER_SOCKET_URL") {
            debug!(url = %url, "Overriding socket URL from environment");
            self.socket.url = url;
        }

        if let Ok(path) = std::env::var("COURIER_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("COURIER_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.api.request_timeout_secs = Some(s),
                Err(_) => warn!(value = %secs, "Ignoring invalid COURIER_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Ok(secs) = std::env::var("COURIER_LOCATION_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.location.interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid COURIER_LOCATION_INTERVAL_SECS"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "courier", "client")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("courier.toml"))
    }

    /// Database file path: explicit setting, else the project data dir.
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("courier.db")))
            .unwrap_or_else(|| PathBuf::from("courier.db"))
    }
}
