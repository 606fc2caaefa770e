//! Client configuration
//!
//! Loaded from a TOML file; every field has a default so partial files work.
//! A few fields can be overridden from `PLAYLINK_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::capabilities::ClientId;
use crate::error::ConfigError;
use crate::registry::address::DEFAULT_HTTP_PORT;
use crate::retry::RetryPolicy;

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Name this client presents to hosts
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Identity used for session ownership
    #[serde(default)]
    pub client_id: ClientId,

    /// Interval between background host polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Port assumed for manually added hosts without one
    #[serde(default = "default_http_port")]
    pub default_http_port: u16,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry applied when a host answers "service unavailable"
    #[serde(default)]
    pub service_unavailable_retry: RetryPolicy,
}

/// Network timeouts, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Ordinary request (server info, unpair)
    #[serde(default = "default_request_ms")]
    pub request_ms: u64,

    /// Probe of a single candidate address
    #[serde(default = "default_fast_fail_ms")]
    pub fast_fail_ms: u64,

    /// Whole pairing handshake, including the user typing the PIN
    #[serde(default = "default_pair_ms")]
    pub pair_ms: u64,

    #[serde(default = "default_launch_ms")]
    pub launch_ms: u64,

    #[serde(default = "default_quit_ms")]
    pub quit_ms: u64,
}

fn default_client_name() -> String {
    "PlayLink".to_string()
}

fn default_poll_interval() -> u64 {
    3_000
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_request_ms() -> u64 {
    5_000
}

fn default_fast_fail_ms() -> u64 {
    2_000
}

fn default_pair_ms() -> u64 {
    120_000
}

fn default_launch_ms() -> u64 {
    120_000
}

fn default_quit_ms() -> u64 {
    30_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_ms(),
            fast_fail_ms: default_fast_fail_ms(),
            pair_ms: default_pair_ms(),
            launch_ms: default_launch_ms(),
            quit_ms: default_quit_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn fast_fail(&self) -> Duration {
        Duration::from_millis(self.fast_fail_ms)
    }

    pub fn pair(&self) -> Duration {
        Duration::from_millis(self.pair_ms)
    }

    pub fn launch(&self) -> Duration {
        Duration::from_millis(self.launch_ms)
    }

    pub fn quit(&self) -> Duration {
        Duration::from_millis(self.quit_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            client_id: ClientId::new(),
            timeouts: TimeoutConfig::default(),
            poll_interval_ms: default_poll_interval(),
            service_unavailable_retry: RetryPolicy::default(),
            default_http_port: default_http_port(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Overlay `PLAYLINK_CLIENT_NAME` and `PLAYLINK_HTTP_PORT` when set.
    pub fn apply_env(mut self) -> Self {
        if let Ok(name) = std::env::var("PLAYLINK_CLIENT_NAME") {
            self.client_name = name;
        }
        if let Ok(port) = std::env::var("PLAYLINK_HTTP_PORT") {
            if let Ok(p) = port.parse() {
                self.default_http_port = p;
            }
        }
        self
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_name.trim().is_empty() {
            return Err(ConfigError::Invalid("client_name must not be empty".into()));
        }
        let timeouts = [
            ("request_ms", self.timeouts.request_ms),
            ("fast_fail_ms", self.timeouts.fast_fail_ms),
            ("pair_ms", self.timeouts.pair_ms),
            ("launch_ms", self.timeouts.launch_ms),
            ("quit_ms", self.timeouts.quit_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("timeouts.{} must be non-zero", name)));
        }
        if self.default_http_port == 0 {
            return Err(ConfigError::Invalid("default_http_port must be non-zero".into()));
        }
        Ok(())
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_service_unavailable_retry(mut self, policy: RetryPolicy) -> Self {
        self.service_unavailable_retry = policy;
        self
    }

    pub fn with_default_http_port(mut self, port: u16) -> Self {
        self.default_http_port = port;
        self
    }
}
