//! Host network addresses

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use url::{Host, Url};

use crate::error::RegistryError;

/// Default HTTP control port of a streaming host.
pub const DEFAULT_HTTP_PORT: u16 = 47989;

/// A host name or IP literal plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddress {
    pub host: String,
    pub port: u16,
}

impl HostAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse user input for a manually added host.
    ///
    /// Accepts `host`, `host:port`, `[v6]`, `[v6]:port` and bare IPv6
    /// literals. `default_port` applies when no port is given.
    pub fn parse(input: &str, default_port: u16) -> Result<Self, RegistryError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| RegistryError::InvalidAddress {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty address"));
        }

        // Bare IPv6 literals are ambiguous with host:port, so check them first.
        if let Ok(v6) = trimmed.parse::<Ipv6Addr>() {
            return Ok(Self::new(v6.to_string(), default_port));
        }

        let url = Url::parse(&format!("playlink://{}", trimmed))
            .map_err(|e| invalid(&e.to_string()))?;

        if !matches!(url.path(), "" | "/")
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
        {
            return Err(invalid("unexpected characters after host"));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(v4)) => v4.to_string(),
            Some(Host::Ipv6(v6)) => v6.to_string(),
            _ => return Err(invalid("missing host")),
        };

        Ok(Self::new(host, url.port().unwrap_or(default_port)))
    }

    pub fn is_ipv6(&self) -> bool {
        self.host.parse::<Ipv6Addr>().is_ok()
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
