//! Host transport collaborator
//!
//! Reachability, pairing, launch and quit primitives consumed as opaque async
//! operations. The wire protocol lives behind [`HostTransport`] implementations.

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::capabilities::{ClientId, HostCapabilities};
use crate::error::TransportError;
use crate::negotiation::ResolvedStreamConfig;
use crate::pairing::Pin;
use crate::registry::HostAddress;

/// Server-info response of a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    /// Host reports this client as paired.
    pub paired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<HostAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<HostAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<HostAddress>,
    pub capabilities: HostCapabilities,
}

/// Host-side result of the pairing handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOutcome {
    Paired,
    PinWrong,
    Failed,
    /// Another client is pairing with the host
    AlreadyInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Start the app fresh
    Launch,
    /// Reattach to an app this client already started
    Resume,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub app_id: u32,
    pub mode: LaunchMode,
    pub client_id: ClientId,
    pub config: ResolvedStreamConfig,
}

/// Network primitives against a single host address.
#[async_trait]
pub trait HostTransport: Send + Sync {
    async fn server_info(&self, address: &HostAddress) -> Result<ServerInfo, TransportError>;

    /// Run the PIN handshake. Resolves once the user confirmed (or failed to
    /// confirm) the PIN on the host.
    async fn pair(&self, address: &HostAddress, pin: Pin) -> Result<PairOutcome, TransportError>;

    async fn unpair(&self, address: &HostAddress) -> Result<(), TransportError>;

    async fn launch(
        &self,
        address: &HostAddress,
        request: &LaunchRequest,
    ) -> Result<(), TransportError>;

    async fn quit(&self, address: &HostAddress) -> Result<(), TransportError>;
}

/// Bound a transport call, mapping expiry to [`TransportError::TimedOut`].
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::TimedOut {
            operation,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}
