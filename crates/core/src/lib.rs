//! PlayLink client core
//!
//! Decision logic behind a game-streaming client:
//!
//! - [`negotiation`] reconciles host capabilities, client decoder capabilities
//!   and user overrides into one [`ResolvedStreamConfig`], recording every
//!   downgrade as an [`Advisory`].
//! - [`pairing`] runs the PIN handshake that establishes trust with a host.
//! - [`session`] connects, launches and quits apps, enforcing that only the
//!   client that started an app may quit it.
//! - [`registry`] tracks known hosts and serializes operations per host.
//!
//! Network primitives and the local decoder are supplied by the embedder
//! through [`HostTransport`] and [`DecoderBackend`].
//!
//! # Example
//!
//! ```ignore
//! use playlink_core::{ClientConfig, HostRegistry, PairingManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> playlink_core::Result<()> {
//!     let registry = Arc::new(HostRegistry::new(my_transport(), ClientConfig::default()));
//!     let host_id = registry.add_manual("192.168.1.20").await?;
//!
//!     let handle = PairingManager::new(registry.clone()).begin(host_id)?;
//!     println!("Enter PIN {} on the host", handle.pin());
//!     handle.outcome().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod capabilities;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod pairing;
pub mod registry;
pub mod retry;
pub mod session;
pub mod sink;
pub mod transport;

pub use capabilities::{
    ClientCapabilities, ClientId, HostCapabilities, HostId, UserOverrides, VideoCodec,
};
pub use config::{ClientConfig, TimeoutConfig};
pub use error::{
    ConfigError, Error, FatalReason, PairingError, RegistryError, Result, SessionError,
    TransportError,
};
pub use negotiation::{resolve, Advisory, AdvisoryKey, ResolvedStreamConfig, Severity};
pub use pairing::{PairingAttempt, PairingFailure, PairingHandle, PairingManager, PairingState, Pin};
pub use registry::{Host, HostAddress, HostRegistry, RegistryEvent};
pub use retry::RetryPolicy;
pub use session::{DecoderBackend, SessionManager, StreamSession};
pub use sink::{AdvisoryEvent, AdvisorySink, ChannelSink, MultiSink, TracingSink};
pub use transport::{HostTransport, ServerInfo};

#[cfg(feature = "test-support")]
pub use session::MockDecoder;
#[cfg(feature = "test-support")]
pub use transport::mock::MockTransport;

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
