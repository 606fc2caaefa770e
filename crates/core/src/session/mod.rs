//! Session lifecycle
//!
//! [`SessionManager`] orchestrates connect, negotiate, launch and quit against
//! one host at a time. Every operation holds the host's registry lock for its
//! whole duration, so a quit never overlaps a launch or a pairing attempt on
//! the same host.

pub mod decoder;
pub mod ownership;

pub use decoder::{DecoderBackend, DecoderError};
pub use ownership::{authorize_quit, plan_launch};

#[cfg(any(test, feature = "test-support"))]
pub use decoder::MockDecoder;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::capabilities::{ClientId, HostId, UserOverrides};
use crate::error::{RegistryError, SessionError, TransportError};
use crate::negotiation::{self, Advisory, ResolvedStreamConfig};
use crate::registry::{Host, HostRegistry, PairState};
use crate::sink::{AdvisoryEvent, AdvisorySink};
use crate::transport::{self, LaunchMode, LaunchRequest};

/// A stream that was started or resumed on a host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSession {
    pub host_id: HostId,
    pub host_name: String,
    pub app_id: u32,
    pub mode: LaunchMode,
    pub config: ResolvedStreamConfig,
    pub started_at: DateTime<Utc>,
}

pub struct SessionManager {
    registry: Arc<HostRegistry>,
    decoder: Arc<dyn DecoderBackend>,
    sink: Arc<dyn AdvisorySink>,
    client_id: ClientId,
}

impl SessionManager {
    pub fn new(
        registry: Arc<HostRegistry>,
        decoder: Arc<dyn DecoderBackend>,
        sink: Arc<dyn AdvisorySink>,
    ) -> Self {
        let client_id = registry.config().client_id;
        Self {
            registry,
            decoder,
            sink,
            client_id,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Check that the host is paired and reachable, refreshing its state.
    pub async fn connect(&self, host_id: HostId) -> Result<Host, SessionError> {
        let _op = self.lock(host_id).await?;
        self.connect_locked(host_id).await
    }

    /// Connect, negotiate, initialize the decoder and launch (or resume)
    /// `app_id`.
    pub async fn start_session(
        &self,
        host_id: HostId,
        app_id: u32,
        overrides: &UserOverrides,
    ) -> Result<StreamSession, SessionError> {
        let _op = self.lock(host_id).await?;
        let host = self.connect_locked(host_id).await?;
        let mode = plan_launch(&host.capabilities, app_id, self.client_id, &host.name)?;

        let client = self
            .decoder
            .probe()
            .await
            .map_err(|e| SessionError::DecoderInitFailed {
                reason: e.to_string(),
            })?;

        let config = match negotiation::resolve(&host.capabilities, &client, overrides) {
            Ok(config) => config,
            Err(reason) => {
                error!(host_id = %host_id, reason = %reason, "stream negotiation failed");
                self.publish(host_id, reason.to_advisory());
                return Err(reason.into());
            }
        };
        for advisory in &config.advisories {
            self.publish(host_id, advisory.clone());
        }

        self.decoder
            .initialize(&config)
            .await
            .map_err(|e| SessionError::DecoderInitFailed {
                reason: e.to_string(),
            })?;

        let address = host.active_address().ok_or_else(|| SessionError::LaunchFailed {
            host_name: host.name.clone(),
            source: TransportError::Unreachable {
                address: host.name.clone(),
            },
        })?;
        let request = LaunchRequest {
            app_id,
            mode,
            client_id: self.client_id,
            config: config.clone(),
        };
        transport::with_timeout(
            "launch",
            self.registry.config().timeouts.launch(),
            self.registry.transport().launch(&address, &request),
        )
        .await
        .map_err(|source| {
            warn!(host_id = %host_id, error = %source, "launch failed");
            SessionError::LaunchFailed {
                host_name: host.name.clone(),
                source,
            }
        })?;

        if mode == LaunchMode::Launch {
            self.registry
                .record_launch(host_id, app_id, self.client_id)
                .map_err(|_| SessionError::UnknownHost(host_id))?;
        }

        info!(
            host_id = %host_id,
            app_id,
            mode = ?mode,
            codec = %config.codec,
            resolution = %config.resolution,
            "session started"
        );
        Ok(StreamSession {
            host_id,
            host_name: host.name,
            app_id,
            mode,
            config,
            started_at: Utc::now(),
        })
    }

    /// Quit the app running on the host.
    ///
    /// Only the client that started the app may quit it; this is checked
    /// before any quit request reaches the host.
    pub async fn quit_app(&self, host_id: HostId) -> Result<(), SessionError> {
        let _op = self.lock(host_id).await?;
        let _pending = self
            .registry
            .begin_quit(host_id)
            .map_err(|_| SessionError::UnknownHost(host_id))?;

        let host = self.connect_locked(host_id).await?;
        let app_id = authorize_quit(&host.capabilities, self.client_id, &host.name)?;
        let address = host.active_address().ok_or_else(|| SessionError::QuitFailed {
            host_name: host.name.clone(),
            source: TransportError::Unreachable {
                address: host.name.clone(),
            },
        })?;

        transport::with_timeout(
            "quit",
            self.registry.config().timeouts.quit(),
            self.registry.transport().quit(&address),
        )
        .await
        .map_err(|source| {
            warn!(host_id = %host_id, error = %source, "quit failed");
            SessionError::QuitFailed {
                host_name: host.name.clone(),
                source,
            }
        })?;

        // Hosts may accept a quit from a non-owner and keep the app running.
        match self.registry.check_locked(host_id).await {
            Ok(refreshed) if refreshed.running_app_id.is_some() => {
                warn!(host_id = %host_id, app_id, "host kept the app running after quit");
                Err(SessionError::NotOwner {
                    host_name: host.name,
                    app_id,
                })
            }
            Ok(_) => {
                info!(host_id = %host_id, app_id, "app quit");
                Ok(())
            }
            Err(err) => {
                warn!(host_id = %host_id, error = %err, "could not confirm quit");
                Ok(())
            }
        }
    }

    async fn lock(
        &self,
        host_id: HostId,
    ) -> Result<tokio::sync::OwnedMutexGuard<()>, SessionError> {
        self.registry
            .lock_host(host_id)
            .await
            .map_err(|_| SessionError::UnknownHost(host_id))
    }

    /// Caller holds the host lock. A failed refresh leaves connectivity
    /// unknown and nothing else changed.
    async fn connect_locked(&self, host_id: HostId) -> Result<Host, SessionError> {
        let host = self
            .registry
            .get(host_id)
            .ok_or(SessionError::UnknownHost(host_id))?;
        if host.pair_state != PairState::Paired {
            return Err(SessionError::NotPaired {
                host_name: host.name,
            });
        }

        let refreshed = match self.registry.check_locked(host_id).await {
            Ok(refreshed) => refreshed,
            Err(RegistryError::PollFailed { host_name, source }) => {
                warn!(host_id = %host_id, error = %source, "connect failed");
                return Err(SessionError::ConnectFailed { host_name, source });
            }
            Err(_) => return Err(SessionError::UnknownHost(host_id)),
        };

        if refreshed.pair_state != PairState::Paired {
            return Err(SessionError::NotPaired {
                host_name: refreshed.name,
            });
        }
        debug!(host_id = %host_id, "connected");
        Ok(refreshed)
    }

    fn publish(&self, host_id: HostId, advisory: Advisory) {
        if let Err(e) = self.sink.publish(AdvisoryEvent::new(host_id, advisory)) {
            warn!(host_id = %host_id, error = %e, "advisory sink rejected event");
        }
    }
}
