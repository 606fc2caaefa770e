//! PIN-based pairing
//!
//! [`PairingManager::begin`] claims the host's single pairing slot, shows a
//! fresh PIN and runs the handshake in a background task. The slot is released
//! when the attempt reaches a terminal state, so a failed attempt can be
//! followed by a new one straight away. Removing the host cancels the attempt.

pub mod pin;
pub mod state;

pub use pin::Pin;
pub use state::{PairingAttempt, PairingFailure, PairingState};

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::capabilities::HostId;
use crate::error::{PairingError, RegistryError, TransportError};
use crate::registry::{HostRegistry, PairState};
use crate::transport::{self, PairOutcome};

/// Drives pairing attempts against hosts in a registry.
#[derive(Clone)]
pub struct PairingManager {
    registry: Arc<HostRegistry>,
}

/// A started pairing attempt.
pub struct PairingHandle {
    host_id: HostId,
    pin: Pin,
    task: JoinHandle<Result<PairingAttempt, PairingError>>,
}

impl PairingHandle {
    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    /// PIN to display while the user confirms on the host.
    pub fn pin(&self) -> Pin {
        self.pin
    }

    /// Wait for the terminal state.
    ///
    /// `Ok` carries the succeeded attempt; failures arrive as
    /// [`PairingError::Failed`].
    pub async fn outcome(self) -> Result<PairingAttempt, PairingError> {
        match self.task.await {
            Ok(result) => result,
            Err(_) => Err(PairingError::Failed(PairingFailure::Cancelled)),
        }
    }

    /// Abandon the attempt. The slot is released.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Releases the host's pairing slot however the attempt ends.
struct SlotGuard {
    registry: Arc<HostRegistry>,
    host_id: HostId,
    generation: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.registry.finish_pairing(self.host_id, self.generation);
    }
}

impl PairingManager {
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        Self { registry }
    }

    /// Start pairing with `host_id`.
    ///
    /// Rejected with [`PairingError::AttemptInProgress`] if an attempt for the
    /// host already exists; that attempt is left untouched.
    pub fn begin(&self, host_id: HostId) -> Result<PairingHandle, PairingError> {
        let ticket = self.registry.begin_pairing(host_id)?;
        let guard = SlotGuard {
            registry: self.registry.clone(),
            host_id,
            generation: ticket.generation,
        };
        let cancelled = ticket.cancelled;
        let pin = Pin::generate();
        info!(host_id = %host_id, "pairing started");

        let registry = self.registry.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            run_attempt(registry, host_id, pin, cancelled).await
        });

        Ok(PairingHandle { host_id, pin, task })
    }

    /// Start pairing and wait for the result.
    pub async fn pair(&self, host_id: HostId) -> Result<PairingAttempt, PairingError> {
        self.begin(host_id)?.outcome().await
    }

    /// Drop trust locally and on the host.
    ///
    /// Local state is cleared even if the host cannot be reached; the
    /// transport error is still returned.
    pub async fn unpair(&self, host_id: HostId) -> Result<(), PairingError> {
        let _op = self
            .registry
            .lock_host(host_id)
            .await
            .map_err(|_| PairingError::UnknownHost(host_id))?;
        let host = self
            .registry
            .get(host_id)
            .ok_or(PairingError::UnknownHost(host_id))?;

        let timeout = self.registry.config().timeouts.request();
        let remote = match host.active_address() {
            Some(address) => {
                transport::with_timeout(
                    "unpair",
                    timeout,
                    self.registry.transport().unpair(&address),
                )
                .await
            }
            None => Err(TransportError::Unreachable {
                address: host.name.clone(),
            }),
        };

        self.registry
            .set_pair_state(host_id, PairState::Unpaired)
            .map_err(|_| PairingError::UnknownHost(host_id))?;

        remote.map_err(|err| {
            warn!(host_id = %host_id, error = %err, "host did not acknowledge unpair");
            PairingError::Unpair(err)
        })
    }
}

async fn run_attempt(
    registry: Arc<HostRegistry>,
    host_id: HostId,
    pin: Pin,
    mut cancelled: watch::Receiver<bool>,
) -> Result<PairingAttempt, PairingError> {
    let mut attempt = PairingAttempt::new(host_id);
    attempt.request()?;

    let result = tokio::select! {
        _ = wait_cancelled(&mut cancelled) => Err(PairingFailure::Cancelled),
        result = handshake(&registry, host_id, pin, &mut attempt) => result,
    };

    match result {
        Ok(()) => {
            attempt.confirm()?;
            info!(host_id = %host_id, "pairing succeeded");
            Ok(attempt)
        }
        Err(reason) => {
            attempt.fail(reason)?;
            warn!(host_id = %host_id, reason = %reason, "pairing failed");
            Err(PairingError::Failed(reason))
        }
    }
}

/// Resolves once the attempt must stop: the flag was raised or the slot was
/// dropped by host removal.
async fn wait_cancelled(cancelled: &mut watch::Receiver<bool>) {
    loop {
        if *cancelled.borrow_and_update() {
            return;
        }
        if cancelled.changed().await.is_err() {
            return;
        }
    }
}

async fn handshake(
    registry: &HostRegistry,
    host_id: HostId,
    pin: Pin,
    attempt: &mut PairingAttempt,
) -> Result<(), PairingFailure> {
    let _op = registry.lock_host(host_id).await.map_err(|err| match err {
        RegistryError::UnknownHost(_) => PairingFailure::Cancelled,
        _ => PairingFailure::Unreachable,
    })?;
    let host = registry.get(host_id).ok_or(PairingFailure::Cancelled)?;
    let address = host.active_address().ok_or(PairingFailure::Unreachable)?;

    attempt
        .host_ready(pin)
        .map_err(|_| PairingFailure::Rejected)?;

    let timeout = registry.config().timeouts.pair();
    let outcome =
        transport::with_timeout("pair", timeout, registry.transport().pair(&address, pin)).await;

    let failure = match outcome {
        Ok(PairOutcome::Paired) => {
            registry
                .set_pair_state(host_id, PairState::Paired)
                .map_err(|_| PairingFailure::Cancelled)?;
            return Ok(());
        }
        Ok(PairOutcome::PinWrong) => PairingFailure::PinMismatch,
        Ok(PairOutcome::AlreadyInProgress) => PairingFailure::HostAlreadyPairing,
        // A generic failure while an app runs means the host is busy streaming.
        Ok(PairOutcome::Failed) if host.running_app_id.is_some() => {
            PairingFailure::SessionAlreadyRunning
        }
        Ok(PairOutcome::Failed) => PairingFailure::Rejected,
        Err(TransportError::HostError { code, .. }) => PairingFailure::HostReturnedError(code),
        Err(TransportError::ServiceUnavailable) => PairingFailure::HostReturnedError(503),
        Err(TransportError::TimedOut { .. }) => PairingFailure::TimedOut,
        Err(TransportError::Unreachable { .. }) => PairingFailure::Unreachable,
    };
    Err(failure)
}
