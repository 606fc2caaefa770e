//! Host registry
//!
//! Tracks known hosts, refreshes their state from server-info polls and
//! serializes operations per host. Each host has its own async lock, so
//! operations against distinct hosts run in parallel while operations against
//! one host run one at a time.

pub mod address;
pub mod host;

pub use address::{HostAddress, DEFAULT_HTTP_PORT};
pub use host::{ConnectivityState, Host, HostAddresses, HostProvenance, PairState};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::capabilities::{ClientId, HostId};
use crate::config::ClientConfig;
use crate::error::{PairingError, RegistryError, TransportError};
use crate::retry;
use crate::transport::{self, HostTransport, ServerInfo};

/// Capacity of the registry event channel
const EVENT_CAPACITY: usize = 64;

/// Change notifications for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    HostAdded(HostId),
    HostUpdated(HostId),
    HostRemoved(HostId),
    PairingStateChanged { host_id: HostId, state: PairState },
}

/// Cancellation side of an in-flight pairing attempt.
struct AttemptSlot {
    generation: u64,
    cancel: watch::Sender<bool>,
}

/// Claim on a host's pairing slot, returned by [`HostRegistry::begin_pairing`].
///
/// `generation` identifies this claim; release it with
/// [`HostRegistry::finish_pairing`]. `cancelled` flips to `true` (or closes)
/// when the attempt must stop.
#[derive(Debug)]
pub struct PairingTicket {
    pub generation: u64,
    pub cancelled: watch::Receiver<bool>,
}

/// Set of known hosts plus per-host operation locks.
pub struct HostRegistry {
    hosts: RwLock<HashMap<HostId, Host>>,
    op_locks: DashMap<HostId, Arc<Mutex<()>>>,
    attempts: DashMap<HostId, AttemptSlot>,
    next_attempt: AtomicU64,
    events: broadcast::Sender<RegistryEvent>,
    transport: Arc<dyn HostTransport>,
    config: ClientConfig,
}

impl HostRegistry {
    pub fn new(transport: Arc<dyn HostTransport>, config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            hosts: RwLock::new(HashMap::new()),
            op_locks: DashMap::new(),
            attempts: DashMap::new(),
            next_attempt: AtomicU64::new(1),
            events,
            transport,
            config,
        }
    }

    pub fn transport(&self) -> &Arc<dyn HostTransport> {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: HostId) -> Option<Host> {
        self.hosts.read().get(&id).cloned()
    }

    /// Hosts sorted by name.
    pub fn list(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self.hosts.read().values().cloned().collect();
        hosts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.read().is_empty()
    }

    fn require(&self, id: HostId) -> Result<Host, RegistryError> {
        self.get(id).ok_or(RegistryError::UnknownHost(id))
    }

    fn update<R>(&self, id: HostId, f: impl FnOnce(&mut Host) -> R) -> Result<R, RegistryError> {
        let mut hosts = self.hosts.write();
        let host = hosts.get_mut(&id).ok_or(RegistryError::UnknownHost(id))?;
        Ok(f(host))
    }

    // =========================================================================
    // Adding and removing hosts
    // =========================================================================

    /// Record a host found by discovery. Returns its id.
    pub fn insert_discovered(&self, info: ServerInfo, address: HostAddress) -> HostId {
        let provenance = HostProvenance::Discovered {
            address: address.clone(),
        };
        self.upsert(info, address, provenance)
    }

    /// Add a host by user-entered address.
    ///
    /// Server info is fetched first; a host that answers "service unavailable"
    /// is retried per `service_unavailable_retry`.
    pub async fn add_manual(&self, input: &str) -> Result<HostId, RegistryError> {
        let address = HostAddress::parse(input, self.config.default_http_port)?;
        let timeout = self.config.timeouts.request();

        let info = retry::execute_with_retry(self.config.service_unavailable_retry, || {
            transport::with_timeout("server_info", timeout, self.transport.server_info(&address))
        })
        .await
        .map_err(|source| {
            warn!(%address, error = %source, "manual host add failed");
            RegistryError::AddFailed {
                address: address.to_string(),
                source,
            }
        })?;

        let provenance = HostProvenance::Manual {
            address: address.clone(),
        };
        Ok(self.upsert(info, address, provenance))
    }

    fn upsert(&self, info: ServerInfo, address: HostAddress, provenance: HostProvenance) -> HostId {
        let id = info.capabilities.uuid;
        let added = {
            let mut hosts = self.hosts.write();
            match hosts.get_mut(&id) {
                Some(existing) => {
                    existing.merge_provenance(provenance);
                    existing.merge_server_info(info, address);
                    false
                }
                None => {
                    hosts.insert(id, Host::from_server_info(info, address, provenance));
                    true
                }
            }
        };

        if added {
            info!(host_id = %id, "host added");
            self.emit(RegistryEvent::HostAdded(id));
        } else {
            debug!(host_id = %id, "host refreshed");
            self.emit(RegistryEvent::HostUpdated(id));
        }
        id
    }

    /// Remove a host and cancel any pairing attempt against it.
    pub fn remove(&self, id: HostId) -> Result<Host, RegistryError> {
        let host = self
            .hosts
            .write()
            .remove(&id)
            .ok_or(RegistryError::UnknownHost(id))?;

        if let Some((_, slot)) = self.attempts.remove(&id) {
            info!(host_id = %id, "cancelling pairing attempt for removed host");
            let _ = slot.cancel.send(true);
        }
        // A lock still held or awaited stays, so a re-added host with the
        // same id keeps serializing against the in-flight operation.
        self.op_locks
            .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);

        info!(host_id = %id, name = %host.name, "host removed");
        self.emit(RegistryEvent::HostRemoved(id));
        Ok(host)
    }

    /// Give the host a user-chosen name that polls will not overwrite.
    pub fn rename(&self, id: HostId, name: &str) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }
        self.update(id, |host| {
            host.name = name.to_string();
            host.has_custom_name = true;
        })?;
        self.emit(RegistryEvent::HostUpdated(id));
        Ok(())
    }

    // =========================================================================
    // State updates
    // =========================================================================

    pub fn set_pair_state(&self, id: HostId, state: PairState) -> Result<(), RegistryError> {
        let changed = self.update(id, |host| {
            let changed = host.pair_state != state;
            host.pair_state = state;
            changed
        })?;
        if changed {
            info!(host_id = %id, state = ?state, "pairing state changed");
            self.emit(RegistryEvent::PairingStateChanged { host_id: id, state });
        }
        Ok(())
    }

    /// Record the app this client just launched. Ownership is written once,
    /// at launch.
    pub fn record_launch(&self, id: HostId, app_id: u32, owner: ClientId) -> Result<(), RegistryError> {
        self.update(id, |host| {
            host.running_app_id = Some(app_id);
            host.capabilities.running_app_id = Some(app_id);
            host.capabilities.running_session_owner = Some(owner);
        })?;
        self.emit(RegistryEvent::HostUpdated(id));
        Ok(())
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Refresh one host, waiting for any in-flight operation on it.
    pub async fn poll(&self, id: HostId) -> Result<Host, RegistryError> {
        let _guard = self.lock_host(id).await?;
        self.poll_locked(id).await
    }

    /// Refresh one host. Caller must hold the host's operation lock.
    ///
    /// Addresses are tried in [`Host::unique_addresses`] order; an address
    /// that answers with a different host id is skipped. A host that answers
    /// on no address is marked offline.
    pub async fn poll_locked(&self, id: HostId) -> Result<Host, RegistryError> {
        self.refresh_locked(id, ConnectivityState::Offline).await
    }

    /// Like [`poll_locked`](Self::poll_locked), for a host an operation is
    /// about to use. A failure leaves connectivity `Unknown` until the next
    /// regular poll and changes nothing else.
    pub async fn check_locked(&self, id: HostId) -> Result<Host, RegistryError> {
        self.refresh_locked(id, ConnectivityState::Unknown).await
    }

    async fn refresh_locked(
        &self,
        id: HostId,
        on_failure: ConnectivityState,
    ) -> Result<Host, RegistryError> {
        let host = self.require(id)?;
        let timeout = self.config.timeouts.fast_fail();
        let mut last_error = TransportError::Unreachable {
            address: host.name.clone(),
        };

        for address in host.unique_addresses() {
            match transport::with_timeout("server_info", timeout, self.transport.server_info(&address))
                .await
            {
                Ok(info) if info.capabilities.uuid == id => {
                    let paired_before = host.pair_state;
                    let refreshed = self.update(id, |host| {
                        host.merge_server_info(info, address);
                        host.clone()
                    })?;
                    if refreshed.pair_state != paired_before {
                        self.emit(RegistryEvent::PairingStateChanged {
                            host_id: id,
                            state: refreshed.pair_state,
                        });
                    }
                    self.emit(RegistryEvent::HostUpdated(id));
                    return Ok(refreshed);
                }
                Ok(info) => {
                    debug!(
                        host_id = %id,
                        %address,
                        answered_by = %info.capabilities.uuid,
                        "address belongs to another host"
                    );
                }
                Err(err) => {
                    debug!(host_id = %id, %address, error = %err, "poll attempt failed");
                    last_error = err;
                }
            }
        }

        self.update(id, |host| host.connectivity = on_failure)?;
        self.emit(RegistryEvent::HostUpdated(id));
        warn!(
            host_id = %id,
            name = %host.name,
            connectivity = ?on_failure,
            error = %last_error,
            "host did not answer"
        );
        Err(RegistryError::PollFailed {
            host_name: host.name,
            source: last_error,
        })
    }

    /// Poll every host concurrently. Hosts with an operation in flight are
    /// skipped; that operation refreshes them itself.
    pub async fn poll_all(&self) -> Vec<(HostId, Result<Host, RegistryError>)> {
        let ids: Vec<HostId> = self.hosts.read().keys().copied().collect();
        let polls = ids.into_iter().filter_map(|id| {
            let guard = self.op_lock(id).try_lock_owned().ok()?;
            Some(async move {
                let result = self.poll_locked(id).await;
                drop(guard);
                (id, result)
            })
        });
        futures::future::join_all(polls).await
    }

    // =========================================================================
    // Per-host serialization
    // =========================================================================

    fn op_lock(&self, id: HostId) -> Arc<Mutex<()>> {
        self.op_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to a host.
    pub async fn lock_host(&self, id: HostId) -> Result<OwnedMutexGuard<()>, RegistryError> {
        self.require(id)?;
        let lock = self.op_lock(id);
        Ok(lock.lock_owned().await)
    }

    /// Whether an operation currently holds the host's lock.
    pub fn is_busy(&self, id: HostId) -> bool {
        self.op_locks
            .get(&id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    // =========================================================================
    // Pairing attempt slots
    // =========================================================================

    /// Claim the single pairing slot for a host.
    ///
    /// Fails immediately if another attempt holds it.
    pub fn begin_pairing(&self, id: HostId) -> Result<PairingTicket, PairingError> {
        if self.get(id).is_none() {
            return Err(PairingError::UnknownHost(id));
        }
        match self.attempts.entry(id) {
            Entry::Occupied(_) => {
                warn!(host_id = %id, "rejecting concurrent pairing attempt");
                Err(PairingError::AttemptInProgress { host_id: id })
            }
            Entry::Vacant(vacant) => {
                let generation = self.next_attempt.fetch_add(1, Ordering::Relaxed);
                let (cancel, cancelled) = watch::channel(false);
                vacant.insert(AttemptSlot { generation, cancel });
                Ok(PairingTicket {
                    generation,
                    cancelled,
                })
            }
        }
    }

    /// Release the slot claimed with `generation`. A slot claimed later, after
    /// the host was removed and added again, is left alone.
    pub fn finish_pairing(&self, id: HostId, generation: u64) {
        self.attempts
            .remove_if(&id, |_, slot| slot.generation == generation);
    }

    pub fn has_pairing_attempt(&self, id: HostId) -> bool {
        self.attempts.contains_key(&id)
    }

    // =========================================================================
    // Quit tracking
    // =========================================================================

    /// Flag a quit as in flight until the returned guard drops.
    pub fn begin_quit(&self, id: HostId) -> Result<PendingQuitGuard<'_>, RegistryError> {
        self.update(id, |host| host.pending_quit = true)?;
        self.emit(RegistryEvent::HostUpdated(id));
        Ok(PendingQuitGuard { registry: self, id })
    }
}

/// Clears a host's `pending_quit` flag on drop, including when the quit
/// future is cancelled.
pub struct PendingQuitGuard<'a> {
    registry: &'a HostRegistry,
    id: HostId,
}

impl Drop for PendingQuitGuard<'_> {
    fn drop(&mut self) {
        if self
            .registry
            .update(self.id, |host| host.pending_quit = false)
            .is_ok()
        {
            self.registry.emit(RegistryEvent::HostUpdated(self.id));
        }
    }
}
