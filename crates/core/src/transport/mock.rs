//! Scriptable in-memory transport for tests
//!
//! Hosts are keyed by address. Every call is recorded so tests can assert on
//! what reached the "network".

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::{HostTransport, LaunchMode, LaunchRequest, PairOutcome, ServerInfo};
use crate::error::TransportError;
use crate::pairing::Pin;
use crate::registry::HostAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ServerInfo(HostAddress),
    Pair(HostAddress, Pin),
    Unpair(HostAddress),
    Launch {
        address: HostAddress,
        app_id: u32,
        mode: LaunchMode,
    },
    Quit(HostAddress),
}

struct MockHost {
    info: ServerInfo,
    reachable: bool,
    service_unavailable_remaining: u32,
    pair_script: VecDeque<Result<PairOutcome, TransportError>>,
    pair_delay: Option<Duration>,
    launch_error: Option<TransportError>,
    quit_error: Option<TransportError>,
    quit_delay: Option<Duration>,
    ignore_quit: bool,
}

/// In-memory [`HostTransport`].
#[derive(Default)]
pub struct MockTransport {
    hosts: Mutex<HashMap<HostAddress, MockHost>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `info` at `address`.
    pub fn add_host(&self, address: HostAddress, info: ServerInfo) {
        self.hosts.lock().insert(
            address,
            MockHost {
                info,
                reachable: true,
                service_unavailable_remaining: 0,
                pair_script: VecDeque::new(),
                pair_delay: None,
                launch_error: None,
                quit_error: None,
                quit_delay: None,
                ignore_quit: false,
            },
        );
    }

    fn with_host<R>(&self, address: &HostAddress, f: impl FnOnce(&mut MockHost) -> R) -> Option<R> {
        self.hosts.lock().get_mut(address).map(f)
    }

    pub fn set_reachable(&self, address: &HostAddress, reachable: bool) {
        self.with_host(address, |host| host.reachable = reachable);
    }

    /// Answer the next `times` server-info calls with "service unavailable".
    pub fn fail_service_unavailable(&self, address: &HostAddress, times: u32) {
        self.with_host(address, |host| host.service_unavailable_remaining = times);
    }

    /// Queue the result of the next pairing handshake. Unscripted
    /// handshakes succeed.
    pub fn script_pair(&self, address: &HostAddress, result: Result<PairOutcome, TransportError>) {
        self.with_host(address, |host| host.pair_script.push_back(result));
    }

    /// Delay every handshake, simulating a user typing the PIN.
    pub fn set_pair_delay(&self, address: &HostAddress, delay: Duration) {
        self.with_host(address, |host| host.pair_delay = Some(delay));
    }

    pub fn set_launch_error(&self, address: &HostAddress, error: Option<TransportError>) {
        self.with_host(address, |host| host.launch_error = error);
    }

    pub fn set_quit_error(&self, address: &HostAddress, error: Option<TransportError>) {
        self.with_host(address, |host| host.quit_error = error);
    }

    /// Delay every quit before the host acts on it.
    pub fn set_quit_delay(&self, address: &HostAddress, delay: Duration) {
        self.with_host(address, |host| host.quit_delay = Some(delay));
    }

    /// Accept quit requests without stopping the app.
    pub fn set_ignore_quit(&self, address: &HostAddress, ignore: bool) {
        self.with_host(address, |host| host.ignore_quit = ignore);
    }

    pub fn set_paired(&self, address: &HostAddress, paired: bool) {
        self.with_host(address, |host| host.info.paired = paired);
    }

    pub fn update_info(&self, address: &HostAddress, f: impl FnOnce(&mut ServerInfo)) {
        self.with_host(address, |host| f(&mut host.info));
    }

    pub fn info(&self, address: &HostAddress) -> Option<ServerInfo> {
        self.with_host(address, |host| host.info.clone())
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn quit_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Quit(_)))
    }

    pub fn pair_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Pair(..)))
    }

    pub fn server_info_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::ServerInfo(_)))
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    fn unreachable(address: &HostAddress) -> TransportError {
        TransportError::Unreachable {
            address: address.to_string(),
        }
    }

    fn reachable_host<R>(
        &self,
        address: &HostAddress,
        f: impl FnOnce(&mut MockHost) -> Result<R, TransportError>,
    ) -> Result<R, TransportError> {
        let mut hosts = self.hosts.lock();
        match hosts.get_mut(address) {
            Some(host) if host.reachable => f(host),
            _ => Err(Self::unreachable(address)),
        }
    }
}

#[async_trait]
impl HostTransport for MockTransport {
    async fn server_info(&self, address: &HostAddress) -> Result<ServerInfo, TransportError> {
        self.record(MockCall::ServerInfo(address.clone()));
        self.reachable_host(address, |host| {
            if host.service_unavailable_remaining > 0 {
                host.service_unavailable_remaining -= 1;
                return Err(TransportError::ServiceUnavailable);
            }
            Ok(host.info.clone())
        })
    }

    async fn pair(&self, address: &HostAddress, pin: Pin) -> Result<PairOutcome, TransportError> {
        self.record(MockCall::Pair(address.clone(), pin));
        let delay = self.reachable_host(address, |host| Ok(host.pair_delay))?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.reachable_host(address, |host| {
            let result = host.pair_script.pop_front().unwrap_or(Ok(PairOutcome::Paired));
            if let Ok(PairOutcome::Paired) = result {
                host.info.paired = true;
            }
            result
        })
    }

    async fn unpair(&self, address: &HostAddress) -> Result<(), TransportError> {
        self.record(MockCall::Unpair(address.clone()));
        self.reachable_host(address, |host| {
            host.info.paired = false;
            Ok(())
        })
    }

    async fn launch(
        &self,
        address: &HostAddress,
        request: &LaunchRequest,
    ) -> Result<(), TransportError> {
        self.record(MockCall::Launch {
            address: address.clone(),
            app_id: request.app_id,
            mode: request.mode,
        });
        self.reachable_host(address, |host| {
            if let Some(error) = host.launch_error.clone() {
                return Err(error);
            }
            let caps = &mut host.info.capabilities;
            if request.mode == LaunchMode::Launch {
                caps.running_app_id = Some(request.app_id);
                caps.running_session_owner = Some(request.client_id);
            }
            Ok(())
        })
    }

    async fn quit(&self, address: &HostAddress) -> Result<(), TransportError> {
        self.record(MockCall::Quit(address.clone()));
        let delay = self.reachable_host(address, |host| Ok(host.quit_delay))?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.reachable_host(address, |host| {
            if let Some(error) = host.quit_error.clone() {
                return Err(error);
            }
            if !host.ignore_quit {
                host.info.capabilities.running_app_id = None;
                host.info.capabilities.running_session_owner = None;
            }
            Ok(())
        })
    }
}
