//! Host entity tracked by the registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::HostAddress;
use crate::capabilities::{ClientId, HostCapabilities, HostId};
use crate::transport::ServerInfo;

/// How the host became known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostProvenance {
    /// Found by network discovery
    Discovered { address: HostAddress },
    /// Added by the user; re-discovery keeps it manual
    Manual { address: HostAddress },
}

impl HostProvenance {
    pub fn is_manual(&self) -> bool {
        matches!(self, HostProvenance::Manual { .. })
    }

    pub fn address(&self) -> &HostAddress {
        match self {
            HostProvenance::Discovered { address } | HostProvenance::Manual { address } => address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Offline,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    Paired,
    Unpaired,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAddresses {
    /// Address that last answered.
    pub active: Option<HostAddress>,
    pub local: Option<HostAddress>,
    pub remote: Option<HostAddress>,
    pub ipv6: Option<HostAddress>,
    pub manual: Option<HostAddress>,
    pub mac: Option<String>,
}

/// A known streaming host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    /// Name was set by the user and survives polls.
    pub has_custom_name: bool,
    pub provenance: HostProvenance,
    pub connectivity: ConnectivityState,
    pub pair_state: PairState,
    pub addresses: HostAddresses,
    pub running_app_id: Option<u32>,
    pub capabilities: HostCapabilities,
    pub last_seen: Option<DateTime<Utc>>,
    /// A quit request is in flight.
    pub pending_quit: bool,
}

impl Host {
    /// Build a host from its first server-info response at `address`.
    pub fn from_server_info(info: ServerInfo, address: HostAddress, provenance: HostProvenance) -> Self {
        let mut host = Self {
            id: info.capabilities.uuid,
            name: String::new(),
            has_custom_name: false,
            provenance,
            connectivity: ConnectivityState::Unknown,
            pair_state: PairState::Unknown,
            addresses: HostAddresses::default(),
            running_app_id: None,
            capabilities: info.capabilities.clone(),
            last_seen: None,
            pending_quit: false,
        };
        if host.provenance.is_manual() {
            host.addresses.manual = Some(host.provenance.address().clone());
        }
        host.merge_server_info(info, address);
        host
    }

    /// Apply a poll result that came from `address`.
    ///
    /// A custom name is kept; addresses and MAC are only replaced by present
    /// values; capabilities are replaced wholesale.
    pub fn merge_server_info(&mut self, info: ServerInfo, address: HostAddress) {
        if !self.has_custom_name && !info.name.is_empty() {
            self.name = info.name;
        }
        if info.local_address.is_some() {
            self.addresses.local = info.local_address;
        }
        if info.remote_address.is_some() {
            self.addresses.remote = info.remote_address;
        }
        if info.ipv6_address.is_some() {
            self.addresses.ipv6 = info.ipv6_address;
        }
        if let Some(mac) = info.mac.filter(|mac| !mac.is_empty()) {
            self.addresses.mac = Some(mac);
        }
        self.addresses.active = Some(address);
        self.connectivity = ConnectivityState::Online;
        self.pair_state = if info.paired {
            PairState::Paired
        } else {
            PairState::Unpaired
        };
        self.running_app_id = info.capabilities.running_app_id;
        self.capabilities = info.capabilities;
        self.last_seen = Some(Utc::now());
    }

    /// Merge provenance of a repeated add/discovery. Manual wins.
    pub fn merge_provenance(&mut self, provenance: HostProvenance) {
        if let HostProvenance::Manual { address } = &provenance {
            self.addresses.manual = Some(address.clone());
            self.provenance = provenance;
        }
    }

    /// Every known address, most likely to answer first, without duplicates.
    pub fn unique_addresses(&self) -> Vec<HostAddress> {
        let ordered = [
            &self.addresses.active,
            &self.addresses.local,
            &self.addresses.remote,
            &self.addresses.ipv6,
            &self.addresses.manual,
        ];
        let mut unique: Vec<HostAddress> = Vec::with_capacity(ordered.len());
        for address in ordered.into_iter().flatten() {
            if !address.host.is_empty() && !unique.contains(address) {
                unique.push(address.clone());
            }
        }
        unique
    }

    pub fn active_address(&self) -> Option<HostAddress> {
        self.unique_addresses().into_iter().next()
    }

    pub fn running_session_owner(&self) -> Option<ClientId> {
        self.capabilities.running_session_owner
    }
}
