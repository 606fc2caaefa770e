//! Capability model
//!
//! Host and client media capabilities plus the user override surface. These
//! are plain data records consumed by [`crate::negotiation::resolve`].

pub mod client;
pub mod codec;
pub mod host;
pub mod overrides;

pub use client::{
    AudioDeviceCapability, ClientCapabilities, ClientCodecSupport, DecodeProfile, DecodeSupport,
};
pub use codec::{AudioLayout, PerCodec, Resolution, VideoCodec};
pub use host::{HostCapabilities, HostCodecSupport, SoftwareVersion};
pub use overrides::{CodecPreference, DecodeMode, UserOverrides, DEFAULT_FPS};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a streaming host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(Uuid);

impl HostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of this client as seen by hosts. Used to gate remote quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
