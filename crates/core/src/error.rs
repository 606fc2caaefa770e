//! Error types for the PlayLink client core

use serde::Serialize;
use thiserror::Error;

use crate::capabilities::{HostId, Resolution, VideoCodec};
use crate::negotiation::{Advisory, AdvisoryKey};
use crate::pairing::PairingFailure;

/// Result type alias for PlayLink core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error umbrella
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Negotiation(#[from] FatalReason),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =========================================================================
// Negotiation
// =========================================================================

/// Why negotiation could not produce any stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FatalReason {
    /// Host reported no encodable codec at all
    #[error("Host does not support encoding any video codec")]
    NoHostCodec,

    /// Force hardware decoding, but the client GPU cannot decode the codec
    #[error("Force hardware decoding cannot be satisfied: no hardware {codec} decoder")]
    UnsatisfiableForcedHardwareDecoding {
        codec: VideoCodec,
        /// The codec itself was forced by the user
        codec_forced: bool,
    },

    #[error("HDR is not supported with H.264")]
    HdrNotSupportedWithH264,

    #[error("Host and client don't support the same HDR video codecs (selected {codec})")]
    NoCommonHdrCodec { codec: VideoCodec },

    /// HDR can only be decoded in software, but hardware decoding is forced
    #[error("Force hardware decoding cannot be satisfied: no hardware {codec} HDR decoder")]
    HdrHardwareDecodeUnavailable { codec: VideoCodec },

    #[error("Resolution {resolution} exceeds the H.264 limit of 4096 pixels")]
    ResolutionExceedsH264Limit { resolution: Resolution },

    #[error("Host GPU cannot encode {resolution}")]
    HostCannotEncodeResolution { resolution: Resolution },
}

impl FatalReason {
    pub fn key(&self) -> AdvisoryKey {
        match self {
            FatalReason::NoHostCodec => AdvisoryKey::NoHostCodec,
            FatalReason::UnsatisfiableForcedHardwareDecoding { .. } => {
                AdvisoryKey::UnsatisfiableForcedHardwareDecoding
            }
            FatalReason::HdrNotSupportedWithH264 => AdvisoryKey::HdrNotSupportedWithH264,
            FatalReason::NoCommonHdrCodec { .. } => AdvisoryKey::NoCommonHdrCodec,
            FatalReason::HdrHardwareDecodeUnavailable { .. } => {
                AdvisoryKey::HdrHardwareDecodeUnavailable
            }
            FatalReason::ResolutionExceedsH264Limit { .. } => AdvisoryKey::ResolutionExceedsH264Limit,
            FatalReason::HostCannotEncodeResolution { .. } => AdvisoryKey::HostCannotEncodeResolution,
        }
    }

    /// Stable key for user-facing translation.
    pub fn message_key(&self) -> &'static str {
        self.key().as_str()
    }

    /// Render as a fatal-severity advisory for advisory sinks.
    pub fn to_advisory(&self) -> Advisory {
        let advisory = Advisory::fatal(self.key());
        match self {
            FatalReason::UnsatisfiableForcedHardwareDecoding {
                codec,
                codec_forced,
            } => advisory
                .with_arg("codec", codec)
                .with_arg("codec_forced", codec_forced),
            FatalReason::NoCommonHdrCodec { codec }
            | FatalReason::HdrHardwareDecodeUnavailable { codec } => {
                advisory.with_arg("codec", codec)
            }
            FatalReason::ResolutionExceedsH264Limit { resolution }
            | FatalReason::HostCannotEncodeResolution { resolution } => {
                advisory.with_arg("resolution", resolution)
            }
            FatalReason::NoHostCodec | FatalReason::HdrNotSupportedWithH264 => advisory,
        }
    }
}

// =========================================================================
// Transport
// =========================================================================

/// Failure reported by the host transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Host {address} is unreachable")]
    Unreachable { address: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    TimedOut {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Host is up but temporarily refusing requests
    #[error("Host service unavailable")]
    ServiceUnavailable,

    /// Host answered with an error status
    #[error("Host returned error {code}: {message}")]
    HostError { code: u16, message: String },
}

impl TransportError {
    /// Only "service unavailable" is worth an automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::ServiceUnavailable)
    }
}

// =========================================================================
// Registry
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown host {0}")]
    UnknownHost(HostId),

    #[error("Host name must not be empty")]
    InvalidName,

    #[error("Invalid host address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Unable to add host {address}: {source}")]
    AddFailed {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to refresh host {host_name}: {source}")]
    PollFailed {
        host_name: String,
        #[source]
        source: TransportError,
    },
}

impl RegistryError {
    pub fn message_key(&self) -> &'static str {
        match self {
            RegistryError::UnknownHost(_) => "unknown_host",
            RegistryError::InvalidName => "invalid_host_name",
            RegistryError::InvalidAddress { .. } => "invalid_host_address",
            RegistryError::AddFailed { .. } => "add_host_failed",
            RegistryError::PollFailed { .. } => "host_poll_failed",
        }
    }
}

// =========================================================================
// Pairing
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    /// Another attempt already exists for this host
    #[error("Pairing with host {host_id} is already in progress")]
    AttemptInProgress { host_id: HostId },

    /// Attempt reached a terminal failure
    #[error(transparent)]
    Failed(#[from] PairingFailure),

    #[error("Invalid pairing transition: {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("Unknown host {0}")]
    UnknownHost(HostId),

    #[error("Unpair request failed: {0}")]
    Unpair(#[source] TransportError),
}

impl PairingError {
    pub fn message_key(&self) -> &'static str {
        match self {
            PairingError::AttemptInProgress { .. } => "pairing_attempt_in_progress",
            PairingError::Failed(failure) => failure.message_key(),
            PairingError::InvalidTransition { .. } => "pairing_invalid_transition",
            PairingError::UnknownHost(_) => "unknown_host",
            PairingError::Unpair(_) => "unpair_failed",
        }
    }

    /// A fresh attempt may be started right away.
    pub fn is_retryable(&self) -> bool {
        match self {
            PairingError::AttemptInProgress { .. } => true,
            PairingError::Failed(failure) => failure.is_retryable(),
            PairingError::Unpair(source) => source.is_retryable(),
            PairingError::InvalidTransition { .. } | PairingError::UnknownHost(_) => false,
        }
    }
}

// =========================================================================
// Session
// =========================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{host_name} has not been paired")]
    NotPaired { host_name: String },

    #[error("Failed to connect to {host_name}: {source}")]
    ConnectFailed {
        host_name: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Negotiation(#[from] FatalReason),

    #[error("Decoder initialization failed: {reason}")]
    DecoderInitFailed { reason: String },

    /// Running app was started by another client
    #[error("The running game on {host_name} wasn't started by this PC")]
    NotOwner { host_name: String, app_id: u32 },

    /// This client already runs a different app on the host
    #[error("App {running_app_id} is already running on {host_name}; quit it first")]
    OtherAppRunning {
        host_name: String,
        running_app_id: u32,
    },

    #[error("No app is running on {host_name}")]
    NoRunningApp { host_name: String },

    #[error("Starting the app on {host_name} could not be performed: {source}")]
    LaunchFailed {
        host_name: String,
        #[source]
        source: TransportError,
    },

    #[error("Quitting the app on {host_name} could not be performed: {source}")]
    QuitFailed {
        host_name: String,
        #[source]
        source: TransportError,
    },

    #[error("Unknown host {0}")]
    UnknownHost(HostId),
}

impl SessionError {
    pub fn message_key(&self) -> &'static str {
        match self {
            SessionError::NotPaired { .. } => "host_not_paired",
            SessionError::ConnectFailed { .. } => "connect_failed",
            SessionError::Negotiation(reason) => reason.message_key(),
            SessionError::DecoderInitFailed { .. } => "decoder_init_failed",
            SessionError::NotOwner { .. } => "quit_not_owner",
            SessionError::OtherAppRunning { .. } => "other_app_running",
            SessionError::NoRunningApp { .. } => "no_running_app",
            SessionError::LaunchFailed { .. } => "launch_failed",
            SessionError::QuitFailed { .. } => "quit_failed",
            SessionError::UnknownHost(_) => "unknown_host",
        }
    }

    /// Whether the same request may succeed later without action on
    /// another device.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SessionError::NotOwner { .. } | SessionError::UnknownHost(_)
        )
    }
}

// =========================================================================
// Configuration
// =========================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
