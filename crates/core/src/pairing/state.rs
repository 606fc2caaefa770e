//! Pairing attempt state machine
//!
//! `Idle -> Requesting -> AwaitingPin -> Succeeded | Failed`. A failed
//! attempt may re-enter `Requesting`; a succeeded one is final.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::pin::Pin;
use crate::capabilities::HostId;
use crate::error::PairingError;

/// Why a pairing attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingFailure {
    #[error("The PIN entered on the host did not match")]
    PinMismatch,

    #[error("You cannot pair while a previous session is still running on the host PC. Quit any running games or reboot the host PC, then try pairing again.")]
    SessionAlreadyRunning,

    #[error("The host returned error {0}")]
    HostReturnedError(u16),

    /// Another device is pairing with the host right now
    #[error("Another pairing attempt is in progress on the host")]
    HostAlreadyPairing,

    #[error("The host rejected the pairing request")]
    Rejected,

    #[error("The host is unreachable")]
    Unreachable,

    #[error("Pairing timed out")]
    TimedOut,

    #[error("Pairing was cancelled")]
    Cancelled,
}

impl PairingFailure {
    pub fn message_key(&self) -> &'static str {
        match self {
            PairingFailure::PinMismatch => "pairing_pin_mismatch",
            PairingFailure::SessionAlreadyRunning => "pairing_session_already_running",
            PairingFailure::HostReturnedError(_) => "pairing_host_error",
            PairingFailure::HostAlreadyPairing => "pairing_host_already_pairing",
            PairingFailure::Rejected => "pairing_rejected",
            PairingFailure::Unreachable => "pairing_unreachable",
            PairingFailure::TimedOut => "pairing_timed_out",
            PairingFailure::Cancelled => "pairing_cancelled",
        }
    }

    /// Whether a new attempt may succeed. A running session needs user
    /// action on the host first.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PairingFailure::SessionAlreadyRunning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PairingState {
    Idle,
    Requesting,
    AwaitingPin { pin: Pin },
    Succeeded,
    Failed { reason: PairingFailure },
}

impl PairingState {
    pub fn name(&self) -> &'static str {
        match self {
            PairingState::Idle => "idle",
            PairingState::Requesting => "requesting",
            PairingState::AwaitingPin { .. } => "awaiting_pin",
            PairingState::Succeeded => "succeeded",
            PairingState::Failed { .. } => "failed",
        }
    }
}

/// One PIN-based pairing attempt against a host.
#[derive(Debug, Clone)]
pub struct PairingAttempt {
    host_id: HostId,
    state: PairingState,
    /// Number of times `Requesting` was entered.
    requests: u32,
    updated_at: DateTime<Utc>,
}

impl PairingAttempt {
    pub fn new(host_id: HostId) -> Self {
        Self {
            host_id,
            state: PairingState::Idle,
            requests: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// PIN shown to the user while awaiting host confirmation.
    pub fn pin(&self) -> Option<Pin> {
        match self.state {
            PairingState::AwaitingPin { pin } => Some(pin),
            _ => None,
        }
    }

    /// In flight: `Requesting` or `AwaitingPin`.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            PairingState::Requesting | PairingState::AwaitingPin { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            PairingState::Succeeded | PairingState::Failed { .. }
        )
    }

    pub fn request(&mut self) -> Result<(), PairingError> {
        match self.state {
            PairingState::Idle | PairingState::Failed { .. } => {
                self.requests += 1;
                self.transition(PairingState::Requesting);
                Ok(())
            }
            _ => Err(self.invalid("request")),
        }
    }

    pub fn host_ready(&mut self, pin: Pin) -> Result<(), PairingError> {
        match self.state {
            PairingState::Requesting => {
                self.transition(PairingState::AwaitingPin { pin });
                Ok(())
            }
            _ => Err(self.invalid("host_ready")),
        }
    }

    pub fn confirm(&mut self) -> Result<(), PairingError> {
        match self.state {
            PairingState::AwaitingPin { .. } => {
                self.transition(PairingState::Succeeded);
                Ok(())
            }
            _ => Err(self.invalid("confirm")),
        }
    }

    /// Fail an in-flight attempt. The host may be unreachable before it
    /// ever reaches `AwaitingPin`.
    pub fn fail(&mut self, reason: PairingFailure) -> Result<(), PairingError> {
        if self.is_active() {
            self.transition(PairingState::Failed { reason });
            Ok(())
        } else {
            Err(self.invalid("fail"))
        }
    }

    fn transition(&mut self, next: PairingState) {
        tracing::debug!(
            host_id = %self.host_id,
            from = self.state.name(),
            to = next.name(),
            "pairing transition"
        );
        self.state = next;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, event: &'static str) -> PairingError {
        PairingError::InvalidTransition {
            state: self.state.name(),
            event,
        }
    }
}
