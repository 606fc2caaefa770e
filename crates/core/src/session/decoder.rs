//! Local video decoder collaborator

use async_trait::async_trait;
use thiserror::Error;

use crate::capabilities::ClientCapabilities;
use crate::negotiation::ResolvedStreamConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    #[error("Decoder capability probe failed: {0}")]
    Probe(String),

    #[error("Decoder initialization failed: {0}")]
    Initialize(String),
}

/// Hardware/software decoder on this client.
///
/// `probe` queries local hardware and may be slow; it is called once per
/// session start.
#[async_trait]
pub trait DecoderBackend: Send + Sync {
    async fn probe(&self) -> Result<ClientCapabilities, DecoderError>;

    async fn initialize(&self, config: &ResolvedStreamConfig) -> Result<(), DecoderError>;
}

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockDecoder;

#[cfg(any(test, feature = "test-support"))]
mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Decoder with fixed capabilities and a scriptable init failure.
    pub struct MockDecoder {
        capabilities: Mutex<ClientCapabilities>,
        init_error: Mutex<Option<String>>,
        initialized: Mutex<Vec<ResolvedStreamConfig>>,
    }

    impl MockDecoder {
        pub fn new(capabilities: ClientCapabilities) -> Self {
            Self {
                capabilities: Mutex::new(capabilities),
                init_error: Mutex::new(None),
                initialized: Mutex::new(Vec::new()),
            }
        }

        pub fn set_capabilities(&self, capabilities: ClientCapabilities) {
            *self.capabilities.lock() = capabilities;
        }

        /// Make every following `initialize` fail with `reason`.
        pub fn fail_initialize(&self, reason: impl Into<String>) {
            *self.init_error.lock() = Some(reason.into());
        }

        /// Configurations passed to successful `initialize` calls.
        pub fn initialized(&self) -> Vec<ResolvedStreamConfig> {
            self.initialized.lock().clone()
        }
    }

    impl Default for MockDecoder {
        fn default() -> Self {
            Self::new(ClientCapabilities::default())
        }
    }

    #[async_trait]
    impl DecoderBackend for MockDecoder {
        async fn probe(&self) -> Result<ClientCapabilities, DecoderError> {
            Ok(self.capabilities.lock().clone())
        }

        async fn initialize(&self, config: &ResolvedStreamConfig) -> Result<(), DecoderError> {
            if let Some(reason) = self.init_error.lock().clone() {
                return Err(DecoderError::Initialize(reason));
            }
            self.initialized.lock().push(config.clone());
            Ok(())
        }
    }
}
