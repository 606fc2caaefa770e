//! Advisory sink trait and implementations
//!
//! Negotiation advisories are pushed to an [`AdvisorySink`] for the
//! presentation layer, which owns the rendered text.

use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::capabilities::HostId;
use crate::negotiation::{Advisory, Severity};

/// Advisory raised while starting a session with a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryEvent {
    pub host_id: HostId,
    #[serde(flatten)]
    pub advisory: Advisory,
}

impl AdvisoryEvent {
    pub fn new(host_id: HostId, advisory: Advisory) -> Self {
        Self { host_id, advisory }
    }
}

/// Trait for advisory delivery targets
///
/// Implementations include:
/// - `TracingSink` - log lines at a level matching the severity
/// - `TerminalSink` - JSONL output to terminal/file
/// - `ChannelSink` - broadcast channel for UI subscribers
pub trait AdvisorySink: Send + Sync {
    fn publish(&self, event: AdvisoryEvent) -> Result<(), AdvisorySinkError>;

    /// Close the sink and perform any cleanup
    fn close(&self) -> Result<(), AdvisorySinkError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorySinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel send error: {0}")]
    Channel(String),
}

/// Logs each advisory through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AdvisorySink for TracingSink {
    fn publish(&self, event: AdvisoryEvent) -> Result<(), AdvisorySinkError> {
        let AdvisoryEvent { host_id, advisory } = &event;
        match advisory.severity {
            Severity::Informational => info!(host_id = %host_id, %advisory, "stream advisory"),
            Severity::Warning => warn!(host_id = %host_id, %advisory, "stream advisory"),
            Severity::Fatal => error!(host_id = %host_id, %advisory, "stream advisory"),
        }
        Ok(())
    }
}

/// Terminal/file JSONL sink
pub struct TerminalSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> AdvisorySink for TerminalSink<W> {
    fn publish(&self, event: AdvisoryEvent) -> Result<(), AdvisorySinkError> {
        let line = serde_json::to_string(&event)
            .map_err(|e| AdvisorySinkError::Serialization(e.to_string()))?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Broadcast channel sink for UI subscribers
///
/// Publishing with no live subscriber is not an error; advisories are also
/// carried on the resolved configuration.
pub struct ChannelSink {
    sender: broadcast::Sender<AdvisoryEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<AdvisoryEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Create a new channel sink with default capacity (256)
    pub fn with_default_capacity() -> (Self, broadcast::Receiver<AdvisoryEvent>) {
        Self::new(256)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdvisoryEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl AdvisorySink for ChannelSink {
    fn publish(&self, event: AdvisoryEvent) -> Result<(), AdvisorySinkError> {
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(event)
            .map_err(|e| AdvisorySinkError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Fans each advisory out to several sinks
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn AdvisorySink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn AdvisorySink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: impl AdvisorySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl AdvisorySink for MultiSink {
    fn publish(&self, event: AdvisoryEvent) -> Result<(), AdvisorySinkError> {
        for sink in &self.sinks {
            sink.publish(event.clone())?;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), AdvisorySinkError> {
        for sink in &self.sinks {
            sink.close()?;
        }
        Ok(())
    }
}
