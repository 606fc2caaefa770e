//! Resolved stream configuration

use serde::{Deserialize, Serialize};

use super::advisory::{Advisory, Severity};
use crate::capabilities::{AudioLayout, Resolution, VideoCodec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePath {
    Software,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaMode {
    #[default]
    Yuv420,
    Yuv444,
}

/// Final configuration for one stream.
///
/// Only ever constructed complete; a fatal negotiation yields no value at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStreamConfig {
    pub codec: VideoCodec,
    pub decode_path: DecodePath,
    pub hdr: bool,
    pub chroma: ChromaMode,
    pub resolution: Resolution,
    pub fps: u32,
    pub bitrate_kbps: u32,
    /// `None` when audio is disabled for the session.
    pub audio: Option<AudioLayout>,
    /// Decisions in the order they were made.
    pub advisories: Vec<Advisory>,
}

impl ResolvedStreamConfig {
    pub fn warnings(&self) -> impl Iterator<Item = &Advisory> {
        self.advisories
            .iter()
            .filter(|advisory| advisory.severity == Severity::Warning)
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }
}
