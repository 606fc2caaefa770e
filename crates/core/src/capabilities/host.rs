//! Host-side capability record

use serde::{Deserialize, Serialize};
use std::fmt;

use super::codec::{AudioLayout, PerCodec, Resolution, VideoCodec};
use super::{ClientId, HostId};

/// What a host can do with one codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostCodecSupport {
    /// Host can encode the 8-bit 4:2:0 profile.
    pub encode: bool,
    /// Host can encode the 10-bit profile used for HDR.
    #[serde(default)]
    pub hdr: bool,
    /// Host can encode 4:4:4 chroma.
    #[serde(default)]
    pub yuv444: bool,
}

impl HostCodecSupport {
    pub fn encode_only() -> Self {
        Self {
            encode: true,
            hdr: false,
            yuv444: false,
        }
    }

    pub fn full() -> Self {
        Self {
            encode: true,
            hdr: true,
            yuv444: true,
        }
    }
}

/// Streaming-service version reported by the host (e.g. `3.20.4.14`).
///
/// Missing components parse as zero; a non-numeric component stops parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SoftwareVersion(pub [u32; 4]);

impl SoftwareVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let mut quad = [0u32; 4];
        let mut parsed_any = false;
        for (slot, part) in quad.iter_mut().zip(text.trim().split('.')) {
            match part.parse::<u32>() {
                Ok(value) => {
                    *slot = value;
                    parsed_any = true;
                }
                Err(_) => break,
            }
        }
        parsed_any.then_some(SoftwareVersion(quad))
    }

    pub fn major(&self) -> u32 {
        self.0[0]
    }
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

/// Capabilities and live state reported by a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Unique host identifier.
    #[serde(default)]
    pub uuid: HostId,

    /// Per-codec encode support. Absent codecs are unsupported.
    #[serde(default)]
    pub codecs: PerCodec<HostCodecSupport>,

    /// Largest resolution the host GPU will encode.
    #[serde(default = "default_max_resolution")]
    pub max_encode_resolution: Resolution,

    /// Streaming-service version, when the host reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_software_version: Option<SoftwareVersion>,

    /// Whether the host runs the vendor's own streaming software, whose GPU
    /// generation can be inferred from its codec list.
    #[serde(default)]
    pub nvidia_server_software: bool,

    /// Audio layouts the host can capture and encode.
    #[serde(default = "default_audio_layouts")]
    pub audio_layouts: Vec<AudioLayout>,

    /// HTTPS control port.
    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// App currently running on the host, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_app_id: Option<u32>,

    /// Client that started the running app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_session_owner: Option<ClientId>,
}

fn default_max_resolution() -> Resolution {
    Resolution::UHD_4K
}

fn default_audio_layouts() -> Vec<AudioLayout> {
    vec![AudioLayout::Stereo]
}

fn default_https_port() -> u16 {
    47984
}

impl HostCapabilities {
    /// Create a host record that encodes only H.264 at up to 4K.
    pub fn new(uuid: HostId) -> Self {
        let mut codecs = PerCodec::default();
        codecs.set(VideoCodec::H264, HostCodecSupport::encode_only());
        Self {
            uuid,
            codecs,
            max_encode_resolution: Resolution::UHD_4K,
            server_software_version: None,
            nvidia_server_software: false,
            audio_layouts: default_audio_layouts(),
            https_port: default_https_port(),
            running_app_id: None,
            running_session_owner: None,
        }
    }

    /// Replace support for one codec.
    pub fn with_codec(mut self, codec: VideoCodec, support: HostCodecSupport) -> Self {
        self.codecs.set(codec, support);
        self
    }

    /// Drop a codec entirely.
    pub fn without_codec(mut self, codec: VideoCodec) -> Self {
        self.codecs.remove(codec);
        self
    }

    pub fn with_max_encode_resolution(mut self, resolution: Resolution) -> Self {
        self.max_encode_resolution = resolution;
        self
    }

    pub fn with_software_version(mut self, version: SoftwareVersion) -> Self {
        self.server_software_version = Some(version);
        self
    }

    pub fn with_audio_layouts(mut self, layouts: Vec<AudioLayout>) -> Self {
        self.audio_layouts = layouts;
        self
    }

    pub fn with_running_app(mut self, app_id: u32, owner: Option<ClientId>) -> Self {
        self.running_app_id = Some(app_id);
        self.running_session_owner = owner;
        self
    }

    fn support(&self, codec: VideoCodec) -> HostCodecSupport {
        self.codecs.get(codec).copied().unwrap_or_default()
    }

    pub fn encodes(&self, codec: VideoCodec) -> bool {
        self.support(codec).encode
    }

    /// HDR encode for `codec`. H.264 is never HDR-capable whatever the host claims.
    pub fn encodes_hdr(&self, codec: VideoCodec) -> bool {
        let support = self.support(codec);
        codec.supports_hdr() && support.encode && support.hdr
    }

    pub fn encodes_yuv444(&self, codec: VideoCodec) -> bool {
        let support = self.support(codec);
        support.encode && support.yuv444
    }

    /// Host can stream HDR with at least one codec.
    pub fn supports_hdr(&self) -> bool {
        VideoCodec::PREFERENCE_ORDER
            .iter()
            .any(|codec| self.encodes_hdr(*codec))
    }

    /// Host can stream 4:4:4 with at least one codec.
    pub fn supports_yuv444(&self) -> bool {
        VideoCodec::PREFERENCE_ORDER
            .iter()
            .any(|codec| self.encodes_yuv444(*codec))
    }

    /// Encodable codecs in automatic preference order.
    pub fn encodable_codecs(&self) -> Vec<VideoCodec> {
        VideoCodec::PREFERENCE_ORDER
            .iter()
            .copied()
            .filter(|codec| self.encodes(*codec))
            .collect()
    }

    pub fn supports_audio_layout(&self, layout: AudioLayout) -> bool {
        layout == AudioLayout::Stereo || self.audio_layouts.contains(&layout)
    }
}
