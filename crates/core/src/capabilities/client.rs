//! Client-side decode and presentation capabilities

use serde::{Deserialize, Serialize};

use super::codec::{PerCodec, Resolution, VideoCodec};

/// How a client can decode one codec profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeSupport {
    #[default]
    None,
    Software,
    Hardware,
}

impl DecodeSupport {
    pub fn is_available(self) -> bool {
        self != DecodeSupport::None
    }
}

/// Decode support per profile of a single codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCodecSupport {
    /// 8-bit 4:2:0
    pub main: DecodeSupport,
    /// 10-bit 4:2:0, needed for HDR
    pub main10: DecodeSupport,
    /// 8-bit 4:4:4
    pub yuv444: DecodeSupport,
}

impl ClientCodecSupport {
    /// Every profile decodes in hardware.
    pub fn hardware() -> Self {
        Self {
            main: DecodeSupport::Hardware,
            main10: DecodeSupport::Hardware,
            yuv444: DecodeSupport::Hardware,
        }
    }

    /// Every profile decodes, but only in software.
    pub fn software() -> Self {
        Self {
            main: DecodeSupport::Software,
            main10: DecodeSupport::Software,
            yuv444: DecodeSupport::Software,
        }
    }

    pub fn with_main(mut self, support: DecodeSupport) -> Self {
        self.main = support;
        self
    }

    pub fn with_main10(mut self, support: DecodeSupport) -> Self {
        self.main10 = support;
        self
    }

    pub fn with_yuv444(mut self, support: DecodeSupport) -> Self {
        self.yuv444 = support;
        self
    }
}

/// Codec profile a decode capability is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeProfile {
    Main,
    Main10,
    Yuv444,
}

/// Result of opening the local audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDeviceCapability {
    pub max_channels: u8,
}

/// Capabilities of the local device, usually produced by a decoder probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Per-codec decode support. Absent codecs cannot be decoded at all.
    #[serde(default = "software_codecs")]
    pub codecs: PerCodec<ClientCodecSupport>,

    /// Largest resolution the hardware decoder accepts. Beyond it, hardware
    /// support degrades to software.
    #[serde(default = "default_max_decode_resolution")]
    pub max_decode_resolution: Resolution,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_decode_bitrate_kbps: Option<u32>,

    #[serde(default)]
    pub hdr_display: bool,

    /// `None` when the audio device could not be opened.
    #[serde(default = "default_audio_device")]
    pub audio_device: Option<AudioDeviceCapability>,
}

/// Every codec decodable in software, which any client with a CPU decoder has.
fn software_codecs() -> PerCodec<ClientCodecSupport> {
    let mut codecs = PerCodec::default();
    for codec in VideoCodec::PREFERENCE_ORDER {
        codecs.set(codec, ClientCodecSupport::software());
    }
    codecs
}

fn default_max_decode_resolution() -> Resolution {
    Resolution::UHD_4K
}

fn default_audio_device() -> Option<AudioDeviceCapability> {
    Some(AudioDeviceCapability { max_channels: 2 })
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            codecs: software_codecs(),
            max_decode_resolution: default_max_decode_resolution(),
            max_decode_bitrate_kbps: None,
            hdr_display: false,
            audio_device: default_audio_device(),
        }
    }
}

impl ClientCapabilities {
    /// Software-only client: decodes every codec and profile on the CPU.
    pub fn software_only() -> Self {
        Self::default()
    }

    /// Client with no decoder at all for `codec`.
    pub fn without_codec(mut self, codec: VideoCodec) -> Self {
        self.codecs.remove(codec);
        self
    }

    pub fn with_codec(mut self, codec: VideoCodec, support: ClientCodecSupport) -> Self {
        self.codecs.set(codec, support);
        self
    }

    pub fn with_max_decode_resolution(mut self, resolution: Resolution) -> Self {
        self.max_decode_resolution = resolution;
        self
    }

    pub fn with_max_decode_bitrate(mut self, kbps: u32) -> Self {
        self.max_decode_bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_hdr_display(mut self, hdr_display: bool) -> Self {
        self.hdr_display = hdr_display;
        self
    }

    pub fn with_audio_device(mut self, device: Option<AudioDeviceCapability>) -> Self {
        self.audio_device = device;
        self
    }

    /// Effective decode support for a codec profile at `target`.
    pub fn decode_support(
        &self,
        codec: VideoCodec,
        profile: DecodeProfile,
        target: Resolution,
    ) -> DecodeSupport {
        let Some(support) = self.codecs.get(codec) else {
            return DecodeSupport::None;
        };
        let raw = match profile {
            DecodeProfile::Main => support.main,
            DecodeProfile::Main10 => support.main10,
            DecodeProfile::Yuv444 => support.yuv444,
        };
        if raw == DecodeSupport::Hardware && !target.fits_within(&self.max_decode_resolution) {
            DecodeSupport::Software
        } else {
            raw
        }
    }
}
