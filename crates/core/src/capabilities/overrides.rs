//! User override surface

use serde::{Deserialize, Serialize};

use super::codec::{AudioLayout, Resolution, VideoCodec};

/// Frame rate used when none is given.
pub const DEFAULT_FPS: u32 = 60;

/// Forced decode mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    #[default]
    Automatic,
    ForceSoftware,
    ForceHardware,
}

/// Preferred codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecPreference {
    #[default]
    Automatic,
    H264,
    Hevc,
    Av1,
}

impl CodecPreference {
    /// The forced codec, or `None` for automatic selection.
    pub fn forced(self) -> Option<VideoCodec> {
        match self {
            CodecPreference::Automatic => None,
            CodecPreference::H264 => Some(VideoCodec::H264),
            CodecPreference::Hevc => Some(VideoCodec::Hevc),
            CodecPreference::Av1 => Some(VideoCodec::Av1),
        }
    }
}

impl From<VideoCodec> for CodecPreference {
    fn from(codec: VideoCodec) -> Self {
        match codec {
            VideoCodec::H264 => CodecPreference::H264,
            VideoCodec::Hevc => CodecPreference::Hevc,
            VideoCodec::Av1 => CodecPreference::Av1,
        }
    }
}

/// Stream settings chosen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserOverrides {
    pub decode_mode: DecodeMode,
    pub preferred_codec: CodecPreference,
    pub hdr_requested: bool,
    pub yuv444_requested: bool,
    pub unlock_bitrate: bool,
    pub target_resolution: Resolution,
    pub target_fps: u32,
    /// Explicit bitrate; `None` derives a default from resolution and fps.
    pub bitrate_kbps: Option<u32>,
    pub audio_layout: AudioLayout,
}

impl Default for UserOverrides {
    fn default() -> Self {
        Self {
            decode_mode: DecodeMode::Automatic,
            preferred_codec: CodecPreference::Automatic,
            hdr_requested: false,
            yuv444_requested: false,
            unlock_bitrate: false,
            target_resolution: Resolution::HD_1080P,
            target_fps: DEFAULT_FPS,
            bitrate_kbps: None,
            audio_layout: AudioLayout::Stereo,
        }
    }
}

impl UserOverrides {
    pub fn with_decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode_mode = mode;
        self
    }

    pub fn with_codec(mut self, preference: impl Into<CodecPreference>) -> Self {
        self.preferred_codec = preference.into();
        self
    }

    pub fn with_hdr(mut self, requested: bool) -> Self {
        self.hdr_requested = requested;
        self
    }

    pub fn with_yuv444(mut self, requested: bool) -> Self {
        self.yuv444_requested = requested;
        self
    }

    pub fn with_unlocked_bitrate(mut self, unlocked: bool) -> Self {
        self.unlock_bitrate = unlocked;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.target_resolution = resolution;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_audio_layout(mut self, layout: AudioLayout) -> Self {
        self.audio_layout = layout;
        self
    }
}
