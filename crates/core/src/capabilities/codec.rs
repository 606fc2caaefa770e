//! Codec, resolution and audio layout primitives shared by host and client models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Video codecs a host can encode and a client can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
    /// AV1
    Av1,
}

impl VideoCodec {
    /// Fixed preference order used when the codec is chosen automatically.
    pub const PREFERENCE_ORDER: [VideoCodec; 3] = [VideoCodec::Hevc, VideoCodec::Av1, VideoCodec::H264];

    /// Stable identifier used in advisory arguments and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Hevc => "hevc",
            VideoCodec::Av1 => "av1",
        }
    }

    /// Whether any profile of this codec can carry HDR (10-bit) video.
    ///
    /// H.264 never does.
    pub fn supports_hdr(self) -> bool {
        !matches!(self, VideoCodec::H264)
    }

    /// Name of the 10-bit profile the client must decode for HDR.
    pub fn hdr_profile(self) -> Option<&'static str> {
        match self {
            VideoCodec::H264 => None,
            VideoCodec::Hevc => Some("HEVC Main10"),
            VideoCodec::Av1 => Some("AV1 Main10"),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VideoCodec::H264 => "H.264",
            VideoCodec::Hevc => "HEVC",
            VideoCodec::Av1 => "AV1",
        };
        f.write_str(label)
    }
}

/// One optional entry per codec.
///
/// Serializes as a table keyed by codec name (`h264`, `hevc`, `av1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCodec<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h264: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hevc: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub av1: Option<T>,
}

impl<T> Default for PerCodec<T> {
    fn default() -> Self {
        Self {
            h264: None,
            hevc: None,
            av1: None,
        }
    }
}

impl<T> PerCodec<T> {
    pub fn get(&self, codec: VideoCodec) -> Option<&T> {
        match codec {
            VideoCodec::H264 => self.h264.as_ref(),
            VideoCodec::Hevc => self.hevc.as_ref(),
            VideoCodec::Av1 => self.av1.as_ref(),
        }
    }

    pub fn set(&mut self, codec: VideoCodec, value: T) {
        *self.slot(codec) = Some(value);
    }

    pub fn remove(&mut self, codec: VideoCodec) -> Option<T> {
        self.slot(codec).take()
    }

    fn slot(&mut self, codec: VideoCodec) -> &mut Option<T> {
        match codec {
            VideoCodec::H264 => &mut self.h264,
            VideoCodec::Hevc => &mut self.hevc,
            VideoCodec::Av1 => &mut self.av1,
        }
    }
}

/// Video resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Largest dimension any H.264 encoder accepts, and the "4K" boundary.
    pub const MAX_4K_DIMENSION: u32 = 4096;

    pub const HD_1080P: Resolution = Resolution::new(1920, 1080);
    pub const UHD_4K: Resolution = Resolution::new(3840, 2160);
    pub const UHD_8K: Resolution = Resolution::new(7680, 4320);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// True when either dimension is beyond what a 4K encode pipeline accepts.
    pub fn exceeds_4k(&self) -> bool {
        self.width > Self::MAX_4K_DIMENSION || self.height > Self::MAX_4K_DIMENSION
    }

    /// True when both dimensions fit inside `limit`.
    pub fn fits_within(&self, limit: &Resolution) -> bool {
        self.width <= limit.width && self.height <= limit.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Audio channel layouts that can be streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioLayout {
    #[default]
    Stereo,
    Surround51,
    Surround71,
}

impl AudioLayout {
    pub fn channel_count(self) -> u8 {
        match self {
            AudioLayout::Stereo => 2,
            AudioLayout::Surround51 => 6,
            AudioLayout::Surround71 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioLayout::Stereo => "stereo",
            AudioLayout::Surround51 => "5.1",
            AudioLayout::Surround71 => "7.1",
        }
    }
}
