//! Advisory records produced by negotiation
//!
//! An advisory is a `(severity, message key, args)` triple. The presentation
//! layer owns the rendered text; the key is the stable contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Advisory severity, in increasing order of impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Warning,
    Fatal,
}

/// Stable message keys for every decision negotiation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKey {
    // Codec selection
    HostCodecUnsupported,
    NoCommonCodec,

    // Decode path
    ForcedSoftwareDecoding,
    SoftwareDecodeFallback,

    // HDR
    HdrHostUnsupported,
    HdrDisabledForH264,
    HdrSoftwareDecode,
    HdrDisplayUnsupported,

    // 4:4:4 chroma
    Yuv444HostUnsupported,
    Yuv444CodecUnsupported,
    Yuv444ClientUnsupported,
    Yuv444HardwareUnavailable,
    Yuv444SoftwareDecode,

    // Resolution, frame rate and bitrate
    ResolutionCappedByHostSoftware,
    ResolutionCappedByEncoder,
    FrameRateReplaced,
    BitrateClamped,
    BitrateClampedByDecoder,
    UnlockedBitrateWiredLan,

    // Audio
    AudioLayoutDowngraded,
    AudioDisabled,

    // Fatal outcomes
    NoHostCodec,
    UnsatisfiableForcedHardwareDecoding,
    HdrNotSupportedWithH264,
    NoCommonHdrCodec,
    HdrHardwareDecodeUnavailable,
    ResolutionExceedsH264Limit,
    HostCannotEncodeResolution,
}

impl AdvisoryKey {
    pub fn as_str(self) -> &'static str {
        match self {
            AdvisoryKey::HostCodecUnsupported => "host_codec_unsupported",
            AdvisoryKey::NoCommonCodec => "no_common_codec",
            AdvisoryKey::ForcedSoftwareDecoding => "forced_software_decoding",
            AdvisoryKey::SoftwareDecodeFallback => "software_decode_fallback",
            AdvisoryKey::HdrHostUnsupported => "hdr_host_unsupported",
            AdvisoryKey::HdrDisabledForH264 => "hdr_disabled_for_h264",
            AdvisoryKey::HdrSoftwareDecode => "hdr_software_decode",
            AdvisoryKey::HdrDisplayUnsupported => "hdr_display_unsupported",
            AdvisoryKey::Yuv444HostUnsupported => "yuv444_host_unsupported",
            AdvisoryKey::Yuv444CodecUnsupported => "yuv444_codec_unsupported",
            AdvisoryKey::Yuv444ClientUnsupported => "yuv444_client_unsupported",
            AdvisoryKey::Yuv444HardwareUnavailable => "yuv444_hardware_unavailable",
            AdvisoryKey::Yuv444SoftwareDecode => "yuv444_software_decode",
            AdvisoryKey::ResolutionCappedByHostSoftware => "resolution_capped_by_host_software",
            AdvisoryKey::ResolutionCappedByEncoder => "resolution_capped_by_encoder",
            AdvisoryKey::FrameRateReplaced => "frame_rate_replaced",
            AdvisoryKey::BitrateClamped => "bitrate_clamped",
            AdvisoryKey::BitrateClampedByDecoder => "bitrate_clamped_by_decoder",
            AdvisoryKey::UnlockedBitrateWiredLan => "unlocked_bitrate_wired_lan",
            AdvisoryKey::AudioLayoutDowngraded => "audio_layout_downgraded",
            AdvisoryKey::AudioDisabled => "audio_disabled",
            AdvisoryKey::NoHostCodec => "no_host_codec",
            AdvisoryKey::UnsatisfiableForcedHardwareDecoding => {
                "unsatisfiable_forced_hardware_decoding"
            }
            AdvisoryKey::HdrNotSupportedWithH264 => "hdr_not_supported_with_h264",
            AdvisoryKey::NoCommonHdrCodec => "no_common_hdr_codec",
            AdvisoryKey::HdrHardwareDecodeUnavailable => "hdr_hardware_decode_unavailable",
            AdvisoryKey::ResolutionExceedsH264Limit => "resolution_exceeds_h264_limit",
            AdvisoryKey::HostCannotEncodeResolution => "host_cannot_encode_resolution",
        }
    }
}

impl fmt::Display for AdvisoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-relevant negotiation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub severity: Severity,
    pub key: AdvisoryKey,
    /// Substitution arguments for the rendered message.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl Advisory {
    pub fn new(severity: Severity, key: AdvisoryKey) -> Self {
        Self {
            severity,
            key,
            args: BTreeMap::new(),
        }
    }

    pub fn info(key: AdvisoryKey) -> Self {
        Self::new(Severity::Informational, key)
    }

    pub fn warning(key: AdvisoryKey) -> Self {
        Self::new(Severity::Warning, key)
    }

    pub fn fatal(key: AdvisoryKey) -> Self {
        Self::new(Severity::Fatal, key)
    }

    /// Attach a substitution argument.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.args.insert(name.into(), value.to_string());
        self
    }

    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.key)?;
        for (name, value) in &self.args {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}
