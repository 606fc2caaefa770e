//! Stream capability negotiation
//!
//! [`resolve`] reconciles host capabilities, client capabilities and user
//! overrides into one [`ResolvedStreamConfig`]. Steps run in a fixed order
//! (codec, decode path, HDR, chroma, resolution, bitrate, audio) and each
//! downgrade is recorded as an [`Advisory`]. A fatal condition aborts with a
//! [`FatalReason`] and no configuration.
//!
//! The function is pure: identical inputs give identical output, including
//! advisory order.

pub mod advisory;
pub mod bitrate;
pub mod resolved;

pub use advisory::{Advisory, AdvisoryKey, Severity};
pub use resolved::{ChromaMode, DecodePath, ResolvedStreamConfig};

use tracing::debug;

use crate::capabilities::{
    AudioLayout, ClientCapabilities, DecodeMode, DecodeProfile, DecodeSupport, HostCapabilities,
    Resolution, UserOverrides, VideoCodec, DEFAULT_FPS,
};
use crate::error::FatalReason;

/// Resolve a stream configuration.
pub fn resolve(
    host: &HostCapabilities,
    client: &ClientCapabilities,
    overrides: &UserOverrides,
) -> Result<ResolvedStreamConfig, FatalReason> {
    let mut negotiator = Negotiator::new(host, client, overrides);

    let selection = negotiator.select_codec()?;
    let mut decode_path = negotiator.resolve_decode_path(selection)?;
    let hdr = negotiator.resolve_hdr(selection, &mut decode_path)?;
    let chroma = negotiator.resolve_chroma(selection.codec, &mut decode_path);
    let resolution = negotiator.resolve_resolution(selection.codec)?;
    let fps = negotiator.resolve_fps();
    let bitrate_kbps = negotiator.resolve_bitrate(resolution, fps, chroma);
    let audio = negotiator.resolve_audio();

    debug!(
        codec = %selection.codec,
        decode_path = ?decode_path,
        hdr,
        chroma = ?chroma,
        %resolution,
        fps,
        bitrate_kbps,
        advisories = negotiator.advisories.len(),
        "negotiation resolved"
    );

    Ok(ResolvedStreamConfig {
        codec: selection.codec,
        decode_path,
        hdr,
        chroma,
        resolution,
        fps,
        bitrate_kbps,
        audio,
        advisories: negotiator.advisories,
    })
}

#[derive(Debug, Clone, Copy)]
struct CodecSelection {
    codec: VideoCodec,
    /// User forced this codec and the host encodes it.
    forced: bool,
}

struct Negotiator<'a> {
    host: &'a HostCapabilities,
    client: &'a ClientCapabilities,
    overrides: &'a UserOverrides,
    advisories: Vec<Advisory>,
}

impl<'a> Negotiator<'a> {
    fn new(
        host: &'a HostCapabilities,
        client: &'a ClientCapabilities,
        overrides: &'a UserOverrides,
    ) -> Self {
        Self {
            host,
            client,
            overrides,
            advisories: Vec::new(),
        }
    }

    fn push(&mut self, advisory: Advisory) {
        debug!(key = %advisory.key, severity = ?advisory.severity, "negotiation advisory");
        self.advisories.push(advisory);
    }

    fn target(&self) -> Resolution {
        self.overrides.target_resolution
    }

    fn decode(&self, codec: VideoCodec, profile: DecodeProfile) -> DecodeSupport {
        self.client.decode_support(codec, profile, self.target())
    }

    // =========================================================================
    // Codec
    // =========================================================================

    fn select_codec(&mut self) -> Result<CodecSelection, FatalReason> {
        let mut candidates = self.host.encodable_codecs();
        if candidates.is_empty() {
            return Err(FatalReason::NoHostCodec);
        }

        if let Some(forced) = self.overrides.preferred_codec.forced() {
            if self.host.encodes(forced) {
                debug!(codec = %forced, "using forced codec");
                return Ok(CodecSelection {
                    codec: forced,
                    forced: true,
                });
            }
            self.push(Advisory::warning(AdvisoryKey::HostCodecUnsupported).with_arg("codec", forced));
        }

        // Above 4K, H.264 is only a last resort.
        if self.target().exceeds_4k() && candidates.iter().any(|c| *c != VideoCodec::H264) {
            candidates.retain(|c| *c != VideoCodec::H264);
        }

        // Forced hardware decoding rules out codecs the GPU cannot decode,
        // as long as one it can decode remains.
        let force_hardware = self.overrides.decode_mode == DecodeMode::ForceHardware;
        if force_hardware {
            let hardware: Vec<VideoCodec> = candidates
                .iter()
                .copied()
                .filter(|codec| self.decode(*codec, DecodeProfile::Main) == DecodeSupport::Hardware)
                .collect();
            if !hardware.is_empty() {
                debug!(codecs = ?hardware, "narrowed to hardware-decodable codecs");
                candidates = hardware;
            }
        }
        let usable = |support: DecodeSupport| {
            if force_hardware {
                support == DecodeSupport::Hardware
            } else {
                support.is_available()
            }
        };

        if self.overrides.hdr_requested {
            let hdr_common = candidates.iter().copied().find(|codec| {
                self.host.encodes_hdr(*codec)
                    && usable(self.decode(*codec, DecodeProfile::Main))
                    && usable(self.decode(*codec, DecodeProfile::Main10))
            });
            if let Some(codec) = hdr_common {
                debug!(%codec, "selected HDR-capable codec");
                return Ok(CodecSelection { codec, forced: false });
            }
        }

        let mutual = candidates
            .iter()
            .copied()
            .find(|codec| self.decode(*codec, DecodeProfile::Main).is_available());
        if let Some(codec) = mutual {
            debug!(%codec, "selected mutually supported codec");
            return Ok(CodecSelection { codec, forced: false });
        }

        let codec = candidates[0];
        self.push(Advisory::warning(AdvisoryKey::NoCommonCodec).with_arg("codec", codec));
        Ok(CodecSelection { codec, forced: false })
    }

    // =========================================================================
    // Decode path
    // =========================================================================

    fn resolve_decode_path(&mut self, selection: CodecSelection) -> Result<DecodePath, FatalReason> {
        let codec = selection.codec;
        let support = self.decode(codec, DecodeProfile::Main);

        match self.overrides.decode_mode {
            DecodeMode::ForceSoftware => {
                self.push(
                    Advisory::warning(AdvisoryKey::ForcedSoftwareDecoding).with_arg("codec", codec),
                );
                Ok(DecodePath::Software)
            }
            DecodeMode::ForceHardware => {
                if support == DecodeSupport::Hardware {
                    Ok(DecodePath::Hardware)
                } else {
                    Err(FatalReason::UnsatisfiableForcedHardwareDecoding {
                        codec,
                        codec_forced: selection.forced,
                    })
                }
            }
            DecodeMode::Automatic => {
                if support == DecodeSupport::Hardware {
                    return Ok(DecodePath::Hardware);
                }
                let reason = if selection.forced {
                    "codec_forced_without_gpu_support"
                } else {
                    "gpu_lacks_codec"
                };
                self.push(
                    Advisory::warning(AdvisoryKey::SoftwareDecodeFallback)
                        .with_arg("codec", codec)
                        .with_arg("reason", reason),
                );
                Ok(DecodePath::Software)
            }
        }
    }

    // =========================================================================
    // HDR
    // =========================================================================

    fn resolve_hdr(
        &mut self,
        selection: CodecSelection,
        path: &mut DecodePath,
    ) -> Result<bool, FatalReason> {
        if !self.overrides.hdr_requested {
            return Ok(false);
        }
        let codec = selection.codec;

        if codec == VideoCodec::H264 && selection.forced {
            return Err(FatalReason::HdrNotSupportedWithH264);
        }
        if !self.host.supports_hdr() {
            self.push(Advisory::warning(AdvisoryKey::HdrHostUnsupported));
            return Ok(false);
        }
        if codec == VideoCodec::H264 {
            self.push(Advisory::warning(AdvisoryKey::HdrDisabledForH264));
            return Ok(false);
        }

        let hdr_decode = self.decode(codec, DecodeProfile::Main10);
        if !self.host.encodes_hdr(codec) || hdr_decode == DecodeSupport::None {
            return Err(FatalReason::NoCommonHdrCodec { codec });
        }

        if hdr_decode == DecodeSupport::Software {
            match self.overrides.decode_mode {
                DecodeMode::ForceHardware => {
                    return Err(FatalReason::HdrHardwareDecodeUnavailable { codec });
                }
                DecodeMode::Automatic => *path = DecodePath::Software,
                DecodeMode::ForceSoftware => {}
            }
        }
        if *path == DecodePath::Software {
            let profile = codec.hdr_profile().unwrap_or_default();
            self.push(
                Advisory::warning(AdvisoryKey::HdrSoftwareDecode)
                    .with_arg("codec", codec)
                    .with_arg("profile", profile),
            );
        }
        if !self.client.hdr_display {
            self.push(Advisory::info(AdvisoryKey::HdrDisplayUnsupported));
        }
        Ok(true)
    }

    // =========================================================================
    // Chroma
    // =========================================================================

    fn resolve_chroma(&mut self, codec: VideoCodec, path: &mut DecodePath) -> ChromaMode {
        if !self.overrides.yuv444_requested {
            return ChromaMode::Yuv420;
        }
        if !self.host.supports_yuv444() {
            self.push(Advisory::warning(AdvisoryKey::Yuv444HostUnsupported));
            return ChromaMode::Yuv420;
        }
        if !self.host.encodes_yuv444(codec) {
            self.push(Advisory::warning(AdvisoryKey::Yuv444CodecUnsupported).with_arg("codec", codec));
            return ChromaMode::Yuv420;
        }

        match self.decode(codec, DecodeProfile::Yuv444) {
            DecodeSupport::None => {
                self.push(
                    Advisory::warning(AdvisoryKey::Yuv444ClientUnsupported).with_arg("codec", codec),
                );
                return ChromaMode::Yuv420;
            }
            DecodeSupport::Software => match self.overrides.decode_mode {
                DecodeMode::ForceHardware => {
                    self.push(
                        Advisory::warning(AdvisoryKey::Yuv444HardwareUnavailable)
                            .with_arg("codec", codec),
                    );
                    return ChromaMode::Yuv420;
                }
                DecodeMode::Automatic => *path = DecodePath::Software,
                DecodeMode::ForceSoftware => {}
            },
            DecodeSupport::Hardware => {}
        }

        if *path == DecodePath::Software {
            self.push(Advisory::warning(AdvisoryKey::Yuv444SoftwareDecode).with_arg("codec", codec));
        }
        ChromaMode::Yuv444
    }

    // =========================================================================
    // Resolution and bitrate
    // =========================================================================

    fn resolve_resolution(&mut self, codec: VideoCodec) -> Result<Resolution, FatalReason> {
        let requested = self.target();
        let mut resolution = requested;

        if requested.exceeds_4k() {
            if codec == VideoCodec::H264 {
                return Err(FatalReason::ResolutionExceedsH264Limit { resolution: requested });
            }
            // Vendor hosts without HEVC Main10 predate GPUs that encode above 4K.
            if self.host.nvidia_server_software
                && !self.host.encodes_hdr(VideoCodec::Hevc)
                && !self.host.max_encode_resolution.exceeds_4k()
            {
                return Err(FatalReason::HostCannotEncodeResolution { resolution: requested });
            }
            if let Some(version) = self.host.server_software_version {
                if version.major() < 3 {
                    resolution = Resolution::UHD_4K;
                    self.push(
                        Advisory::warning(AdvisoryKey::ResolutionCappedByHostSoftware)
                            .with_arg("version", version)
                            .with_arg("requested", requested)
                            .with_arg("resolution", resolution),
                    );
                }
            }
        }

        let limit = self.host.max_encode_resolution;
        if !resolution.fits_within(&limit) {
            let capped = Resolution::new(
                resolution.width.min(limit.width),
                resolution.height.min(limit.height),
            );
            self.push(
                Advisory::warning(AdvisoryKey::ResolutionCappedByEncoder)
                    .with_arg("requested", resolution)
                    .with_arg("resolution", capped),
            );
            resolution = capped;
        }
        Ok(resolution)
    }

    // =========================================================================
    // Frame rate
    // =========================================================================

    fn resolve_fps(&mut self) -> u32 {
        let requested = self.overrides.target_fps;
        if requested > 0 {
            return requested;
        }
        self.push(
            Advisory::warning(AdvisoryKey::FrameRateReplaced)
                .with_arg("requested", requested)
                .with_arg("fps", DEFAULT_FPS),
        );
        DEFAULT_FPS
    }

    fn resolve_bitrate(&mut self, resolution: Resolution, fps: u32, chroma: ChromaMode) -> u32 {
        let unlocked = self.overrides.unlock_bitrate;
        let mut kbps = self.overrides.bitrate_kbps.unwrap_or_else(|| {
            bitrate::default_bitrate_kbps(resolution, fps, chroma == ChromaMode::Yuv444)
        });

        let ceiling = bitrate::ceiling_kbps(unlocked);
        if kbps > ceiling {
            self.push(
                Advisory::warning(AdvisoryKey::BitrateClamped)
                    .with_arg("requested", kbps)
                    .with_arg("ceiling", ceiling),
            );
            kbps = ceiling;
        }
        if unlocked && kbps > bitrate::STANDARD_CEILING_KBPS {
            self.push(Advisory::info(AdvisoryKey::UnlockedBitrateWiredLan).with_arg("bitrate", kbps));
        }
        if let Some(max) = self.client.max_decode_bitrate_kbps {
            if kbps > max {
                self.push(
                    Advisory::warning(AdvisoryKey::BitrateClampedByDecoder)
                        .with_arg("requested", kbps)
                        .with_arg("ceiling", max),
                );
                kbps = max;
            }
        }
        kbps
    }

    // =========================================================================
    // Audio
    // =========================================================================

    fn resolve_audio(&mut self) -> Option<AudioLayout> {
        let requested = self.overrides.audio_layout;
        let Some(device) = self.client.audio_device else {
            self.push(Advisory::warning(AdvisoryKey::AudioDisabled));
            return None;
        };

        let limited_by = if requested.channel_count() > device.max_channels {
            Some("audio_device")
        } else if !self.host.supports_audio_layout(requested) {
            Some("host")
        } else {
            None
        };

        match limited_by {
            Some(reason) => {
                self.push(
                    Advisory::warning(AdvisoryKey::AudioLayoutDowngraded)
                        .with_arg("requested", requested.as_str())
                        .with_arg("reason", reason),
                );
                Some(AudioLayout::Stereo)
            }
            None => Some(requested),
        }
    }
}
