//! Integration tests for stream negotiation
//!
//! Properties checked across whole capability grids rather than single cases.

use playlink_core::capabilities::{
    ClientCodecSupport, CodecPreference, DecodeMode, DecodeProfile, DecodeSupport,
    HostCodecSupport, Resolution,
};
use playlink_core::negotiation::{DecodePath, Severity};
use playlink_core::{
    resolve, AdvisoryKey, ClientCapabilities, FatalReason, HostCapabilities, HostId,
    UserOverrides, VideoCodec,
};

const ALL_CODECS: [VideoCodec; 3] = VideoCodec::PREFERENCE_ORDER;

/// Every non-empty subset of codecs.
fn codec_subsets() -> Vec<Vec<VideoCodec>> {
    (1u8..8)
        .map(|mask| {
            ALL_CODECS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, codec)| *codec)
                .collect()
        })
        .collect()
}

fn host_with(codecs: &[VideoCodec], support: HostCodecSupport) -> HostCapabilities {
    let mut host = HostCapabilities::new(HostId::new()).without_codec(VideoCodec::H264);
    for codec in codecs {
        host = host.with_codec(*codec, support);
    }
    host
}

/// Clients ranging from no decoder at all to full hardware support.
fn client_variants() -> Vec<ClientCapabilities> {
    let mut clients = vec![ClientCapabilities::software_only()];
    for codecs in codec_subsets() {
        let mut hardware = ClientCapabilities::default();
        let mut missing = ClientCapabilities::default();
        for codec in ALL_CODECS {
            if codecs.contains(&codec) {
                hardware = hardware.with_codec(codec, ClientCodecSupport::hardware());
            } else {
                missing = missing.without_codec(codec);
            }
        }
        clients.push(hardware);
        clients.push(missing);
    }
    clients
}

fn hdr_gpu_client() -> ClientCapabilities {
    ClientCapabilities::default()
        .with_codec(VideoCodec::H264, ClientCodecSupport::hardware())
        .with_codec(VideoCodec::Hevc, ClientCodecSupport::hardware())
        .with_codec(VideoCodec::Av1, ClientCodecSupport::hardware())
        .with_hdr_display(true)
}

#[test]
fn test_automatic_never_fatal_when_host_encodes_something() {
    for codecs in codec_subsets() {
        for support in [HostCodecSupport::encode_only(), HostCodecSupport::full()] {
            let host = host_with(&codecs, support);
            for client in client_variants() {
                let result = resolve(&host, &client, &UserOverrides::default());
                assert!(
                    result.is_ok(),
                    "host {:?} client {:?} failed: {:?}",
                    codecs,
                    client.codecs,
                    result
                );
            }
        }
    }
}

#[test]
fn test_forced_codec_mismatch_is_never_fatal() {
    for codecs in codec_subsets() {
        let host = host_with(&codecs, HostCodecSupport::encode_only());
        for forced in ALL_CODECS {
            for client in client_variants() {
                let overrides = UserOverrides::default().with_codec(forced);
                let config = resolve(&host, &client, &overrides).unwrap();
                if codecs.contains(&forced) {
                    assert_eq!(config.codec, forced);
                } else {
                    assert!(codecs.contains(&config.codec));
                    let first = &config.advisories[0];
                    assert_eq!(first.key, AdvisoryKey::HostCodecUnsupported);
                    assert_eq!(first.severity, Severity::Warning);
                    assert_eq!(first.arg("codec"), Some(forced.to_string().as_str()));
                }
            }
        }
    }
}

#[test]
fn test_forced_hardware_without_gpu_support_always_fatal() {
    for codec in ALL_CODECS {
        let host = host_with(&ALL_CODECS, HostCodecSupport::encode_only());
        let overrides = UserOverrides::default()
            .with_codec(codec)
            .with_decode_mode(DecodeMode::ForceHardware);

        let software = ClientCapabilities::software_only();
        assert_eq!(
            resolve(&host, &software, &overrides).unwrap_err(),
            FatalReason::UnsatisfiableForcedHardwareDecoding {
                codec,
                codec_forced: true
            }
        );

        let absent = ClientCapabilities::default().without_codec(codec);
        assert!(matches!(
            resolve(&host, &absent, &overrides),
            Err(FatalReason::UnsatisfiableForcedHardwareDecoding { .. })
        ));
    }
}

#[test]
fn test_hdr_with_forced_h264_is_fatal() {
    let host = host_with(&ALL_CODECS, HostCodecSupport::full());
    let overrides = UserOverrides::default()
        .with_codec(VideoCodec::H264)
        .with_hdr(true);
    assert_eq!(
        resolve(&host, &hdr_gpu_client(), &overrides).unwrap_err(),
        FatalReason::HdrNotSupportedWithH264
    );
}

#[test]
fn test_hdr_with_automatic_h264_is_disabled_with_advisory() {
    // Host streams HDR with HEVC, but this client has no HEVC decoder at all.
    let host = host_with(&[VideoCodec::H264], HostCodecSupport::encode_only())
        .with_codec(VideoCodec::Hevc, HostCodecSupport::full());
    let client = hdr_gpu_client().without_codec(VideoCodec::Hevc);
    let overrides = UserOverrides::default().with_hdr(true);
    let config = resolve(&host, &client, &overrides).unwrap();

    assert_eq!(config.codec, VideoCodec::H264);
    assert!(!config.hdr);
    assert!(config
        .advisories
        .iter()
        .any(|a| a.key == AdvisoryKey::HdrDisabledForH264 && a.severity == Severity::Warning));
}

#[test]
fn test_hdr_without_common_codec_is_fatal() {
    let host = host_with(&[VideoCodec::Hevc], HostCodecSupport::full());
    let client = hdr_gpu_client().with_codec(
        VideoCodec::Hevc,
        ClientCodecSupport::hardware().with_main10(DecodeSupport::None),
    );
    let overrides = UserOverrides::default().with_hdr(true);
    assert_eq!(
        resolve(&host, &client, &overrides).unwrap_err(),
        FatalReason::NoCommonHdrCodec {
            codec: VideoCodec::Hevc
        }
    );
}

#[test]
fn test_above_4k_fatal_only_when_h264_is_the_only_codec() {
    let overrides = UserOverrides::default().with_resolution(Resolution::UHD_8K);
    let client = hdr_gpu_client().with_max_decode_resolution(Resolution::UHD_8K);

    let h264_only = host_with(&[VideoCodec::H264], HostCodecSupport::encode_only())
        .with_max_encode_resolution(Resolution::UHD_8K);
    assert_eq!(
        resolve(&h264_only, &client, &overrides).unwrap_err(),
        FatalReason::ResolutionExceedsH264Limit {
            resolution: Resolution::UHD_8K
        }
    );

    for alternative in [VideoCodec::Hevc, VideoCodec::Av1] {
        let host = host_with(&[VideoCodec::H264, alternative], HostCodecSupport::encode_only())
            .with_max_encode_resolution(Resolution::UHD_8K);
        let config = resolve(&host, &client, &overrides).unwrap();
        assert_eq!(config.codec, alternative);
        assert_eq!(config.resolution, Resolution::UHD_8K);
    }
}

#[test]
fn test_resolve_is_deterministic() {
    let host = host_with(&[VideoCodec::Hevc, VideoCodec::H264], HostCodecSupport::encode_only());
    let client = ClientCapabilities::default()
        .with_codec(VideoCodec::H264, ClientCodecSupport::hardware())
        .with_audio_device(None);
    let overrides = UserOverrides::default()
        .with_codec(CodecPreference::Av1)
        .with_hdr(true)
        .with_yuv444(true)
        .with_unlocked_bitrate(true)
        .with_bitrate(900_000);

    let first = resolve(&host, &client, &overrides).unwrap();
    let second = resolve(&host, &client, &overrides).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert!(first.advisories.len() >= 4);
}

#[test]
fn test_forced_hardware_with_automatic_codec_fatal_only_without_any_gpu_codec() {
    let overrides = UserOverrides::default().with_decode_mode(DecodeMode::ForceHardware);
    for codecs in codec_subsets() {
        let host = host_with(&codecs, HostCodecSupport::encode_only());
        for client in client_variants() {
            let hardware_codec = codecs.iter().any(|codec| {
                client.decode_support(*codec, DecodeProfile::Main, Resolution::HD_1080P)
                    == DecodeSupport::Hardware
            });
            match resolve(&host, &client, &overrides) {
                Ok(config) => {
                    assert!(hardware_codec, "{:?} resolved without a GPU codec", codecs);
                    assert_eq!(config.decode_path, DecodePath::Hardware);
                }
                Err(reason) => {
                    assert!(!hardware_codec, "{:?} fatal despite a GPU codec: {}", codecs, reason);
                    assert!(matches!(
                        reason,
                        FatalReason::UnsatisfiableForcedHardwareDecoding {
                            codec_forced: false,
                            ..
                        }
                    ));
                }
            }
        }
    }
}

/// Host {HEVC, H.264}; GPU decodes H.264 in hardware and HEVC only in
/// software. Forcing hardware picks H.264 instead of failing on HEVC.
#[test]
fn test_forced_hardware_skips_software_only_codec() {
    let host = host_with(&[VideoCodec::Hevc, VideoCodec::H264], HostCodecSupport::encode_only());
    let client = ClientCapabilities::default()
        .with_codec(VideoCodec::H264, ClientCodecSupport::hardware());
    let overrides = UserOverrides::default().with_decode_mode(DecodeMode::ForceHardware);

    let config = resolve(&host, &client, &overrides).unwrap();
    assert_eq!(config.codec, VideoCodec::H264);
    assert_eq!(config.decode_path, DecodePath::Hardware);
    assert!(config.advisories.is_empty());
}

#[test]
fn test_forced_hardware_hdr_prefers_codec_with_hardware_main10() {
    let host = host_with(&[VideoCodec::Hevc, VideoCodec::Av1], HostCodecSupport::full());
    let client = hdr_gpu_client().with_codec(
        VideoCodec::Hevc,
        ClientCodecSupport::hardware().with_main10(DecodeSupport::Software),
    );
    let overrides = UserOverrides::default()
        .with_hdr(true)
        .with_decode_mode(DecodeMode::ForceHardware);

    let config = resolve(&host, &client, &overrides).unwrap();
    assert_eq!(config.codec, VideoCodec::Av1);
    assert!(config.hdr);
    assert_eq!(config.decode_path, DecodePath::Hardware);
}

/// Host {HEVC, H.264}, no HDR; GPU decodes H.264 in hardware only.
#[test]
fn test_hevc_software_fallback_rather_than_codec_downgrade() {
    let host = host_with(&[VideoCodec::Hevc, VideoCodec::H264], HostCodecSupport::encode_only());
    let client = ClientCapabilities::default()
        .with_codec(VideoCodec::H264, ClientCodecSupport::hardware());

    let config = resolve(&host, &client, &UserOverrides::default()).unwrap();

    assert_eq!(config.codec, VideoCodec::Hevc);
    assert_eq!(config.decode_path, DecodePath::Software);
    assert_eq!(config.advisories.len(), 1);
    let advisory = &config.advisories[0];
    assert_eq!(advisory.key, AdvisoryKey::SoftwareDecodeFallback);
    assert_eq!(advisory.severity, Severity::Warning);
    assert_eq!(advisory.arg("codec"), Some("HEVC"));
}

#[test]
fn test_forced_av1_hardware_without_av1_decoder() {
    let host = host_with(&ALL_CODECS, HostCodecSupport::encode_only());
    let client = hdr_gpu_client().without_codec(VideoCodec::Av1);
    let overrides = UserOverrides::default()
        .with_codec(VideoCodec::Av1)
        .with_decode_mode(DecodeMode::ForceHardware);

    let err = resolve(&host, &client, &overrides).unwrap_err();
    assert_eq!(
        err,
        FatalReason::UnsatisfiableForcedHardwareDecoding {
            codec: VideoCodec::Av1,
            codec_forced: true
        }
    );
    assert_eq!(err.message_key(), "unsatisfiable_forced_hardware_decoding");
}

#[test]
fn test_fatal_reason_serializes_with_context() {
    let reason = FatalReason::NoCommonHdrCodec {
        codec: VideoCodec::Av1,
    };
    let json = serde_json::to_value(&reason).unwrap();
    assert_eq!(json["reason"], "no_common_hdr_codec");
}
