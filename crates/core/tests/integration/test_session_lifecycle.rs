//! Integration tests for session start, resume and quit ownership

use playlink_core::capabilities::ClientId;
use playlink_core::error::TransportError;
use playlink_core::registry::{ConnectivityState, HostAddress, PairState, DEFAULT_HTTP_PORT};
use playlink_core::transport::mock::MockCall;
use playlink_core::transport::LaunchMode;
use playlink_core::{
    AdvisoryEvent, AdvisoryKey, ChannelSink, ClientCapabilities, ClientConfig, HostCapabilities,
    HostId, HostRegistry, MockDecoder, MockTransport, RegistryEvent, ServerInfo, SessionError,
    SessionManager, Severity, UserOverrides, VideoCodec,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const APP_ID: u32 = 881448767;

struct Setup {
    transport: Arc<MockTransport>,
    registry: Arc<HostRegistry>,
    decoder: Arc<MockDecoder>,
    sessions: SessionManager,
    advisories: broadcast::Receiver<AdvisoryEvent>,
    address: HostAddress,
    host_id: HostId,
}

fn setup(paired: bool) -> Setup {
    let transport = Arc::new(MockTransport::new());
    let registry = Arc::new(HostRegistry::new(transport.clone(), ClientConfig::default()));
    let decoder = Arc::new(MockDecoder::new(ClientCapabilities::default()));
    let (sink, advisories) = ChannelSink::new(32);
    let sessions = SessionManager::new(registry.clone(), decoder.clone(), Arc::new(sink));

    let address = HostAddress::new("10.0.0.40", DEFAULT_HTTP_PORT);
    let info = ServerInfo {
        name: "Den".to_string(),
        paired,
        mac: Some("AA:BB:CC:DD:EE:FF".to_string()),
        local_address: None,
        remote_address: None,
        ipv6_address: None,
        capabilities: HostCapabilities::new(HostId::new()),
    };
    transport.add_host(address.clone(), info.clone());
    let host_id = registry.insert_discovered(info, address.clone());

    Setup {
        transport,
        registry,
        decoder,
        sessions,
        advisories,
        address,
        host_id,
    }
}

fn launch_calls(transport: &MockTransport) -> Vec<MockCall> {
    transport
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::Launch { .. }))
        .collect()
}

#[tokio::test]
async fn test_unpaired_host_cannot_start() {
    let s = setup(false);
    let err = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::NotPaired { .. }));
    assert_eq!(err.message_key(), "host_not_paired");
    assert!(s.transport.calls().is_empty());
}

#[tokio::test]
async fn test_connect_failure_only_marks_connectivity_unknown() {
    let s = setup(true);
    let before = s.registry.get(s.host_id).unwrap();
    let mut events = s.registry.subscribe();
    s.transport.set_reachable(&s.address, false);

    let err = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to connect to Den"));
    assert!(err.is_retryable());
    let after = s.registry.get(s.host_id).unwrap();
    assert_eq!(after.connectivity, ConnectivityState::Unknown);
    assert_eq!(after.pair_state, PairState::Paired);
    assert_eq!(after.name, before.name);
    assert_eq!(after.addresses, before.addresses);
    assert!(launch_calls(&s.transport).is_empty());
    // A single update, straight to Unknown; never a transient Offline.
    let mut updates = 0;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event, RegistryEvent::HostUpdated(s.host_id));
        updates += 1;
    }
    assert_eq!(updates, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_quit_leaves_registry_consistent() {
    let s = setup(true);
    s.sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();
    let before = s.registry.get(s.host_id).unwrap();
    s.transport.set_quit_delay(&s.address, Duration::from_secs(60));

    let mut quit = Box::pin(s.sessions.quit_app(s.host_id));
    tokio::select! {
        _ = &mut quit => panic!("quit finished while the host was stalling"),
        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
    }
    assert!(s.registry.get(s.host_id).unwrap().pending_quit);
    assert!(s.registry.is_busy(s.host_id));
    assert_eq!(s.transport.quit_calls(), 1);

    drop(quit);

    let after = s.registry.get(s.host_id).unwrap();
    assert!(!after.pending_quit);
    assert!(!s.registry.is_busy(s.host_id));
    assert_eq!(after.connectivity, before.connectivity);
    assert_eq!(after.pair_state, before.pair_state);
    assert_eq!(after.running_app_id, Some(APP_ID));
    assert!(s.registry.lock_host(s.host_id).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_quit_timeout_leaves_registry_consistent() {
    let s = setup(true);
    s.sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();
    let before = s.registry.get(s.host_id).unwrap();
    s.transport.set_quit_delay(&s.address, Duration::from_secs(60));

    let result = tokio::time::timeout(Duration::from_secs(5), s.sessions.quit_app(s.host_id)).await;
    assert!(result.is_err());

    let after = s.registry.get(s.host_id).unwrap();
    assert!(!after.pending_quit);
    assert!(!s.registry.is_busy(s.host_id));
    assert_eq!(after.connectivity, before.connectivity);
    assert_eq!(after.pair_state, before.pair_state);
}

#[tokio::test]
async fn test_start_publishes_advisories_and_records_owner() {
    let mut s = setup(true);
    let session = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();

    assert_eq!(session.mode, LaunchMode::Launch);
    assert_eq!(session.config.codec, VideoCodec::H264);

    // The default client decodes in software only.
    let event = s.advisories.recv().await.unwrap();
    assert_eq!(event.host_id, s.host_id);
    assert_eq!(event.advisory.key, AdvisoryKey::SoftwareDecodeFallback);
    assert_eq!(session.config.advisories.len(), 1);

    let host = s.registry.get(s.host_id).unwrap();
    assert_eq!(host.running_app_id, Some(APP_ID));
    assert_eq!(host.running_session_owner(), Some(s.sessions.client_id()));
    assert_eq!(s.decoder.initialized(), vec![session.config]);
}

#[tokio::test]
async fn test_same_app_resumes() {
    let s = setup(true);
    s.sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();
    let resumed = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();

    assert_eq!(resumed.mode, LaunchMode::Resume);
    let modes: Vec<LaunchMode> = launch_calls(&s.transport)
        .into_iter()
        .filter_map(|call| match call {
            MockCall::Launch { mode, .. } => Some(mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, vec![LaunchMode::Launch, LaunchMode::Resume]);
}

#[tokio::test]
async fn test_other_own_app_must_be_quit_first() {
    let s = setup(true);
    s.sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();

    let err = s
        .sessions
        .start_session(s.host_id, 7, &UserOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::OtherAppRunning {
            running_app_id: APP_ID,
            ..
        }
    ));
}

#[tokio::test]
async fn test_quit_of_foreign_app_never_reaches_host() {
    let s = setup(true);
    let other_client = ClientId::new();
    s.transport.update_info(&s.address, |info| {
        info.capabilities.running_app_id = Some(APP_ID);
        info.capabilities.running_session_owner = Some(other_client);
    });

    let err = s.sessions.quit_app(s.host_id).await.unwrap_err();

    assert!(matches!(err, SessionError::NotOwner { app_id: APP_ID, .. }));
    assert!(!err.is_retryable());
    assert_eq!(err.to_string(), "The running game on Den wasn't started by this PC");
    assert_eq!(s.transport.quit_calls(), 0);
    let info = s.transport.info(&s.address).unwrap();
    assert_eq!(info.capabilities.running_app_id, Some(APP_ID));
    assert!(!s.registry.get(s.host_id).unwrap().pending_quit);
}

#[tokio::test]
async fn test_foreign_app_blocks_launch() {
    let s = setup(true);
    s.transport.update_info(&s.address, |info| {
        info.capabilities.running_app_id = Some(APP_ID);
        info.capabilities.running_session_owner = Some(ClientId::new());
    });

    let err = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotOwner { .. }));
    assert!(launch_calls(&s.transport).is_empty());
}

#[tokio::test]
async fn test_quit_ignored_by_host_reported_as_not_owner() {
    let s = setup(true);
    s.sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();
    s.transport.set_ignore_quit(&s.address, true);

    let err = s.sessions.quit_app(s.host_id).await.unwrap_err();
    assert!(matches!(err, SessionError::NotOwner { .. }));
    assert_eq!(s.transport.quit_calls(), 1);
}

#[tokio::test]
async fn test_quit_transport_failure() {
    let s = setup(true);
    s.sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap();
    s.transport.set_quit_error(
        &s.address,
        Some(TransportError::HostError {
            code: 599,
            message: "busy".to_string(),
        }),
    );

    let err = s.sessions.quit_app(s.host_id).await.unwrap_err();
    assert!(err.to_string().contains("could not be performed"));
    assert!(!s.registry.get(s.host_id).unwrap().pending_quit);
}

#[tokio::test]
async fn test_decoder_failure_aborts_before_launch() {
    let s = setup(true);
    s.decoder.fail_initialize("no surface");

    let err = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::DecoderInitFailed { .. }));
    assert!(err.is_retryable());
    assert!(launch_calls(&s.transport).is_empty());
    assert_eq!(s.registry.get(s.host_id).unwrap().running_app_id, None);
}

#[tokio::test]
async fn test_fatal_negotiation_publishes_fatal_advisory() {
    let mut s = setup(true);
    let overrides = UserOverrides::default()
        .with_codec(VideoCodec::H264)
        .with_hdr(true);

    let err = s
        .sessions
        .start_session(s.host_id, APP_ID, &overrides)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Negotiation(_)));
    assert_eq!(err.message_key(), "hdr_not_supported_with_h264");
    let event = s.advisories.recv().await.unwrap();
    assert_eq!(event.advisory.severity, Severity::Fatal);
    assert_eq!(event.advisory.key, AdvisoryKey::HdrNotSupportedWithH264);
    assert!(launch_calls(&s.transport).is_empty());
}

#[tokio::test]
async fn test_launch_failure_leaves_no_owner() {
    let s = setup(true);
    s.transport
        .set_launch_error(&s.address, Some(TransportError::ServiceUnavailable));

    let err = s
        .sessions
        .start_session(s.host_id, APP_ID, &UserOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::LaunchFailed { .. }));
    assert_eq!(s.registry.get(s.host_id).unwrap().running_session_owner(), None);
}
