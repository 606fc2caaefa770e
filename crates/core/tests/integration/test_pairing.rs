//! Integration tests for PIN pairing against the mock transport

use playlink_core::error::TransportError;
use playlink_core::registry::{HostAddress, PairState, DEFAULT_HTTP_PORT};
use playlink_core::transport::mock::MockCall;
use playlink_core::transport::PairOutcome;
use playlink_core::{
    ClientConfig, HostCapabilities, HostId, HostRegistry, MockTransport, PairingError,
    PairingFailure, PairingManager, PairingState, ServerInfo,
};
use std::sync::Arc;
use std::time::Duration;

struct Setup {
    transport: Arc<MockTransport>,
    registry: Arc<HostRegistry>,
    pairing: PairingManager,
    address: HostAddress,
    host_id: HostId,
}

fn setup() -> Setup {
    let transport = Arc::new(MockTransport::new());
    let registry = Arc::new(HostRegistry::new(transport.clone(), ClientConfig::default()));
    let address = HostAddress::new("192.168.1.30", DEFAULT_HTTP_PORT);
    let info = ServerInfo {
        name: "Living Room".to_string(),
        paired: false,
        mac: None,
        local_address: None,
        remote_address: None,
        ipv6_address: None,
        capabilities: HostCapabilities::new(HostId::new()),
    };
    transport.add_host(address.clone(), info.clone());
    let host_id = registry.insert_discovered(info, address.clone());
    Setup {
        pairing: PairingManager::new(registry.clone()),
        transport,
        registry,
        address,
        host_id,
    }
}

#[tokio::test]
async fn test_pairing_succeeds_with_displayed_pin() {
    let s = setup();
    let handle = s.pairing.begin(s.host_id).unwrap();
    let pin = handle.pin();

    let attempt = handle.outcome().await.unwrap();
    assert_eq!(attempt.state(), PairingState::Succeeded);
    assert_eq!(s.registry.get(s.host_id).unwrap().pair_state, PairState::Paired);
    assert!(s
        .transport
        .calls()
        .contains(&MockCall::Pair(s.address.clone(), pin)));
    assert!(!s.registry.has_pairing_attempt(s.host_id));
}

#[tokio::test]
async fn test_wrong_pin_twice_then_success() {
    let s = setup();
    s.transport.script_pair(&s.address, Ok(PairOutcome::PinWrong));
    s.transport.script_pair(&s.address, Ok(PairOutcome::PinWrong));

    for _ in 0..2 {
        let err = s.pairing.pair(s.host_id).await.unwrap_err();
        assert_eq!(err, PairingError::Failed(PairingFailure::PinMismatch));
        assert!(err.is_retryable());
        assert_eq!(s.registry.get(s.host_id).unwrap().pair_state, PairState::Unpaired);
    }

    s.pairing.pair(s.host_id).await.unwrap();
    assert_eq!(s.transport.pair_calls(), 3);
    assert_eq!(s.registry.get(s.host_id).unwrap().pair_state, PairState::Paired);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_attempt_rejected_without_disturbing_first() {
    let s = setup();
    s.transport.set_pair_delay(&s.address, Duration::from_secs(10));

    let first = s.pairing.begin(s.host_id).unwrap();
    let second = s.pairing.begin(s.host_id);
    assert_eq!(
        second.err(),
        Some(PairingError::AttemptInProgress { host_id: s.host_id })
    );

    let attempt = first.outcome().await.unwrap();
    assert_eq!(attempt.state(), PairingState::Succeeded);
    assert_eq!(s.transport.pair_calls(), 1);
}

#[tokio::test]
async fn test_host_running_session_reports_already_running() {
    let s = setup();
    s.transport.update_info(&s.address, |info| {
        info.capabilities.running_app_id = Some(881448767);
    });
    s.registry.poll(s.host_id).await.unwrap();
    s.transport.script_pair(&s.address, Ok(PairOutcome::Failed));

    let err = s.pairing.pair(s.host_id).await.unwrap_err();
    assert_eq!(err, PairingError::Failed(PairingFailure::SessionAlreadyRunning));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_host_error_code_forwarded() {
    let s = setup();
    s.transport.script_pair(
        &s.address,
        Err(TransportError::HostError {
            code: 500,
            message: "internal".to_string(),
        }),
    );
    s.transport
        .script_pair(&s.address, Ok(PairOutcome::AlreadyInProgress));

    let err = s.pairing.pair(s.host_id).await.unwrap_err();
    assert_eq!(err, PairingError::Failed(PairingFailure::HostReturnedError(500)));
    assert!(err.is_retryable());

    let err = s.pairing.pair(s.host_id).await.unwrap_err();
    assert_eq!(err, PairingError::Failed(PairingFailure::HostAlreadyPairing));
}

#[tokio::test(start_paused = true)]
async fn test_handshake_times_out() {
    let s = setup();
    s.transport.set_pair_delay(&s.address, Duration::from_secs(600));

    let err = s.pairing.pair(s.host_id).await.unwrap_err();
    assert_eq!(err, PairingError::Failed(PairingFailure::TimedOut));
    assert!(!s.registry.has_pairing_attempt(s.host_id));
}

#[tokio::test(start_paused = true)]
async fn test_removing_host_cancels_attempt() {
    let s = setup();
    s.transport.set_pair_delay(&s.address, Duration::from_secs(60));

    let handle = s.pairing.begin(s.host_id).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    s.registry.remove(s.host_id).unwrap();

    assert_eq!(
        handle.outcome().await.unwrap_err(),
        PairingError::Failed(PairingFailure::Cancelled)
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_attempt_does_not_release_newer_slot() {
    let s = setup();
    s.transport.set_pair_delay(&s.address, Duration::from_secs(60));
    let info = s.transport.info(&s.address).unwrap();

    let stale = s.pairing.begin(s.host_id).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    s.registry.remove(s.host_id).unwrap();
    s.registry.insert_discovered(info, s.address.clone());
    let current = s.pairing.begin(s.host_id).unwrap();

    assert_eq!(
        stale.outcome().await.unwrap_err(),
        PairingError::Failed(PairingFailure::Cancelled)
    );
    assert!(s.registry.has_pairing_attempt(s.host_id));
    assert_eq!(
        s.pairing.begin(s.host_id).err(),
        Some(PairingError::AttemptInProgress { host_id: s.host_id })
    );

    let attempt = current.outcome().await.unwrap();
    assert_eq!(attempt.state(), PairingState::Succeeded);
    assert!(!s.registry.has_pairing_attempt(s.host_id));
}

#[tokio::test]
async fn test_unpair_clears_both_sides() {
    let s = setup();
    s.pairing.pair(s.host_id).await.unwrap();
    assert!(s.transport.info(&s.address).unwrap().paired);

    s.pairing.unpair(s.host_id).await.unwrap();
    assert_eq!(s.registry.get(s.host_id).unwrap().pair_state, PairState::Unpaired);
    assert!(!s.transport.info(&s.address).unwrap().paired);
}

#[tokio::test]
async fn test_unknown_host_rejected() {
    let s = setup();
    let stranger = HostId::new();
    assert_eq!(
        s.pairing.begin(stranger).err(),
        Some(PairingError::UnknownHost(stranger))
    );
}
