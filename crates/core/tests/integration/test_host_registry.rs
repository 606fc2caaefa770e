//! Integration tests for the host registry

use playlink_core::registry::{
    ConnectivityState, HostAddress, HostProvenance, RegistryEvent, DEFAULT_HTTP_PORT,
};
use playlink_core::{
    ClientConfig, HostCapabilities, HostId, HostRegistry, MockTransport, RegistryError,
    RetryPolicy, ServerInfo,
};
use std::sync::Arc;
use std::time::Duration;

fn server_info(name: &str, id: HostId) -> ServerInfo {
    ServerInfo {
        name: name.to_string(),
        paired: true,
        mac: None,
        local_address: None,
        remote_address: None,
        ipv6_address: None,
        capabilities: HostCapabilities::new(id),
    }
}

fn registry_with(config: ClientConfig) -> (Arc<MockTransport>, HostRegistry) {
    let transport = Arc::new(MockTransport::new());
    let registry = HostRegistry::new(transport.clone(), config);
    (transport, registry)
}

fn registry() -> (Arc<MockTransport>, HostRegistry) {
    registry_with(ClientConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_add_manual_retries_service_unavailable_once() {
    let (transport, registry) = registry();
    let address = HostAddress::new("192.168.1.50", DEFAULT_HTTP_PORT);
    let id = HostId::new();
    transport.add_host(address.clone(), server_info("Office", id));
    transport.fail_service_unavailable(&address, 1);

    let added = registry.add_manual("192.168.1.50").await.unwrap();

    assert_eq!(added, id);
    assert_eq!(transport.server_info_calls(), 2);
    let host = registry.get(id).unwrap();
    assert!(host.provenance.is_manual());
    assert_eq!(host.addresses.manual, Some(address));
    assert_eq!(host.connectivity, ConnectivityState::Online);
}

#[tokio::test(start_paused = true)]
async fn test_add_manual_gives_up_after_retry_budget() {
    let (transport, registry) = registry();
    let address = HostAddress::new("192.168.1.50", DEFAULT_HTTP_PORT);
    transport.add_host(address.clone(), server_info("Office", HostId::new()));
    transport.fail_service_unavailable(&address, 2);

    let err = registry.add_manual("192.168.1.50").await.unwrap_err();
    assert!(matches!(err, RegistryError::AddFailed { .. }));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_add_manual_without_retry_policy() {
    let config = ClientConfig::default().with_service_unavailable_retry(RetryPolicy::None);
    let (transport, registry) = registry_with(config);
    let address = HostAddress::new("192.168.1.50", DEFAULT_HTTP_PORT);
    transport.add_host(address.clone(), server_info("Office", HostId::new()));
    transport.fail_service_unavailable(&address, 1);

    assert!(registry.add_manual("192.168.1.50").await.is_err());
    assert_eq!(transport.server_info_calls(), 1);
}

#[tokio::test]
async fn test_add_manual_rejects_bad_input() {
    let (transport, registry) = registry();
    let err = registry.add_manual("10.0.0.1/games").await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidAddress { .. }));
    assert_eq!(err.message_key(), "invalid_host_address");
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_manual_add_of_discovered_host_merges() {
    let (transport, registry) = registry();
    let address = HostAddress::new("10.0.0.5", 48010);
    let id = HostId::new();
    let info = server_info("Gaming PC", id);
    transport.add_host(address.clone(), info.clone());
    registry.insert_discovered(info, address.clone());

    let added = registry.add_manual("10.0.0.5:48010").await.unwrap();

    assert_eq!(added, id);
    assert_eq!(registry.len(), 1);
    assert!(matches!(
        registry.get(id).unwrap().provenance,
        HostProvenance::Manual { .. }
    ));
}

#[tokio::test]
async fn test_custom_name_survives_polls() {
    let (transport, registry) = registry();
    let address = HostAddress::new("10.0.0.5", DEFAULT_HTTP_PORT);
    let id = HostId::new();
    transport.add_host(address.clone(), server_info("DESKTOP-8F2K", id));
    registry.insert_discovered(server_info("DESKTOP-8F2K", id), address.clone());

    registry.rename(id, "Upstairs").unwrap();
    transport.update_info(&address, |info| info.name = "DESKTOP-RENAMED".to_string());
    let host = registry.poll(id).await.unwrap();

    assert_eq!(host.name, "Upstairs");
    assert!(matches!(registry.rename(id, "  "), Err(RegistryError::InvalidName)));
}

#[tokio::test]
async fn test_lifecycle_events() {
    let (_, registry) = registry();
    let mut events = registry.subscribe();
    let id = HostId::new();
    registry.insert_discovered(
        server_info("Den", id),
        HostAddress::new("10.0.0.9", DEFAULT_HTTP_PORT),
    );
    registry.rename(id, "Basement").unwrap();
    registry.remove(id).unwrap();

    assert_eq!(events.recv().await.unwrap(), RegistryEvent::HostAdded(id));
    assert_eq!(events.recv().await.unwrap(), RegistryEvent::HostUpdated(id));
    assert_eq!(events.recv().await.unwrap(), RegistryEvent::HostRemoved(id));
    assert!(registry.get(id).is_none());
    assert!(matches!(registry.remove(id), Err(RegistryError::UnknownHost(_))));
}

#[tokio::test]
async fn test_poll_falls_back_to_next_address() {
    let (transport, registry) = registry();
    let stale = HostAddress::new("10.0.0.5", DEFAULT_HTTP_PORT);
    let local = HostAddress::new("192.168.1.5", DEFAULT_HTTP_PORT);
    let id = HostId::new();
    let mut info = server_info("Den", id);
    info.local_address = Some(local.clone());
    transport.add_host(stale.clone(), info.clone());
    transport.add_host(local.clone(), info.clone());
    registry.insert_discovered(info, stale.clone());

    transport.set_reachable(&stale, false);
    let host = registry.poll(id).await.unwrap();
    assert_eq!(host.addresses.active, Some(local));
    assert_eq!(host.connectivity, ConnectivityState::Online);
}

#[tokio::test]
async fn test_poll_skips_address_owned_by_another_host() {
    let (transport, registry) = registry();
    let address = HostAddress::new("10.0.0.5", DEFAULT_HTTP_PORT);
    let id = HostId::new();
    transport.add_host(address.clone(), server_info("Den", id));
    registry.insert_discovered(server_info("Den", id), address.clone());

    // DHCP handed the address to a different machine.
    transport.update_info(&address, |info| {
        info.capabilities = HostCapabilities::new(HostId::new());
    });
    assert!(registry.poll(id).await.is_err());
    assert_eq!(registry.get(id).unwrap().connectivity, ConnectivityState::Offline);
}

#[tokio::test(start_paused = true)]
async fn test_operations_on_one_host_are_serialized() {
    let (transport, registry) = registry();
    let address = HostAddress::new("10.0.0.5", DEFAULT_HTTP_PORT);
    let id = HostId::new();
    transport.add_host(address.clone(), server_info("Den", id));
    registry.insert_discovered(server_info("Den", id), address);

    let guard = registry.lock_host(id).await.unwrap();
    assert!(registry.is_busy(id));
    let blocked = tokio::time::timeout(Duration::from_secs(1), registry.poll(id)).await;
    assert!(blocked.is_err());

    drop(guard);
    assert!(registry.poll(id).await.is_ok());
}

#[tokio::test]
async fn test_poll_all_polls_idle_hosts_and_skips_busy_ones() {
    let (transport, registry) = registry();
    let mut ids = Vec::new();
    for (i, name) in ["Den", "Office", "Attic"].iter().enumerate() {
        let address = HostAddress::new(format!("10.0.0.{}", i + 10), DEFAULT_HTTP_PORT);
        let id = HostId::new();
        transport.add_host(address.clone(), server_info(name, id));
        registry.insert_discovered(server_info(name, id), address);
        ids.push(id);
    }
    let calls_before = transport.server_info_calls();

    let busy = registry.lock_host(ids[0]).await.unwrap();
    let results = registry.poll_all().await;
    drop(busy);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(id, result)| *id != ids[0] && result.is_ok()));
    assert_eq!(transport.server_info_calls() - calls_before, 2);
}

#[tokio::test]
async fn test_list_sorted_by_name() {
    let (_, registry) = registry();
    for (i, name) in ["Zeta", "Alpha", "Mid"].iter().enumerate() {
        registry.insert_discovered(
            server_info(name, HostId::new()),
            HostAddress::new(format!("10.0.1.{}", i), DEFAULT_HTTP_PORT),
        );
    }
    let names: Vec<String> = registry.list().into_iter().map(|h| h.name).collect();
    assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
}
