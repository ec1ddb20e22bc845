//! Server lifecycle over a real listener

use std::sync::Arc;

use kubelink_core::{DomainEvent, EventRepository};
use pretty_assertions::assert_eq;
use tests::async_helpers::{with_timeout, DEFAULT_TIMEOUT};
use tests::events::wait_for_event;
use tests::fixtures::kubeconfig;
use tests::mocks::MockExternalSource;
use tokio_util::sync::CancellationToken;

use super::{TestServer, TestServerOptions};

#[tokio::test]
async fn test_serves_until_cancelled() {
    let TestServer {
        server,
        _db,
        _data_dir,
        ..
    } = TestServer::new();
    let mut events = server.event_bus().subscribe();

    let shutdown = CancellationToken::new();
    let handle = server.spawn(shutdown.clone());

    let started = wait_for_event(&mut events, DEFAULT_TIMEOUT, |e| {
        matches!(e, DomainEvent::ServerStarted { .. })
    })
    .await
    .expect("server did not start");
    let DomainEvent::ServerStarted { url, port } = started else {
        unreachable!()
    };
    assert_ne!(port, 0);

    let health: serde_json::Value = reqwest::get(format!("{}/health", url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    shutdown.cancel();
    with_timeout(DEFAULT_TIMEOUT, handle).await.unwrap().unwrap();

    let stopped = wait_for_event(&mut events, DEFAULT_TIMEOUT, |e| {
        matches!(e, DomainEvent::ServerStopped)
    })
    .await;
    assert!(stopped.is_some());
}

#[tokio::test]
async fn test_discovers_and_registers_on_startup() {
    let TestServer {
        server,
        _db,
        _data_dir,
        ..
    } = TestServer::with_options(TestServerOptions {
        external_source: Arc::new(MockExternalSource::with_content(kubeconfig(&["alpha"]))),
        discover_on_startup: true,
        ..TestServerOptions::default()
    });
    let mut events = server.event_bus().subscribe();
    let services = server.services().clone();

    let shutdown = CancellationToken::new();
    let handle = server.spawn(shutdown.clone());

    let registered = wait_for_event(&mut events, DEFAULT_TIMEOUT, |e| {
        matches!(e, DomainEvent::ComponentsRegistered { .. })
    })
    .await
    .expect("startup registration did not run");
    match registered {
        DomainEvent::ComponentsRegistered {
            context_name,
            connection_id,
            ..
        } => {
            assert_eq!(context_name, "alpha");
            assert!(connection_id.is_some());
        }
        other => panic!("unexpected event {:?}", other),
    }

    let recent = services.event_repo.list_recent(10).await.unwrap();
    assert!(recent
        .iter()
        .any(|e| e.category == "connection" && e.action == "create"));

    shutdown.cancel();
    with_timeout(DEFAULT_TIMEOUT, handle).await.unwrap().unwrap();
}
