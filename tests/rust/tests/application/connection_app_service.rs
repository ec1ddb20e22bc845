//! Tests for ConnectionAppService
//!
//! Validates bundle submission, classification, tracker idempotence,
//! ping, deletion and event emission.

use std::sync::Arc;

use kubelink_core::{
    ConnectionError, ConnectionRepository, ConnectionStatus, ConnectionTracker, DomainEvent,
    Host, Identity, MachineEvent, MachineTracker, Severity, TransitionEngine, TransitionError,
    KUBERNETES_HOST,
};
use kubelink_core::domain::ComponentDefinition;
use kubelink_core::repository::ComponentRegistry;
use pretty_assertions::assert_eq;
use tests::events::{contexts_changed, drain_audit, drain_domain};
use tests::fixtures::{context, kubeconfig, random_user, NO_CONTEXTS};
use tests::mocks::{MockClusterClient, MockConnectionRepository};
use tests::services::HarnessOptions;
use tests::{MockRepositories, ServicesHarness};
use uuid::Uuid;

fn identity() -> Identity {
    Identity::new(random_user(), "provider-token")
}

fn names(contexts: &[kubelink_core::KubeContext]) -> Vec<&str> {
    let mut names: Vec<_> = contexts.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_submit_registers_new_contexts_and_isolates_failures() {
    let repos = MockRepositories::new()
        .with_connections(MockConnectionRepository::new().fail_on("beta"));
    let mut h = ServicesHarness::with_repos(repos);
    let caller = identity();

    let bundle = kubeconfig(&["alpha", "beta", "gamma"]);
    let response = h
        .services
        .connection
        .submit_bundle(&caller, bundle.as_bytes())
        .await
        .unwrap();

    assert_eq!(names(&response.registered_contexts), vec!["alpha", "gamma"]);
    assert_eq!(names(&response.errored_contexts), vec!["beta"]);
    assert!(response.connected_contexts.is_empty());
    assert!(response.ignored_contexts.is_empty());
    assert!(response
        .registered_contexts
        .iter()
        .all(|c| c.connection_id.is_some()));
    assert_eq!(response.errored_contexts[0].connection_id, None);

    // One audit event for the whole pass, one metadata entry per context
    let created = h.repos.events.matching("connection", "create");
    assert_eq!(created.len(), 1);
    let event = &created[0];
    assert_eq!(event.user_id, caller.user_id);
    assert_eq!(event.system_id, h.system_id);
    assert_eq!(event.severity, Severity::Informational);
    assert_eq!(event.description, "Kubernetes config uploaded.");
    assert_eq!(event.metadata.len(), 3);
    assert!(event.metadata["beta"]["error"]
        .as_str()
        .unwrap()
        .contains("storage rejected"));
    assert!(event.metadata["alpha"]["description"]
        .as_str()
        .unwrap()
        .starts_with("Connection registered with kubernetes context \"alpha\""));
    assert!(!serde_json::to_string(&event.metadata)
        .unwrap()
        .contains("alpha-token"));

    // Persisted first, then delivered to the caller
    let delivered = drain_audit(&mut h.audit_rx);
    assert!(delivered
        .iter()
        .any(|(user, e)| *user == caller.user_id && e.id == event.id));

    let events = drain_domain(&mut h.event_rx);
    assert_eq!(contexts_changed(&events), vec![2]);
    let status_changes = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                DomainEvent::ConnectionStatusChanged {
                    status: ConnectionStatus::Discovered,
                    ..
                }
            )
        })
        .count();
    assert_eq!(status_changes, 2);
    assert_eq!(h.services.connection.tracker().len().await, 2);
}

#[tokio::test]
async fn test_submit_classifies_by_stored_status() {
    let connections = MockConnectionRepository::new()
        .with_status(&context("prod"), ConnectionStatus::Connected)
        .with_status(&context("legacy"), ConnectionStatus::Ignored)
        .with_status(&context("broken"), ConnectionStatus::Errored);
    let mut h = ServicesHarness::with_repos(MockRepositories::new().with_connections(connections));

    let bundle = kubeconfig(&["prod", "legacy", "broken", "fresh"]);
    let response = h
        .services
        .connection
        .submit_bundle(&identity(), bundle.as_bytes())
        .await
        .unwrap();

    assert_eq!(names(&response.registered_contexts), vec!["fresh"]);
    assert_eq!(names(&response.connected_contexts), vec!["prod"]);
    assert_eq!(names(&response.ignored_contexts), vec!["legacy"]);
    assert_eq!(names(&response.errored_contexts), vec!["broken"]);
    assert_eq!(response.len(), 4);

    let tracker = h.services.connection.tracker();
    let broken = h.repos.connections.record_for("broken").unwrap();
    assert_eq!(tracker.status(&broken.id).await, Some(ConnectionStatus::Errored));
    let prod = h.repos.connections.record_for("prod").unwrap();
    assert_eq!(tracker.status(&prod.id).await, Some(ConnectionStatus::Connected));

    let events = drain_domain(&mut h.event_rx);
    assert_eq!(contexts_changed(&events), vec![1]);
}

#[tokio::test]
async fn test_submit_without_new_contexts_does_not_notify() {
    let connections =
        MockConnectionRepository::new().with_status(&context("prod"), ConnectionStatus::Connected);
    let mut h = ServicesHarness::with_repos(MockRepositories::new().with_connections(connections));

    let response = h
        .services
        .connection
        .submit_bundle(&identity(), kubeconfig(&["prod"]).as_bytes())
        .await
        .unwrap();

    assert_eq!(names(&response.connected_contexts), vec!["prod"]);
    let events = drain_domain(&mut h.event_rx);
    assert!(contexts_changed(&events).is_empty());
    // The pass is still audited
    assert_eq!(h.repos.events.matching("connection", "create").len(), 1);
}

#[tokio::test]
async fn test_resubmitting_reuses_tracked_machines() {
    let mut h = ServicesHarness::new();
    let caller = identity();
    let bundle = kubeconfig(&["alpha", "beta"]);

    let first = h
        .services
        .connection
        .submit_bundle(&caller, bundle.as_bytes())
        .await
        .unwrap();
    drain_domain(&mut h.event_rx);

    let second = h
        .services
        .connection
        .submit_bundle(&caller, bundle.as_bytes())
        .await
        .unwrap();

    let ids = |r: &kubelink_core::SaveContextsResponse| {
        let mut ids: Vec<_> = r
            .registered_contexts
            .iter()
            .filter_map(|c| c.connection_id)
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(h.repos.connections.len(), 2);
    assert_eq!(h.services.connection.tracker().len().await, 2);

    let events = drain_domain(&mut h.event_rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, DomainEvent::ConnectionStatusChanged { .. })));
}

#[tokio::test]
async fn test_duplicate_context_names_are_each_classified() {
    let mut h = ServicesHarness::new();
    // Two contexts share a name but point at different clusters
    let bundle = r#"apiVersion: v1
kind: Config
current-context: shared
clusters:
- name: east
  cluster:
    server: https://east.example.com:6443
- name: west
  cluster:
    server: https://west.example.com:6443
users:
- name: ops
  user:
    token: ops-token
contexts:
- name: shared
  context:
    cluster: east
    user: ops
- name: shared
  context:
    cluster: west
    user: ops
"#;

    let response = h
        .services
        .connection
        .submit_bundle(&identity(), bundle.as_bytes())
        .await
        .unwrap();

    assert_eq!(response.registered_contexts.len(), 2);
    assert!(response.errored_contexts.is_empty());
    let ids: Vec<_> = response
        .registered_contexts
        .iter()
        .map(|c| c.connection_id.unwrap())
        .collect();
    assert_ne!(ids[0], ids[1]);
    assert_eq!(h.repos.connections.len(), 2);
    assert_eq!(h.services.connection.tracker().len().await, 2);

    // Notified once, after every context of the pass was classified
    let events = drain_domain(&mut h.event_rx);
    assert_eq!(contexts_changed(&events), vec![2]);

    // Metadata is keyed by context name, so the entries collapse
    let created = h.repos.events.matching("connection", "create");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].metadata.len(), 1);
    assert!(created[0].metadata.contains_key("shared"));
}

#[tokio::test]
async fn test_concurrent_submissions_track_one_machine_per_connection() {
    let mut h = ServicesHarness::new();
    let bundle = kubeconfig(&["alpha", "beta"]);
    let (first_caller, second_caller) = (identity(), identity());

    let (first, second) = tokio::join!(
        h.services
            .connection
            .submit_bundle(&first_caller, bundle.as_bytes()),
        h.services
            .connection
            .submit_bundle(&second_caller, bundle.as_bytes()),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let ids = |response: &kubelink_core::SaveContextsResponse| {
        let mut ids: Vec<_> = response
            .registered_contexts
            .iter()
            .map(|c| c.connection_id.unwrap())
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&first).len(), 2);
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(h.repos.connections.len(), 2);
    assert_eq!(h.services.connection.tracker().len().await, 2);

    // Passes hold the tracker lock in turn: only the first creates machines
    let events = drain_domain(&mut h.event_rx);
    let sequence: Vec<_> = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                DomainEvent::ConnectionStatusChanged { .. } | DomainEvent::ContextsChanged { .. }
            )
        })
        .map(|e| e.type_name())
        .collect();
    assert_eq!(
        sequence,
        vec![
            "connection_status_changed",
            "connection_status_changed",
            "contexts_changed",
            "contexts_changed",
        ]
    );
    assert_eq!(h.repos.events.matching("connection", "create").len(), 2);
}

#[tokio::test]
async fn test_submit_requires_a_token() {
    let h = ServicesHarness::new();
    let result = h
        .services
        .connection
        .submit_bundle(
            &Identity::anonymous(random_user()),
            kubeconfig(&["alpha"]).as_bytes(),
        )
        .await;

    assert!(matches!(result, Err(ConnectionError::MissingToken)));
    assert_eq!(h.repos.connections.saves(), 0);
    assert!(h.repos.events.events().is_empty());
}

#[tokio::test]
async fn test_empty_and_malformed_bundles() {
    let mut h = ServicesHarness::new();

    let empty = h.services.connection.submit_bundle(&identity(), b" \n").await;
    assert!(matches!(empty, Err(ConnectionError::EmptyBundle)));

    let malformed = h
        .services
        .connection
        .submit_bundle(&identity(), b"kind: Pod\napiVersion: v1\n")
        .await;
    assert!(matches!(malformed, Err(ConnectionError::Malformed(_))));

    let no_contexts = h
        .services
        .connection
        .submit_bundle(&identity(), NO_CONTEXTS.as_bytes())
        .await
        .unwrap();
    assert!(no_contexts.is_empty());

    assert!(h.repos.events.events().is_empty());
    assert!(drain_domain(&mut h.event_rx).is_empty());
}

struct RejectAll;

impl TransitionEngine for RejectAll {
    fn transition(
        &self,
        connection_id: Uuid,
        from: ConnectionStatus,
        event: MachineEvent,
    ) -> Result<ConnectionStatus, TransitionError> {
        Err(TransitionError::Rejected {
            connection_id,
            from,
            event,
        })
    }
}

#[tokio::test]
async fn test_transition_failure_is_audited_as_critical() {
    let tracker: Arc<dyn ConnectionTracker> = Arc::new(MachineTracker::new(Arc::new(RejectAll)));
    let mut h = ServicesHarness::with_options(HarnessOptions {
        tracker: Some(tracker),
        ..HarnessOptions::default()
    });

    let response = h
        .services
        .connection
        .submit_bundle(&identity(), kubeconfig(&["alpha"]).as_bytes())
        .await
        .unwrap();

    // Persisted, so still classified by its stored status
    assert_eq!(names(&response.registered_contexts), vec!["alpha"]);

    let management = h.repos.events.matching("system", "management");
    assert_eq!(management.len(), 1);
    assert_eq!(management[0].severity, Severity::Critical);
    assert_eq!(management[0].description, "Unable to transition to discovered");
    assert_eq!(
        management[0].acted_upon,
        response.registered_contexts[0].connection_id
    );

    assert_eq!(h.services.connection.tracker().len().await, 0);
    let events = drain_domain(&mut h.event_rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, DomainEvent::ConnectionStatusChanged { .. })));
}

#[tokio::test]
async fn test_list_contexts_does_not_persist() {
    let h = ServicesHarness::new();
    let contexts = h
        .services
        .connection
        .list_contexts(&identity(), kubeconfig(&["alpha", "beta"]).as_bytes())
        .await
        .unwrap();

    assert_eq!(names(&contexts), vec!["alpha", "beta"]);
    assert!(contexts.iter().all(|c| c.connection_id.is_none()));
    assert_eq!(h.repos.connections.saves(), 0);

    let discovered = h.repos.events.matching("connection", "discovered");
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].metadata.len(), 2);
}

#[tokio::test]
async fn test_ping_reports_the_server_version() {
    let h = ServicesHarness::with_options(HarnessOptions {
        cluster_client: Arc::new(MockClusterClient::reachable("v1.31.2")),
        ..HarnessOptions::default()
    });
    let response = h
        .services
        .connection
        .submit_bundle(&identity(), kubeconfig(&["alpha"]).as_bytes())
        .await
        .unwrap();
    let id = response.registered_contexts[0].connection_id.unwrap();

    let version = h.services.connection.ping("provider-token", id).await.unwrap();
    assert_eq!(version.git_version, "v1.31.2");

    let missing = Uuid::new_v4();
    let result = h.services.connection.ping("provider-token", missing).await;
    assert!(matches!(result, Err(ConnectionError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn test_ping_unreachable_cluster() {
    let h = ServicesHarness::with_options(HarnessOptions {
        cluster_client: Arc::new(MockClusterClient::unreachable()),
        ..HarnessOptions::default()
    });
    let response = h
        .services
        .connection
        .submit_bundle(&identity(), kubeconfig(&["alpha"]).as_bytes())
        .await
        .unwrap();
    let id = response.registered_contexts[0].connection_id.unwrap();

    let result = h.services.connection.ping("provider-token", id).await;
    match result {
        Err(ConnectionError::Cluster(reason)) => assert!(reason.contains("connection refused")),
        other => panic!("expected a cluster error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_cleans_up_components_and_tracking() {
    let mut h = ServicesHarness::new();
    let response = h
        .services
        .connection
        .submit_bundle(&identity(), kubeconfig(&["alpha", "beta"]).as_bytes())
        .await
        .unwrap();
    let alpha = response
        .registered_contexts
        .iter()
        .find(|c| c.name == "alpha")
        .unwrap()
        .clone();
    let beta = response
        .registered_contexts
        .iter()
        .find(|c| c.name == "beta")
        .unwrap()
        .clone();

    let alpha_host = Host::new(KUBERNETES_HOST, &alpha.id);
    let beta_host = Host::new(KUBERNETES_HOST, &beta.id);
    let widget = ComponentDefinition::new("Widget", "example.com/v1");
    h.repos.registry.register(&alpha_host, &widget).await.unwrap();
    h.repos.registry.register(&beta_host, &widget).await.unwrap();
    drain_domain(&mut h.event_rx);

    let alpha_id = alpha.connection_id.unwrap();
    h.services
        .connection
        .delete_connection(alpha_id)
        .await
        .await
        .unwrap();

    assert!(h.repos.registry.under(&alpha_host).is_empty());
    assert_eq!(h.repos.registry.under(&beta_host).len(), 1);
    assert!(h.repos.connections.record_for("alpha").is_none());
    assert!(h
        .repos
        .connections
        .get_context("provider-token", &alpha_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(h.services.connection.tracker().status(&alpha_id).await, None);

    let events = drain_domain(&mut h.event_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        DomainEvent::WorkloadCleanupScheduled { connection_id } if *connection_id == alpha_id
    )));
}

#[tokio::test]
async fn test_delete_unknown_connection_is_harmless() {
    let h = ServicesHarness::new();
    h.services
        .connection
        .delete_connection(Uuid::new_v4())
        .await
        .await
        .unwrap();
    assert!(h.repos.connections.is_empty());
}
