//! Tests for DiscoveryService
//!
//! Validates discovery from the kubeconfig directory and the in-cluster
//! fallback.

use std::path::PathBuf;
use std::sync::Arc;

use kubelink_core::{DeploymentType, DiscoveryError, IN_CLUSTER_CONTEXT};
use pretty_assertions::assert_eq;
use tests::fixtures::{context, kubeconfig, random_user, NO_CONTEXTS};
use tests::mocks::{
    InClusterAnswer, MockConnectionRepository, MockExternalSource, MockInClusterSource,
};
use tests::services::HarnessOptions;
use tests::{MockRepositories, ServicesHarness};

fn harness(
    source: MockExternalSource,
    in_cluster: MockInClusterSource,
    connections: MockConnectionRepository,
) -> (ServicesHarness, Arc<MockExternalSource>) {
    let source = Arc::new(source);
    let h = ServicesHarness::with_options(HarnessOptions {
        repos: MockRepositories::new().with_connections(connections),
        external_source: source.clone(),
        in_cluster_source: Arc::new(in_cluster),
        kubeconfig_dir: PathBuf::from("/home/kubelink/.kube"),
        ..HarnessOptions::default()
    });
    (h, source)
}

#[tokio::test]
async fn test_discovers_every_context_in_the_kubeconfig_file() {
    let (h, source) = harness(
        MockExternalSource::with_content(kubeconfig(&["alpha", "beta"])),
        MockInClusterSource::not_in_cluster(),
        MockConnectionRepository::new(),
    );
    let user = random_user();

    let contexts = h.services.discovery.discover(user, "local").await.unwrap();

    assert_eq!(
        source.requested(),
        vec!["file:///home/kubelink/.kube/config".to_string()]
    );
    assert_eq!(contexts.len(), 2);
    assert!(contexts
        .iter()
        .all(|c| c.deployment_type == DeploymentType::OutOfCluster && c.connection_id.is_some()));
    assert!(contexts.iter().all(|c| c.system_id == h.system_id));
    assert_eq!(h.repos.connections.len(), 2);

    let created = h.repos.events.matching("connection", "create");
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0].description,
        "Kubernetes config imported from file:///home/kubelink/.kube/config."
    );
    assert_eq!(created[0].user_id, user);
    assert_eq!(created[0].metadata.len(), 2);
}

#[tokio::test]
async fn test_kubeconfig_without_contexts_is_still_audited() {
    let (h, _) = harness(
        MockExternalSource::with_content(NO_CONTEXTS),
        MockInClusterSource::not_in_cluster(),
        MockConnectionRepository::new(),
    );

    let contexts = h
        .services
        .discovery
        .discover(random_user(), "local")
        .await
        .unwrap();

    assert!(contexts.is_empty());
    assert!(h.repos.connections.is_empty());
    let created = h.repos.events.matching("connection", "create");
    assert_eq!(created.len(), 1);
    assert!(created[0].metadata.is_empty());
}

#[tokio::test]
async fn test_persistence_failures_are_skipped() {
    let (h, _) = harness(
        MockExternalSource::with_content(kubeconfig(&["alpha", "beta"])),
        MockInClusterSource::not_in_cluster(),
        MockConnectionRepository::new().fail_on("alpha"),
    );

    let contexts = h
        .services
        .discovery
        .discover(random_user(), "local")
        .await
        .unwrap();

    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].name, "beta");

    let created = h.repos.events.matching("connection", "create");
    assert!(created[0].metadata["alpha"]["error"]
        .as_str()
        .unwrap()
        .contains("storage rejected"));
    assert!(created[0].metadata["alpha"]["description"]
        .as_str()
        .unwrap()
        .starts_with("Unable to establish connection"));
}

#[tokio::test]
async fn test_falls_back_to_the_in_cluster_identity() {
    let mut sa = context("service-account");
    sa.server = "https://10.96.0.1:443".to_string();
    let (h, _) = harness(
        MockExternalSource::missing(),
        MockInClusterSource::new(InClusterAnswer::Context(Box::new(sa))),
        MockConnectionRepository::new(),
    );

    let contexts = h
        .services
        .discovery
        .discover(random_user(), "local")
        .await
        .unwrap();

    assert_eq!(contexts.len(), 1);
    let ctx = &contexts[0];
    assert_eq!(ctx.name, IN_CLUSTER_CONTEXT);
    assert_eq!(ctx.deployment_type, DeploymentType::InCluster);
    assert_eq!(ctx.system_id, h.system_id);

    let created = h.repos.events.matching("connection", "create");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].acted_upon, ctx.connection_id);
    assert!(created[0].metadata.contains_key(IN_CLUSTER_CONTEXT));
}

#[tokio::test]
async fn test_no_file_and_not_in_cluster() {
    let (h, _) = harness(
        MockExternalSource::missing(),
        MockInClusterSource::not_in_cluster(),
        MockConnectionRepository::new(),
    );

    let result = h.services.discovery.discover(random_user(), "local").await;
    assert!(matches!(result, Err(DiscoveryError::NoInClusterIdentity)));
    assert!(h.repos.connections.is_empty());
    assert!(h.repos.events.events().is_empty());
}

#[tokio::test]
async fn test_in_cluster_source_failure() {
    let (h, _) = harness(
        MockExternalSource::missing(),
        MockInClusterSource::new(InClusterAnswer::Fails("token unreadable".to_string())),
        MockConnectionRepository::new(),
    );

    let result = h.services.discovery.discover(random_user(), "local").await;
    match result {
        Err(DiscoveryError::InClusterUnavailable(reason)) => {
            assert!(reason.contains("token unreadable"))
        }
        other => panic!("expected InClusterUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_in_cluster_context_that_cannot_be_saved() {
    let (h, _) = harness(
        MockExternalSource::missing(),
        MockInClusterSource::new(InClusterAnswer::Context(Box::new(context("sa")))),
        MockConnectionRepository::new().fail_on(IN_CLUSTER_CONTEXT),
    );

    let result = h.services.discovery.discover(random_user(), "local").await;
    assert!(matches!(
        result,
        Err(DiscoveryError::Persist { ref context, .. }) if context == IN_CLUSTER_CONTEXT
    ));
}
