//! Test service builders and helpers
//!
//! Provides factory functions to create service instances for testing.

use std::path::PathBuf;
use std::sync::Arc;

use kubelink_core::{
    ApplicationServices, ApplicationServicesBuilder, BroadcastReceiver, ClusterClient,
    ComponentGenerator, ConnectionTracker, EventBroadcaster, EventBus, EventReceiver,
    ExternalSource, InClusterSource, ModelMetadataCache,
};
use uuid::Uuid;

use crate::mocks::{
    MockClusterClient, MockComponentGenerator, MockExternalSource, MockInClusterSource,
    MockRepositories,
};

/// Test harness for the application services
///
/// Wires every service over mock repositories and collaborators, and keeps
/// both event receivers so tests can assert on what was emitted.
pub struct ServicesHarness {
    /// The services under test
    pub services: ApplicationServices,

    /// Domain events emitted on the bus
    pub event_rx: EventReceiver,

    /// Audit events published to users
    pub audit_rx: BroadcastReceiver,

    /// Mock repositories
    pub repos: MockRepositories,

    pub system_id: Uuid,
}

/// Collaborator overrides for [`ServicesHarness`]
pub struct HarnessOptions {
    pub repos: MockRepositories,
    pub generator: Arc<dyn ComponentGenerator>,
    pub cluster_client: Arc<dyn ClusterClient>,
    pub external_source: Arc<dyn ExternalSource>,
    pub in_cluster_source: Arc<dyn InClusterSource>,
    pub tracker: Option<Arc<dyn ConnectionTracker>>,
    pub model_cache: ModelMetadataCache,
    pub kubeconfig_dir: PathBuf,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            repos: MockRepositories::new(),
            generator: Arc::new(MockComponentGenerator::default()),
            cluster_client: Arc::new(MockClusterClient::reachable("v1.30.0")),
            external_source: Arc::new(MockExternalSource::missing()),
            in_cluster_source: Arc::new(MockInClusterSource::not_in_cluster()),
            tracker: None,
            model_cache: ModelMetadataCache::default(),
            kubeconfig_dir: PathBuf::from("/nonexistent/.kube"),
        }
    }
}

impl ServicesHarness {
    /// Create a harness with default mock dependencies
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_repos(repos: MockRepositories) -> Self {
        Self::with_options(HarnessOptions {
            repos,
            ..HarnessOptions::default()
        })
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let event_rx = event_bus.subscribe();
        let (broadcaster, audit_rx) = EventBroadcaster::channel();
        let system_id = Uuid::new_v4();
        let repos = options.repos;

        let mut builder = ApplicationServicesBuilder::new()
            .with_event_bus(event_bus)
            .with_broadcaster(broadcaster)
            .with_connection_repo(repos.connections.clone())
            .with_event_repo(repos.events.clone())
            .with_component_registry(repos.registry.clone())
            .with_artifact_store(repos.artifacts.clone())
            .with_generator(options.generator)
            .with_cluster_client(options.cluster_client)
            .with_external_source(options.external_source)
            .with_in_cluster_source(options.in_cluster_source)
            .with_model_cache(Arc::new(options.model_cache))
            .with_system_id(system_id)
            .with_kubeconfig_dir(options.kubeconfig_dir);
        if let Some(tracker) = options.tracker {
            builder = builder.with_tracker(tracker);
        }

        let services = builder.build().expect("Failed to build services");
        Self {
            services,
            event_rx,
            audit_rx,
            repos,
            system_id,
        }
    }
}

impl Default for ServicesHarness {
    fn default() -> Self {
        Self::new()
    }
}
