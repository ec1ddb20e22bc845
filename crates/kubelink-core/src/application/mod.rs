//! Application Services - Orchestration layer with event emission
//!
//! Application services sit between the HTTP handlers and the domain layer
//! (repositories, kubeconfig handling, state machines). They:
//!
//! 1. **Validate** inputs before anything is persisted
//! 2. **Orchestrate** a pass across extractor, storage and tracker
//! 3. **Audit** outcomes as `SystemEvent`s (persisted, then broadcast)
//! 4. **Notify** in-process observers through the event bus
//!
//! # Architecture
//!
//! ```text
//! HTTP handlers / startup
//!         │
//!         ▼
//! ┌────────────────────────────────────────┐
//! │      Application Services              │
//! │  ┌──────────────────────────────────┐  │
//! │  │ ConnectionAppService             │  │
//! │  │ ComponentRegistrationService     │  │
//! │  │ DiscoveryService                 │  │
//! │  └──────────────┬───────────────────┘  │
//! │        ┌────────┴─────────┐            │
//! │        ▼                  ▼            │
//! │  ┌──────────┐      ┌────────────┐      │
//! │  │Event Bus │      │ AuditTrail │      │
//! │  └──────────┘      └────────────┘      │
//! └────────────────────────────────────────┘
//!         │
//!         ▼
//! Repositories / cluster / filesystem
//! ```

mod batch;
mod connection;
mod discovery;
mod registration;

pub use batch::{BatchAggregator, BatchOutcome, Classification, SaveContextsResponse};
pub use connection::{ConnectionAppService, ConnectionError};
pub use discovery::{DiscoveryError, DiscoveryService, IN_CLUSTER_CONTEXT};
pub use registration::{ComponentRegistrationService, RegistrationReport};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::domain::SystemEvent;
use crate::event_bus::{EventBroadcaster, EventBus};
use crate::machine::{ConnectionTracker, MachineTracker};
use crate::repository::*;
use crate::service::{
    ClusterClient, ClusterComponentGenerator, ComponentGenerator, ExternalSource,
    HttpClusterClient, InClusterSource, ModelMetadataCache, ServiceAccountSource, UriSource,
};

/// Who a request acts for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub user_id: Uuid,
    /// Provider token forwarded to the connection store
    pub token: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: Some(token.into()),
        }
    }

    pub fn anonymous(user_id: Uuid) -> Self {
        Self {
            user_id,
            token: None,
        }
    }

    pub fn require_token(&self) -> Result<&str, ConnectionError> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConnectionError::MissingToken)
    }
}

/// Persist-then-broadcast path for audit events.
///
/// Neither step can fail the caller: persistence errors are logged and the
/// broadcast is a non-blocking channel send.
#[derive(Clone)]
pub struct AuditTrail {
    events: Arc<dyn EventRepository>,
    broadcaster: EventBroadcaster,
}

impl AuditTrail {
    pub fn new(events: Arc<dyn EventRepository>, broadcaster: EventBroadcaster) -> Self {
        Self {
            events,
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub async fn record(&self, event: SystemEvent) {
        if let Err(e) = self.events.persist_event(&event).await {
            warn!(
                event_id = %event.id,
                category = %event.category,
                action = %event.action,
                error = %e,
                "[Audit] Failed to persist event"
            );
        }
        self.broadcaster.publish(event.user_id, event);
    }
}

/// Builder for creating all application services with shared dependencies
pub struct ApplicationServicesBuilder {
    event_bus: Option<Arc<EventBus>>,
    broadcaster: Option<EventBroadcaster>,
    connection_repo: Option<Arc<dyn ConnectionRepository>>,
    event_repo: Option<Arc<dyn EventRepository>>,
    component_registry: Option<Arc<dyn ComponentRegistry>>,
    artifact_store: Option<Arc<dyn ArtifactStore>>,
    tracker: Option<Arc<dyn ConnectionTracker>>,
    cluster_client: Option<Arc<dyn ClusterClient>>,
    generator: Option<Arc<dyn ComponentGenerator>>,
    model_cache: Option<Arc<ModelMetadataCache>>,
    external_source: Option<Arc<dyn ExternalSource>>,
    in_cluster_source: Option<Arc<dyn InClusterSource>>,
    system_id: Option<Uuid>,
    kubeconfig_dir: Option<PathBuf>,
}

impl ApplicationServicesBuilder {
    pub fn new() -> Self {
        Self {
            event_bus: None,
            broadcaster: None,
            connection_repo: None,
            event_repo: None,
            component_registry: None,
            artifact_store: None,
            tracker: None,
            cluster_client: None,
            generator: None,
            model_cache: None,
            external_source: None,
            in_cluster_source: None,
            system_id: None,
            kubeconfig_dir: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn with_connection_repo(mut self, repo: Arc<dyn ConnectionRepository>) -> Self {
        self.connection_repo = Some(repo);
        self
    }

    pub fn with_event_repo(mut self, repo: Arc<dyn EventRepository>) -> Self {
        self.event_repo = Some(repo);
        self
    }

    pub fn with_component_registry(mut self, registry: Arc<dyn ComponentRegistry>) -> Self {
        self.component_registry = Some(registry);
        self
    }

    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifact_store = Some(store);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ConnectionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_cluster_client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.cluster_client = Some(client);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ComponentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_model_cache(mut self, cache: Arc<ModelMetadataCache>) -> Self {
        self.model_cache = Some(cache);
        self
    }

    pub fn with_external_source(mut self, source: Arc<dyn ExternalSource>) -> Self {
        self.external_source = Some(source);
        self
    }

    pub fn with_in_cluster_source(mut self, source: Arc<dyn InClusterSource>) -> Self {
        self.in_cluster_source = Some(source);
        self
    }

    pub fn with_system_id(mut self, system_id: Uuid) -> Self {
        self.system_id = Some(system_id);
        self
    }

    pub fn with_kubeconfig_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kubeconfig_dir = Some(dir.into());
        self
    }

    /// Build all application services
    ///
    /// Repositories, the system id and the kubeconfig directory are required;
    /// every other collaborator has a production default.
    pub fn build(self) -> anyhow::Result<ApplicationServices> {
        let event_bus = self.event_bus.ok_or_else(|| anyhow::anyhow!("Event bus required"))?;
        let connection_repo = self
            .connection_repo
            .ok_or_else(|| anyhow::anyhow!("Connection repository required"))?;
        let event_repo = self
            .event_repo
            .ok_or_else(|| anyhow::anyhow!("Event repository required"))?;
        let registry = self
            .component_registry
            .ok_or_else(|| anyhow::anyhow!("Component registry required"))?;
        let artifact_store = self
            .artifact_store
            .ok_or_else(|| anyhow::anyhow!("Artifact store required"))?;
        let system_id = self.system_id.ok_or_else(|| anyhow::anyhow!("System id required"))?;
        let kubeconfig_dir = self
            .kubeconfig_dir
            .ok_or_else(|| anyhow::anyhow!("Kubeconfig directory required"))?;

        let broadcaster = self.broadcaster.unwrap_or_else(EventBroadcaster::detached);
        let audit = AuditTrail::new(event_repo, broadcaster);
        let sender = event_bus.sender();

        let tracker = self
            .tracker
            .unwrap_or_else(|| Arc::new(MachineTracker::default()));
        let cluster_client = self
            .cluster_client
            .unwrap_or_else(|| Arc::new(HttpClusterClient::default()));
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(ClusterComponentGenerator::new(cluster_client.clone())));
        let model_cache = self.model_cache.unwrap_or_default();
        let external_source = match self.external_source {
            Some(source) => source,
            None => Arc::new(UriSource::new()?),
        };
        let in_cluster_source = self
            .in_cluster_source
            .unwrap_or_else(|| Arc::new(ServiceAccountSource::from_env()));

        Ok(ApplicationServices {
            event_bus,
            connection: ConnectionAppService::new(
                connection_repo.clone(),
                registry.clone(),
                tracker,
                cluster_client,
                audit.clone(),
                sender.clone(),
                system_id,
            ),
            registration: Arc::new(ComponentRegistrationService::new(
                registry,
                artifact_store,
                generator,
                model_cache,
                audit.clone(),
                sender,
                system_id,
            )),
            discovery: DiscoveryService::new(
                connection_repo,
                external_source,
                in_cluster_source,
                audit,
                system_id,
                kubeconfig_dir,
            ),
        })
    }
}

impl Default for ApplicationServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Container for all application services
pub struct ApplicationServices {
    /// Shared event bus
    pub event_bus: Arc<EventBus>,
    /// Bundle submission, listing, ping and deletion
    pub connection: ConnectionAppService,
    /// Component registration (runs in the background)
    pub registration: Arc<ComponentRegistrationService>,
    /// Kubeconfig discovery with in-cluster fallback
    pub discovery: DiscoveryService,
}

impl ApplicationServices {
    /// Subscribe to events from all services
    pub fn subscribe(&self) -> crate::event_bus::EventReceiver {
        self.event_bus.subscribe()
    }
}
