//! Connection Application Service
//!
//! Turns uploaded kubeconfigs into tracked connections with automatic
//! event emission.

use std::sync::Arc;

use serde_json::{json, Map};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::batch::{BatchAggregator, Classification, SaveContextsResponse};
use super::{AuditTrail, Identity};
use crate::domain::{DomainEvent, EventBuilder, Host, KubeContext, ServerVersion, Severity};
use crate::event_bus::EventSender;
use crate::kubeconfig::{self, ExtractRequest, KubeconfigError};
use crate::machine::{ConnectionTracker, InitOutcome};
use crate::repository::{ComponentRegistry, ConnectionRepository};
use crate::service::ClusterClient;
use crate::KUBERNETES_HOST;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to retrieve user token")]
    MissingToken,

    #[error("kubeconfig bundle is empty")]
    EmptyBundle,

    #[error("invalid kubeconfig: {0}")]
    Malformed(#[from] KubeconfigError),

    #[error("connection {0} not found")]
    NotFound(Uuid),

    #[error("failed to reach cluster: {0}")]
    Cluster(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Application service for connection management
pub struct ConnectionAppService {
    connections: Arc<dyn ConnectionRepository>,
    registry: Arc<dyn ComponentRegistry>,
    tracker: Arc<dyn ConnectionTracker>,
    cluster_client: Arc<dyn ClusterClient>,
    audit: AuditTrail,
    event_sender: EventSender,
    system_id: Uuid,
}

impl ConnectionAppService {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        registry: Arc<dyn ComponentRegistry>,
        tracker: Arc<dyn ConnectionTracker>,
        cluster_client: Arc<dyn ClusterClient>,
        audit: AuditTrail,
        event_sender: EventSender,
        system_id: Uuid,
    ) -> Self {
        Self {
            connections,
            registry,
            tracker,
            cluster_client,
            audit,
            event_sender,
            system_id,
        }
    }

    pub fn tracker(&self) -> &Arc<dyn ConnectionTracker> {
        &self.tracker
    }

    /// Persist every context of an uploaded kubeconfig and classify it.
    ///
    /// The tracker is locked once for the whole pass. Exactly one
    /// `connection/create` audit event is recorded per non-empty pass.
    ///
    /// Emits: `ConnectionStatusChanged` per new machine, then at most one
    /// `ContextsChanged`
    pub async fn submit_bundle(
        &self,
        identity: &Identity,
        raw: &[u8],
    ) -> Result<SaveContextsResponse, ConnectionError> {
        let token = identity.require_token()?;
        let (contexts, discovery) = self.extract(identity, raw)?;

        if contexts.is_empty() {
            info!(user_id = %identity.user_id, "[ConnectionAppService] Bundle has no contexts");
            return Ok(SaveContextsResponse::default());
        }

        let base = EventBuilder::new()
            .from_user(identity.user_id)
            .from_system(self.system_id)
            .with_category("connection")
            .with_action("create")
            .with_description("Kubernetes config uploaded.")
            .with_severity(Severity::Informational);

        let mut batch = BatchAggregator::new(discovery);
        let mut acted_upon = None;

        let mut pass = self.tracker.begin_pass().await;
        for mut context in contexts {
            let record = match self.connections.save_context(token, &context).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        context = %context.name,
                        error = %e,
                        "[ConnectionAppService] Failed to persist context"
                    );
                    let description = format!(
                        "Unable to establish connection with context \"{}\" at {}",
                        context.name, context.server
                    );
                    batch.record(
                        context,
                        Classification::Errored,
                        description,
                        Some(e.to_string()),
                    );
                    continue;
                }
            };

            context.connection_id = Some(record.id);
            context.status = record.status;
            acted_upon = Some(record.id);

            let classification = Classification::from_status(record.status);
            let description = classification.describe(&context);

            match pass.initialize(&context, record.id) {
                Ok(InitOutcome::Created(status)) => {
                    self.event_sender.emit(DomainEvent::ConnectionStatusChanged {
                        connection_id: record.id,
                        status,
                    });
                }
                Ok(InitOutcome::Reused(status)) => {
                    debug!(
                        connection_id = %record.id,
                        status = %status,
                        "[ConnectionAppService] State machine already tracked"
                    );
                }
                Err(e) => {
                    warn!(
                        connection_id = %record.id,
                        error = %e,
                        "[ConnectionAppService] State machine transition failed"
                    );
                    let mut metadata = Map::new();
                    metadata.insert("error".to_string(), json!(e.to_string()));
                    let event = base
                        .clone()
                        .acted_upon(record.id)
                        .with_category("system")
                        .with_action("management")
                        .with_severity(Severity::Critical)
                        .with_description(format!("Unable to transition to {}", record.status))
                        .with_metadata(metadata)
                        .build();
                    self.audit.record(event).await;
                }
            }

            batch.record(context, classification, description, None);
        }
        drop(pass);

        let outcome = batch.finish();
        if outcome.should_notify() {
            self.event_sender.emit(DomainEvent::ContextsChanged {
                registered: outcome.registered_count,
            });
        }

        let mut summary = base.with_metadata(outcome.metadata);
        if let Some(id) = acted_upon {
            summary = summary.acted_upon(id);
        }
        self.audit.record(summary.build()).await;

        info!(
            user_id = %identity.user_id,
            registered = outcome.response.registered_contexts.len(),
            connected = outcome.response.connected_contexts.len(),
            ignored = outcome.response.ignored_contexts.len(),
            errored = outcome.response.errored_contexts.len(),
            "[ConnectionAppService] Processed kubeconfig"
        );
        Ok(outcome.response)
    }

    /// Extract contexts without persisting connections
    pub async fn list_contexts(
        &self,
        identity: &Identity,
        raw: &[u8],
    ) -> Result<Vec<KubeContext>, ConnectionError> {
        let (contexts, discovery) = self.extract(identity, raw)?;

        if !contexts.is_empty() {
            let event = EventBuilder::new()
                .from_user(identity.user_id)
                .from_system(self.system_id)
                .with_category("connection")
                .with_action("discovered")
                .with_description("Kubernetes config uploaded.")
                .with_severity(Severity::Informational)
                .with_metadata(discovery)
                .build();
            self.audit.record(event).await;
        }

        Ok(contexts)
    }

    /// Contexts of a raw bundle plus their discovery metadata
    pub fn extract(
        &self,
        identity: &Identity,
        raw: &[u8],
    ) -> Result<(Vec<KubeContext>, Map<String, serde_json::Value>), ConnectionError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ConnectionError::EmptyBundle);
        }

        let bundle = kubeconfig::normalize(raw, None);
        let request = ExtractRequest {
            user_id: identity.user_id,
            system_id: self.system_id,
        };
        let mut discovery = Map::new();
        let contexts = kubeconfig::extract_contexts(
            &bundle,
            &request,
            self.audit.broadcaster(),
            &mut discovery,
        )?;
        Ok((contexts, discovery))
    }

    /// Ask the cluster behind a connection for its version
    pub async fn ping(
        &self,
        token: &str,
        connection_id: Uuid,
    ) -> Result<ServerVersion, ConnectionError> {
        let context = self
            .connections
            .get_context(token, &connection_id)
            .await?
            .ok_or(ConnectionError::NotFound(connection_id))?;

        self.cluster_client
            .server_version(&context)
            .await
            .map_err(|e| ConnectionError::Cluster(format!("{:#}", e)))
    }

    /// Forget a connection and clean up what was derived from it.
    ///
    /// Cleanup runs in the background; the returned handle is only useful
    /// to callers that want to wait for it.
    ///
    /// Emits: `WorkloadCleanupScheduled`
    pub async fn delete_connection(&self, connection_id: Uuid) -> JoinHandle<()> {
        self.tracker.remove(&connection_id).await;
        self.event_sender
            .emit(DomainEvent::WorkloadCleanupScheduled { connection_id });

        let connections = self.connections.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Err(e) = cleanup(connections, registry, connection_id).await {
                warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "[ConnectionAppService] Workload cleanup failed"
                );
            }
        })
    }
}

async fn cleanup(
    connections: Arc<dyn ConnectionRepository>,
    registry: Arc<dyn ComponentRegistry>,
    connection_id: Uuid,
) -> anyhow::Result<()> {
    let record = connections
        .list()
        .await?
        .into_iter()
        .find(|r| r.id == connection_id);

    let Some(record) = record else {
        debug!(connection_id = %connection_id, "[ConnectionAppService] Nothing to clean up");
        return Ok(());
    };

    let removed = registry
        .delete_scope(&Host::new(KUBERNETES_HOST, &record.context_id))
        .await?;
    connections.delete(&connection_id).await?;

    info!(
        connection_id = %connection_id,
        context = %record.name,
        components = removed,
        "[ConnectionAppService] Connection deleted"
    );
    Ok(())
}
