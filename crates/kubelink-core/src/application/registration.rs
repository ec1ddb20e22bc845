//! Component Registration Service
//!
//! Generates component definitions for each context and writes them to the
//! registry, reusing what the registry already knows about a component.

use std::sync::Arc;

use serde_json::{json, Map};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuditTrail;
use crate::domain::{
    merge_missing, merge_preferring, ComponentDefinition, DomainEvent, EventBuilder, Host,
    KubeContext, Severity,
};
use crate::event_bus::EventSender;
use crate::repository::{ArtifactStore, ComponentRegistry};
use crate::service::{ComponentGenerator, ModelMetadataCache};
use crate::KUBERNETES_HOST;

/// What registration did for one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub context_name: String,
    pub connection_id: Option<Uuid>,
    pub registered: usize,
    pub error: Option<String>,
}

/// Application service for component registration
pub struct ComponentRegistrationService {
    registry: Arc<dyn ComponentRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    generator: Arc<dyn ComponentGenerator>,
    model_cache: Arc<ModelMetadataCache>,
    audit: AuditTrail,
    event_sender: EventSender,
    system_id: Uuid,
}

impl ComponentRegistrationService {
    pub fn new(
        registry: Arc<dyn ComponentRegistry>,
        artifacts: Arc<dyn ArtifactStore>,
        generator: Arc<dyn ComponentGenerator>,
        model_cache: Arc<ModelMetadataCache>,
        audit: AuditTrail,
        event_sender: EventSender,
        system_id: Uuid,
    ) -> Self {
        Self {
            registry,
            artifacts,
            generator,
            model_cache,
            audit,
            event_sender,
            system_id,
        }
    }

    /// Run [`register_components`](Self::register_components) in the background
    pub fn spawn_registration(
        self: &Arc<Self>,
        contexts: Vec<KubeContext>,
        user_id: Uuid,
    ) -> JoinHandle<Vec<RegistrationReport>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.register_components(&contexts, user_id).await })
    }

    /// Register the components of every context.
    ///
    /// A failing context is reported and skipped.
    ///
    /// Emits: `ComponentsRegistered` per successful context
    pub async fn register_components(
        &self,
        contexts: &[KubeContext],
        user_id: Uuid,
    ) -> Vec<RegistrationReport> {
        let mut reports = Vec::with_capacity(contexts.len());
        for context in contexts {
            let report = match self.register_context(context, user_id).await {
                Ok(registered) => RegistrationReport {
                    context_name: context.name.clone(),
                    connection_id: context.connection_id,
                    registered,
                    error: None,
                },
                Err(e) => {
                    warn!(
                        context = %context.name,
                        error = %e,
                        "[Registration] Failed to generate components"
                    );
                    self.audit
                        .record(
                            self.event(context, user_id)
                                .with_severity(Severity::Error)
                                .with_description(format!(
                                    "Unable to register Kubernetes components for {}",
                                    context.name
                                ))
                                .with_metadata(error_metadata(&e))
                                .build(),
                        )
                        .await;
                    RegistrationReport {
                        context_name: context.name.clone(),
                        connection_id: context.connection_id,
                        registered: 0,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    async fn register_context(
        &self,
        context: &KubeContext,
        user_id: Uuid,
    ) -> anyhow::Result<usize> {
        let components = self.generator.generate(context).await?;
        let host = Host::new(KUBERNETES_HOST, &context.id);

        let mut count = 0;
        for mut component in components {
            self.enrich(&mut component).await;
            match self.registry.register(&host, &component).await {
                Ok(()) => count += 1,
                Err(e) => warn!(
                    kind = %component.kind,
                    api_version = %component.api_version,
                    error = %e,
                    "[Registration] Failed to register component"
                ),
            }
        }

        let mut metadata = Map::new();
        metadata.insert("context".to_string(), json!(context.name));
        metadata.insert("count".to_string(), json!(count));
        self.audit
            .record(
                self.event(context, user_id)
                    .with_severity(Severity::Informational)
                    .with_description(format!(
                        "{} Kubernetes components registered for {}",
                        count, context.name
                    ))
                    .with_metadata(metadata)
                    .build(),
            )
            .await;

        self.event_sender.emit(DomainEvent::ComponentsRegistered {
            connection_id: context.connection_id,
            context_name: context.name.clone(),
            count,
        });

        info!(
            context = %context.name,
            registered = count,
            "[Registration] Registered Kubernetes components"
        );
        Ok(count)
    }

    /// Fill in metadata and model lineage before registering.
    ///
    /// A component the registry already has keeps that entry's metadata and
    /// model; anything else gets the model template defaults and has its
    /// artifacts stored.
    pub async fn enrich(&self, component: &mut ComponentDefinition) {
        let existing = match self.registry.lookup(&component.filter()).await {
            Ok(mut matches) if !matches.is_empty() => Some(matches.swap_remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!(
                    kind = %component.kind,
                    error = %e,
                    "[Registration] Registry lookup failed, using model defaults"
                );
                None
            }
        };

        match existing {
            Some(existing) => {
                debug!(
                    kind = %component.kind,
                    api_version = %component.api_version,
                    "[Registration] Reusing registered component metadata"
                );
                merge_preferring(&mut component.metadata, &existing.metadata);
                component.model = existing.model;
            }
            None => {
                merge_missing(&mut component.metadata, self.model_cache.metadata());
                if let Err(e) = self.artifacts.persist_artifacts(component).await {
                    warn!(
                        kind = %component.kind,
                        error = %e,
                        "[Registration] Failed to store component artifacts"
                    );
                }
            }
        }
    }

    fn event(&self, context: &KubeContext, user_id: Uuid) -> EventBuilder {
        let builder = EventBuilder::new()
            .from_user(user_id)
            .from_system(self.system_id)
            .with_category("kubernetes_components")
            .with_action("registration");
        match context.connection_id {
            Some(id) => builder.acted_upon(id),
            None => builder,
        }
    }
}

fn error_metadata(error: &anyhow::Error) -> Map<String, serde_json::Value> {
    let mut metadata = Map::new();
    metadata.insert("error".to_string(), json!(format!("{:#}", error)));
    metadata
}
