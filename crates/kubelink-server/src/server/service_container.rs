//! Service Container - holds all initialized services

use std::sync::Arc;

use anyhow::Result;
use kubelink_core::{
    ApplicationServices, ApplicationServicesBuilder, EventBroadcaster, EventBus, EventRepository,
};

use super::{ServerDependencies, StartupOrchestrator};
use crate::config::ServerConfig;

/// Container for all server services, created once and shared by handlers
#[derive(Clone)]
pub struct ServiceContainer {
    /// Connection, registration and discovery services
    pub services: Arc<ApplicationServices>,

    /// Read side of the audit log
    pub event_repo: Arc<dyn EventRepository>,

    /// Startup discovery and registration
    pub startup_orchestrator: Arc<StartupOrchestrator>,
}

impl ServiceContainer {
    /// Wire the application services from dependencies
    pub fn initialize(
        config: &ServerConfig,
        deps: &ServerDependencies,
        event_bus: Arc<EventBus>,
        broadcaster: EventBroadcaster,
    ) -> Result<Self> {
        let mut builder = ApplicationServicesBuilder::new()
            .with_event_bus(event_bus)
            .with_broadcaster(broadcaster)
            .with_connection_repo(deps.connection_repo.clone())
            .with_event_repo(deps.event_repo.clone())
            .with_component_registry(deps.component_registry.clone())
            .with_artifact_store(deps.artifact_store.clone())
            .with_model_cache(deps.model_cache.clone())
            .with_system_id(config.resolve_system_id()?)
            .with_kubeconfig_dir(config.kubeconfig_dir.clone());

        if let Some(client) = &deps.cluster_client {
            builder = builder.with_cluster_client(client.clone());
        }
        if let Some(generator) = &deps.generator {
            builder = builder.with_generator(generator.clone());
        }
        if let Some(source) = &deps.external_source {
            builder = builder.with_external_source(source.clone());
        }
        if let Some(source) = &deps.in_cluster_source {
            builder = builder.with_in_cluster_source(source.clone());
        }

        let services = Arc::new(builder.build()?);
        let startup_orchestrator = Arc::new(StartupOrchestrator::new(
            services.clone(),
            config.provider_token.clone(),
        ));

        Ok(Self {
            services,
            event_repo: deps.event_repo.clone(),
            startup_orchestrator,
        })
    }
}
