//! Kubelink Server
//!
//! HTTP server exposing the kubeconfig operations.
//! Self-contained with dependency injection: storage and collaborators come
//! in through [`ServerDependencies`].

mod dependencies;
mod error;
mod handlers;
mod service_container;
mod startup;

pub use dependencies::ServerDependencies;
pub use error::ApiError;
pub use handlers::{AppState, RequestIdentity, BUNDLE_FIELD, MAX_BUNDLE_BYTES, USER_ID_HEADER};
pub use service_container::ServiceContainer;
pub use startup::{StartupOrchestrator, StartupResult};

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use kubelink_core::{BroadcastReceiver, DomainEvent, EventBroadcaster, EventBus};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::consumers::{AuditLogger, DomainEventLogger};

/// Kubelink HTTP server
pub struct KubelinkServer {
    config: ServerConfig,
    event_bus: Arc<EventBus>,
    services: ServiceContainer,
    audit_rx: Option<BroadcastReceiver>,
}

impl KubelinkServer {
    /// Create a server from its configuration and dependencies
    pub fn new(config: ServerConfig, dependencies: ServerDependencies) -> anyhow::Result<Self> {
        info!("[Server] Initializing with dependency injection...");

        let event_bus = Arc::new(EventBus::new());
        let (broadcaster, audit_rx) = EventBroadcaster::channel();
        let services =
            ServiceContainer::initialize(&config, &dependencies, event_bus.clone(), broadcaster)?;

        info!("[Server] Services initialized successfully");
        Ok(Self {
            config,
            event_bus,
            services,
            audit_rx: Some(audit_rx),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.services
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Take the audit event receiver instead of letting `run` log it
    pub fn take_audit_receiver(&mut self) -> Option<BroadcastReceiver> {
        self.audit_rx.take()
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let app_state = AppState {
            services: Arc::new(self.services.clone()),
        };

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/system/kubernetes",
                post(handlers::submit_kubeconfig).delete(handlers::delete_connection),
            )
            .route(
                "/api/system/kubernetes/contexts",
                post(handlers::list_contexts),
            )
            .route("/api/system/kubernetes/ping", get(handlers::ping))
            .route(
                "/api/system/kubernetes/register",
                post(handlers::register_components),
            )
            .route("/api/system/kubernetes/discover", post(handlers::discover))
            .route("/api/system/events", get(handlers::recent_events))
            .with_state(app_state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::max(MAX_BUNDLE_BYTES)),
            );

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Run the server until `shutdown` is cancelled.
    ///
    /// Starts the event consumers, runs startup discovery in the
    /// background, then serves requests.
    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = self.config.addr()?;

        if let Some(audit_rx) = self.audit_rx.take() {
            Arc::new(AuditLogger::new()).start(audit_rx);
        }
        Arc::new(DomainEventLogger::new()).start(self.event_bus.subscribe());

        if self.config.discover_on_startup {
            let orchestrator = self.services.startup_orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orchestrator.discover_and_register().await {
                    warn!(error = %e, "[Server] Startup discovery did not find a cluster");
                }
            });
        }

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let sender = self.event_bus.sender();

        info!(
            "[Server] Listening on {} (CORS {})",
            local,
            if self.config.enable_cors {
                "enabled"
            } else {
                "disabled"
            }
        );
        sender.emit(DomainEvent::ServerStarted {
            url: format!("http://{}", local),
            port: local.port(),
        });

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        sender.emit(DomainEvent::ServerStopped);
        info!("[Server] Stopped");
        Ok(())
    }

    /// Start the server in the background
    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
