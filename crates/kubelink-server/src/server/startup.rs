//! Startup Orchestrator - discovery and registration at boot
//!
//! Keeps KubelinkServer focused on serving requests.

use std::sync::Arc;

use kubelink_core::{ApplicationServices, DiscoveryError, RegistrationReport};
use tracing::{info, warn};
use uuid::Uuid;

/// Runs kubeconfig discovery on behalf of the system itself
pub struct StartupOrchestrator {
    services: Arc<ApplicationServices>,
    token: String,
}

impl StartupOrchestrator {
    pub fn new(services: Arc<ApplicationServices>, token: String) -> Self {
        Self { services, token }
    }

    /// Discover contexts and register their components.
    ///
    /// Discovery runs as the nil user. Registration only starts once every
    /// discovered context has been persisted.
    pub async fn discover_and_register(&self) -> Result<StartupResult, DiscoveryError> {
        info!(
            dir = %self.services.discovery.kubeconfig_dir().display(),
            "[Startup] Discovering kubeconfig..."
        );

        let contexts = self
            .services
            .discovery
            .discover(Uuid::nil(), &self.token)
            .await
            .map_err(|e| {
                warn!(error = %e, "[Startup] Discovery failed");
                e
            })?;

        let names = contexts.iter().map(|c| c.name.clone()).collect();
        let reports = self
            .services
            .registration
            .register_components(&contexts, Uuid::nil())
            .await;

        let result = StartupResult {
            discovered: names,
            reports,
        };
        info!(
            discovered = result.discovered.len(),
            registered = result.registered(),
            failed = result.failed(),
            "[Startup] Discovery complete"
        );
        Ok(result)
    }
}

/// What startup discovery did
#[derive(Debug, Default)]
pub struct StartupResult {
    /// Names of the persisted contexts
    pub discovered: Vec<String>,
    pub reports: Vec<RegistrationReport>,
}

impl StartupResult {
    /// Components registered across all contexts
    pub fn registered(&self) -> usize {
        self.reports.iter().map(|r| r.registered).sum()
    }

    /// Contexts whose registration failed
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.error.is_some()).count()
    }
}
