//! Kubelink Server
//!
//! HTTP surface over the kubelink application services:
//! - Kubeconfig upload, context listing and connection deletion
//! - Kubeconfig discovery with in-cluster fallback (also run at startup)
//! - Background component registration
//! - Audit event consumers and tracing setup for the `kubelink` binary

pub mod config;
pub mod consumers;
pub mod logging;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use consumers::{AuditLogger, DomainEventLogger};
pub use server::{
    ApiError, AppState, KubelinkServer, ServerDependencies, ServiceContainer,
    StartupOrchestrator, StartupResult, BUNDLE_FIELD, MAX_BUNDLE_BYTES, USER_ID_HEADER,
};
