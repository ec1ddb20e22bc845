//! Repository traits for data access
//!
//! These traits define the interface for data storage without specifying
//! the implementation (SQLite, in-memory, etc.)

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    ComponentDefinition, ComponentFilter, ConnectionRecord, ConnectionStatus, Host, KubeContext,
    SystemEvent,
};

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Connection repository trait
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Save a context on behalf of `token`.
    ///
    /// Idempotent on the context id: a context saved before returns its
    /// existing record (and status); a new one starts as `Discovered`.
    async fn save_context(&self, token: &str, context: &KubeContext)
        -> RepoResult<ConnectionRecord>;

    /// Get the context behind a connection
    async fn get_context(&self, token: &str, connection_id: &Uuid)
        -> RepoResult<Option<KubeContext>>;

    /// Get all connections
    async fn list(&self) -> RepoResult<Vec<ConnectionRecord>>;

    /// Update the stored status of a connection
    async fn update_status(&self, connection_id: &Uuid, status: ConnectionStatus)
        -> RepoResult<()>;

    /// Delete a connection
    async fn delete(&self, connection_id: &Uuid) -> RepoResult<()>;
}

/// Audit event sink
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Durably store an audit event
    async fn persist_event(&self, event: &SystemEvent) -> RepoResult<()>;

    /// Most recent events first
    async fn list_recent(&self, limit: usize) -> RepoResult<Vec<SystemEvent>>;
}

/// Component registry trait
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    /// Find registered components by (kind, apiVersion)
    async fn lookup(&self, filter: &ComponentFilter) -> RepoResult<Vec<ComponentDefinition>>;

    /// Register (or re-register) a component under `host`
    async fn register(&self, host: &Host, component: &ComponentDefinition) -> RepoResult<()>;

    /// Remove every component registered under `host`; returns how many
    async fn delete_scope(&self, host: &Host) -> RepoResult<usize>;
}

/// Store for visual/auxiliary artifacts embedded in component metadata
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Move embedded artifacts out of `component.metadata`, replacing them
    /// with references to the stored copies.
    async fn persist_artifacts(&self, component: &mut ComponentDefinition) -> RepoResult<()>;
}
