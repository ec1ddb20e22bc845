//! Events - audit records and in-process notifications
//!
//! Two kinds of events flow through Kubelink:
//! - [`SystemEvent`]: durable audit records. Persisted through the
//!   `EventRepository` and fanned out to the user through the broadcaster.
//! - [`DomainEvent`]: in-process notifications on the event bus
//!   (topology changes, registrations, server lifecycle).
//!
//! # Serialization
//!
//! Domain events serialize with a `type` field containing the snake_case variant name:
//! ```json
//! { "type": "contexts_changed", "registered": 2 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ConnectionStatus;

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Audit event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Informational,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "warning" => Self::Warning,
            "error" => Self::Error,
            "critical" => Self::Critical,
            _ => Self::Informational,
        }
    }
}

/// Durable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: Uuid,
    /// User the event is reported to
    pub user_id: Uuid,
    /// Control plane instance that produced the event
    pub system_id: Uuid,
    /// Connection (or other entity) the event is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acted_upon: Option<Uuid>,
    pub category: String,
    pub action: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Fluent builder for [`SystemEvent`]
///
/// Cloneable so one base builder can produce several related events.
#[derive(Debug, Clone, Default)]
pub struct EventBuilder {
    user_id: Uuid,
    system_id: Uuid,
    acted_upon: Option<Uuid>,
    category: String,
    action: String,
    severity: Severity,
    description: String,
    metadata: Map<String, Value>,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_user(mut self, user_id: Uuid) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn from_system(mut self, system_id: Uuid) -> Self {
        self.system_id = system_id;
        self
    }

    pub fn acted_upon(mut self, id: Uuid) -> Self {
        self.acted_upon = Some(id);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self) -> SystemEvent {
        SystemEvent {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            system_id: self.system_id,
            acted_upon: self.acted_upon,
            category: self.category,
            action: self.action,
            severity: self.severity,
            description: self.description,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// DOMAIN EVENT ENUM
// ============================================================================

/// In-process notifications
///
/// Application services emit these after successful operations.
/// Consumers (audit logger, UI bridges, tests) subscribe and react.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Connections were newly registered; observers should refresh their
    /// view of the cluster topology. Emitted at most once per batch.
    ContextsChanged { registered: usize },

    /// A connection's state machine moved to a new status
    ConnectionStatusChanged {
        connection_id: Uuid,
        status: ConnectionStatus,
    },

    /// Components were registered for a context
    ComponentsRegistered {
        #[serde(skip_serializing_if = "Option::is_none")]
        connection_id: Option<Uuid>,
        context_name: String,
        count: usize,
    },

    /// Workload cleanup was scheduled for a deleted connection
    WorkloadCleanupScheduled { connection_id: Uuid },

    /// HTTP server started listening
    ServerStarted { url: String, port: u16 },

    /// HTTP server stopped
    ServerStopped,
}

impl DomainEvent {
    /// Get the event type name (for logging/debugging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ContextsChanged { .. } => "contexts_changed",
            Self::ConnectionStatusChanged { .. } => "connection_status_changed",
            Self::ComponentsRegistered { .. } => "components_registered",
            Self::WorkloadCleanupScheduled { .. } => "workload_cleanup_scheduled",
            Self::ServerStarted { .. } => "server_started",
            Self::ServerStopped => "server_stopped",
        }
    }

    /// Check if this event should trigger a topology refresh
    pub fn affects_topology(&self) -> bool {
        matches!(
            self,
            Self::ContextsChanged { .. } | Self::WorkloadCleanupScheduled { .. }
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
