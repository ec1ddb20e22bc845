//! Connection lifecycle value objects and the persisted connection record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection lifecycle status
///
/// Shared by persisted records, state machines and events.
/// Values match database storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Newly registered, not yet connected
    #[default]
    Discovered,
    /// Connection established and in use
    Connected,
    /// Operator chose to ignore this cluster
    Ignored,
    /// Connection is broken
    Errored,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Connected => "connected",
            Self::Ignored => "ignored",
            Self::Errored => "errored",
        }
    }

    /// Parse a stored status. Unknown values are treated as `Discovered`.
    pub fn parse(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "ignored" => Self::Ignored,
            "errored" => Self::Errored,
            _ => Self::Discovered,
        }
    }

    /// Event used to seed a freshly created state machine.
    ///
    /// `Errored` connections are tracked but never transitioned.
    pub fn start_event(&self) -> Option<MachineEvent> {
        match self {
            Self::Discovered => Some(MachineEvent::Register),
            Self::Connected => Some(MachineEvent::Connect),
            Self::Ignored => Some(MachineEvent::Ignore),
            Self::Errored => None,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event accepted by a connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineEvent {
    Register,
    Connect,
    Ignore,
}

impl MachineEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Connect => "connect",
            Self::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for MachineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the cluster credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
    /// The process' own service account
    InCluster,
    /// An uploaded or file-sourced kubeconfig
    #[default]
    OutOfCluster,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InCluster => "in_cluster",
            Self::OutOfCluster => "out_of_cluster",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_cluster" => Self::InCluster,
            _ => Self::OutOfCluster,
        }
    }
}

/// Persisted counterpart of a [`KubeContext`](super::KubeContext)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Durable identifier, also the state machine key
    pub id: Uuid,
    /// Stable id of the context this connection was saved from
    pub context_id: String,
    /// Context name
    pub name: String,
    /// Connection kind (always "kubernetes" today)
    pub kind: String,
    /// Current lifecycle status
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRecord {
    /// Create a new record in the `Discovered` state
    pub fn new(context_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            context_id: context_id.into(),
            name: name.into(),
            kind: "kubernetes".to_string(),
            status: ConnectionStatus::Discovered,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }
}
