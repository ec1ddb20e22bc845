//! Domain entities, value objects, and events
//!
//! This module contains all domain-level types for Kubelink:
//! - Entities (KubeContext, ConnectionRecord, ComponentDefinition)
//! - Value Objects (ConnectionStatus, DeploymentType, Severity, etc.)
//! - Audit events (SystemEvent) and in-process notifications (DomainEvent)

mod component;
mod connection;
mod context;
mod event;

pub use component::{
    merge_missing, merge_preferring, ComponentDefinition, ComponentFilter, Host, Metadata,
    ModelReference,
};
pub use connection::{ConnectionRecord, ConnectionStatus, DeploymentType, MachineEvent};
pub use context::{KubeContext, ServerVersion};
pub use event::{DomainEvent, EventBuilder, Severity, SystemEvent};
