//! # Kubelink Core Library
//!
//! Domain logic for turning uploaded or discovered kubeconfigs into tracked
//! cluster connections and registered Kubernetes components.
//!
//! ## Modules
//!
//! - `domain` - Core entities (KubeContext, ConnectionRecord, SystemEvent, ComponentDefinition)
//! - `repository` - Data access traits
//! - `kubeconfig` - Kubeconfig normalization and context extraction
//! - `machine` - Per-connection state machines and the tracker that owns them
//! - `service` - Collaborators that reach outside the process (files, clusters, artifacts)
//! - `application` - Application services with event emission
//! - `event_bus` - Domain event bus and the audit event broadcaster

pub mod application;
pub mod domain;
pub mod event_bus;
pub mod kubeconfig;
pub mod machine;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use domain::*;
pub use repository::*;

// Event-driven architecture exports
pub use event_bus::{BroadcastReceiver, EventBroadcaster, EventBus, EventReceiver, EventSender};
pub use application::{
    ApplicationServices, ApplicationServicesBuilder, AuditTrail, BatchAggregator, BatchOutcome,
    Classification, ComponentRegistrationService, ConnectionAppService, ConnectionError,
    DiscoveryError, DiscoveryService, Identity, RegistrationReport, SaveContextsResponse,
    IN_CLUSTER_CONTEXT,
};
pub use kubeconfig::{extract_contexts, normalize, ExtractRequest, Kubeconfig, KubeconfigError};
pub use machine::{
    ConnectionTracker, DefaultTransitionEngine, InitOutcome, MachineTracker, TrackerPass,
    TransitionEngine, TransitionError,
};
pub use service::{
    ClusterClient, ClusterComponentGenerator, ComponentGenerator, ExternalSource,
    FsArtifactStore, HttpClusterClient, InClusterSource, ModelMetadataCache,
    ServiceAccountSource, UriSource,
};

/// Hostname under which Kubernetes components are registered.
pub const KUBERNETES_HOST: &str = "kubernetes";
