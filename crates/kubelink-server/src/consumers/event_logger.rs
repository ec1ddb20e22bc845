//! Domain Event Logger - records topology and lifecycle notifications

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kubelink_core::{DomainEvent, EventReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Default)]
pub struct DomainEventLogger {
    topology_changes: AtomicU64,
}

impl DomainEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology-affecting events seen so far
    pub fn topology_changes(&self) -> u64 {
        self.topology_changes.load(Ordering::Relaxed)
    }

    pub fn start(self: Arc<Self>, mut receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("[DomainEventLogger] Started listening for domain events");
            while let Some(event) = receiver.recv().await {
                self.handle(&event);
            }
            info!("[DomainEventLogger] Event bus closed");
        })
    }

    fn handle(&self, event: &DomainEvent) {
        if event.affects_topology() {
            self.topology_changes.fetch_add(1, Ordering::Relaxed);
        }
        match event {
            DomainEvent::ContextsChanged { registered } => {
                info!(registered, "[Topology] Kubernetes contexts changed");
            }
            DomainEvent::WorkloadCleanupScheduled { connection_id } => {
                info!(connection_id = %connection_id, "[Topology] Workload cleanup scheduled");
            }
            DomainEvent::ComponentsRegistered {
                context_name,
                count,
                ..
            } => {
                info!(context = %context_name, count, "[Registry] Components registered");
            }
            other => debug!(event_type = other.type_name(), "[DomainEventLogger] Event"),
        }
    }
}
