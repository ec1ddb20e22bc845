//! Audit Logger - drains the audit event broadcaster
//!
//! Every published `SystemEvent` is written to the log at a level matching
//! its severity. This is the consumer end of the fire-and-forget channel;
//! it never reports back to the producer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kubelink_core::{BroadcastReceiver, Severity, SystemEvent};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Audit event consumer
#[derive(Default)]
pub struct AuditLogger {
    delivered: AtomicU64,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events handled so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Start draining `receiver` on a background task.
    ///
    /// The task ends when every broadcaster has been dropped.
    pub fn start(self: Arc<Self>, mut receiver: BroadcastReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("[AuditLogger] Started listening for audit events");
            while let Some((user_id, event)) = receiver.recv().await {
                self.handle(user_id, &event);
            }
            info!("[AuditLogger] Audit channel closed");
        })
    }

    fn handle(&self, user_id: Uuid, event: &SystemEvent) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        let entries = event.metadata.len();
        match event.severity {
            Severity::Informational => info!(
                user_id = %user_id,
                category = %event.category,
                action = %event.action,
                entries,
                "[Audit] {}", event.description
            ),
            Severity::Warning => warn!(
                user_id = %user_id,
                category = %event.category,
                action = %event.action,
                entries,
                "[Audit] {}", event.description
            ),
            Severity::Error | Severity::Critical => error!(
                user_id = %user_id,
                category = %event.category,
                action = %event.action,
                severity = event.severity.as_str(),
                acted_upon = ?event.acted_upon,
                "[Audit] {}", event.description
            ),
        }
        debug!(event_id = %event.id, "[AuditLogger] Event delivered");
    }
}
