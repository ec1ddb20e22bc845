//! Tracker owning every live state machine

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{DefaultTransitionEngine, StateMachine, TransitionEngine, TransitionError};
use crate::domain::{ConnectionStatus, KubeContext};

/// Result of initializing a connection's machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new machine was created and seeded
    Created(ConnectionStatus),
    /// A machine already existed and was left untouched
    Reused(ConnectionStatus),
}

impl InitOutcome {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::Created(status) | Self::Reused(status) => *status,
        }
    }
}

/// Registry of state machines keyed by connection id.
///
/// At most one machine exists per connection id.
#[async_trait]
pub trait ConnectionTracker: Send + Sync {
    /// Lock the registry for a whole batch pass.
    ///
    /// The lock is released when the returned pass is dropped.
    async fn begin_pass(&self) -> Box<dyn TrackerPass>;

    async fn status(&self, connection_id: &Uuid) -> Option<ConnectionStatus>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop a connection's machine; returns whether one existed
    async fn remove(&self, connection_id: &Uuid) -> bool;
}

/// Exclusive access to the registry for the duration of a pass
pub trait TrackerPass: Send {
    /// Create a machine for `connection_id` seeded from `context.status`,
    /// or reuse the existing one.
    ///
    /// A machine is only stored when seeding succeeds.
    fn initialize(
        &mut self,
        context: &KubeContext,
        connection_id: Uuid,
    ) -> Result<InitOutcome, TransitionError>;
}

type Machines = HashMap<Uuid, StateMachine>;

/// Single-mutex [`ConnectionTracker`]
pub struct MachineTracker {
    machines: Arc<Mutex<Machines>>,
    engine: Arc<dyn TransitionEngine>,
}

impl MachineTracker {
    pub fn new(engine: Arc<dyn TransitionEngine>) -> Self {
        Self {
            machines: Arc::new(Mutex::new(HashMap::new())),
            engine,
        }
    }
}

impl Default for MachineTracker {
    fn default() -> Self {
        Self::new(Arc::new(DefaultTransitionEngine))
    }
}

#[async_trait]
impl ConnectionTracker for MachineTracker {
    async fn begin_pass(&self) -> Box<dyn TrackerPass> {
        let guard = self.machines.clone().lock_owned().await;
        Box::new(LockedPass {
            machines: guard,
            engine: self.engine.clone(),
        })
    }

    async fn status(&self, connection_id: &Uuid) -> Option<ConnectionStatus> {
        self.machines
            .lock()
            .await
            .get(connection_id)
            .map(StateMachine::status)
    }

    async fn len(&self) -> usize {
        self.machines.lock().await.len()
    }

    async fn remove(&self, connection_id: &Uuid) -> bool {
        let removed = self.machines.lock().await.remove(connection_id);
        if let Some(machine) = &removed {
            debug!(
                connection_id = %connection_id,
                context = machine.context_name(),
                "[Tracker] Removed state machine"
            );
        }
        removed.is_some()
    }
}

struct LockedPass {
    machines: OwnedMutexGuard<Machines>,
    engine: Arc<dyn TransitionEngine>,
}

impl TrackerPass for LockedPass {
    fn initialize(
        &mut self,
        context: &KubeContext,
        connection_id: Uuid,
    ) -> Result<InitOutcome, TransitionError> {
        if let Some(existing) = self.machines.get(&connection_id) {
            return Ok(InitOutcome::Reused(existing.status()));
        }

        let mut machine = StateMachine::new(connection_id, &context.name, self.engine.clone());
        match context.status.start_event() {
            Some(event) => {
                machine.send(event)?;
            }
            None => machine.force(context.status),
        }

        let status = machine.status();
        debug!(
            connection_id = %connection_id,
            context = %context.name,
            status = %status,
            "[Tracker] Initialized state machine"
        );
        self.machines.insert(connection_id, machine);
        Ok(InitOutcome::Created(status))
    }
}
