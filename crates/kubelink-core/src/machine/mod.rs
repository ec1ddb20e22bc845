//! Connection state machines
//!
//! One [`StateMachine`] per persisted connection, owned by a
//! [`ConnectionTracker`]. The transition rules live behind
//! [`TransitionEngine`] so a richer lifecycle can be plugged in without
//! touching the tracker or its callers.

mod tracker;

pub use tracker::{ConnectionTracker, InitOutcome, MachineTracker, TrackerPass};

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ConnectionStatus, MachineEvent};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {event} connection {connection_id} while it is {from}")]
    Rejected {
        connection_id: Uuid,
        from: ConnectionStatus,
        event: MachineEvent,
    },

    #[error("transition engine failure: {0}")]
    Engine(String),
}

/// Decides where a connection goes when it receives an event
pub trait TransitionEngine: Send + Sync {
    fn transition(
        &self,
        connection_id: Uuid,
        from: ConnectionStatus,
        event: MachineEvent,
    ) -> Result<ConnectionStatus, TransitionError>;
}

/// The lifecycle Kubelink ships with.
///
/// An errored connection accepts nothing but `ignore`; everything else
/// moves straight to the status the event names.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTransitionEngine;

impl TransitionEngine for DefaultTransitionEngine {
    fn transition(
        &self,
        connection_id: Uuid,
        from: ConnectionStatus,
        event: MachineEvent,
    ) -> Result<ConnectionStatus, TransitionError> {
        let rejected = || TransitionError::Rejected {
            connection_id,
            from,
            event,
        };

        match (from, event) {
            (ConnectionStatus::Errored, MachineEvent::Register | MachineEvent::Connect) => {
                Err(rejected())
            }
            (_, MachineEvent::Register) => Ok(ConnectionStatus::Discovered),
            (_, MachineEvent::Connect) => Ok(ConnectionStatus::Connected),
            (_, MachineEvent::Ignore) => Ok(ConnectionStatus::Ignored),
        }
    }
}

/// Live lifecycle of one connection
pub struct StateMachine {
    connection_id: Uuid,
    context_name: String,
    status: ConnectionStatus,
    engine: Arc<dyn TransitionEngine>,
}

impl StateMachine {
    /// New machine in the initial (`Discovered`) state
    pub fn new(
        connection_id: Uuid,
        context_name: impl Into<String>,
        engine: Arc<dyn TransitionEngine>,
    ) -> Self {
        Self {
            connection_id,
            context_name: context_name.into(),
            status: ConnectionStatus::Discovered,
            engine,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Feed an event; the status only changes when the engine accepts it
    pub fn send(&mut self, event: MachineEvent) -> Result<ConnectionStatus, TransitionError> {
        let next = self
            .engine
            .transition(self.connection_id, self.status, event)?;
        self.status = next;
        Ok(next)
    }

    fn force(&mut self, status: ConnectionStatus) {
        self.status = status;
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("connection_id", &self.connection_id)
            .field("context_name", &self.context_name)
            .field("status", &self.status)
            .finish()
    }
}
