//! Event Bus - Central event distribution system
//!
//! Two channels leave the application services:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventBus (broadcast)            EventBroadcaster (unbounded mpsc) │
//! │  DomainEvent                     (user_id, SystemEvent)            │
//! │                                                                    │
//! │  Producers:                      Producers:                        │
//! │  ├─ ConnectionAppService         ├─ ConnectionAppService           │
//! │  ├─ ComponentRegistrationService ├─ DiscoveryService               │
//! │  └─ KubelinkServer               └─ kubeconfig extractor           │
//! │                                                                    │
//! │  Consumers: topology watchers    Consumer: AuditLogger             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither channel applies back-pressure: emitting never blocks the request
//! path and there is no delivery acknowledgement.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{DomainEvent, SystemEvent};

/// Default channel capacity for the event bus
const DEFAULT_CAPACITY: usize = 256;

/// Event Bus - Central hub for domain event distribution
///
/// Uses a broadcast channel to allow multiple consumers to receive
/// all events. Each consumer gets its own copy of every event.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Get a sender for emitting events
    pub fn sender(&self) -> EventSender {
        EventSender::new(self.sender.clone())
    }

    /// Subscribe to receive events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event Sender - Used by services to emit domain events
///
/// Thread-safe and cheaply cloneable.
#[derive(Clone)]
pub struct EventSender {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventSender {
    fn new(sender: broadcast::Sender<DomainEvent>) -> Self {
        Self { sender }
    }

    /// Emit a domain event
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no subscribers (not an error).
    pub fn emit(&self, event: DomainEvent) -> usize {
        let type_name = event.type_name();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(
                    event_type = type_name,
                    receivers = count,
                    "[EventBus] Emitted event"
                );
                count
            }
            Err(_) => {
                debug!(event_type = type_name, "[EventBus] No receivers for event");
                0
            }
        }
    }
}

/// Event Receiver - Used by consumers to receive domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<DomainEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event (async)
    ///
    /// Returns `None` if the channel is closed.
    /// Handles lag gracefully by logging and continuing.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        skipped_events = skipped,
                        "[EventBus] Receiver lagged, skipped {} events", skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[EventBus] Channel closed");
                    return None;
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(
                    skipped_events = skipped,
                    "[EventBus] Receiver lagged on try_recv"
                );
                self.receiver.try_recv().ok()
            }
            Err(_) => None,
        }
    }
}

// ============================================================================
// AUDIT BROADCASTER
// ============================================================================

/// Fire-and-forget delivery of audit events to users.
///
/// Backed by an unbounded channel: `publish` never waits and never fails
/// towards the caller.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: mpsc::UnboundedSender<(Uuid, SystemEvent)>,
}

impl EventBroadcaster {
    /// Create a broadcaster and the single receiver that drains it
    pub fn channel() -> (Self, BroadcastReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, BroadcastReceiver { receiver })
    }

    /// Create a broadcaster whose events are dropped
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Queue an event for delivery to `user_id`
    pub fn publish(&self, user_id: Uuid, event: SystemEvent) {
        let event_id = event.id;
        if self.sender.send((user_id, event)).is_err() {
            debug!(
                event_id = %event_id,
                user_id = %user_id,
                "[Broadcaster] No consumer, event dropped"
            );
        }
    }
}

/// Receiving half of [`EventBroadcaster`]
pub struct BroadcastReceiver {
    receiver: mpsc::UnboundedReceiver<(Uuid, SystemEvent)>,
}

impl BroadcastReceiver {
    /// Wait for the next published event
    pub async fn recv(&mut self) -> Option<(Uuid, SystemEvent)> {
        self.receiver.recv().await
    }

    /// Take everything currently queued
    pub fn drain(&mut self) -> Vec<(Uuid, SystemEvent)> {
        let mut events = Vec::new();
        while let Ok(item) = self.receiver.try_recv() {
            events.push(item);
        }
        events
    }
}

// ============================================================================
// TESTS
// ============================================================================
