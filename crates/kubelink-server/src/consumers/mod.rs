//! Event Consumers
//!
//! Background tasks draining the two event channels of the application
//! services:
//!
//! ```text
//!   EventBroadcaster (SystemEvent)        EventBus (DomainEvent)
//!              │                                  │
//!              ▼                                  ▼
//!       ┌─────────────┐                  ┌──────────────────┐
//!       │ AuditLogger │                  │ DomainEventLogger│
//!       └─────────────┘                  └──────────────────┘
//!              │                                  │
//!              ▼                                  ▼
//!   per-user audit log lines          topology / lifecycle log lines
//! ```

mod audit_logger;
mod event_logger;

pub use audit_logger::AuditLogger;
pub use event_logger::DomainEventLogger;
