//! Repository implementations using SQLite.

mod component_registry;
mod connection_repository;
mod event_repository;

pub use component_registry::SqliteComponentRegistry;
pub use connection_repository::SqliteConnectionRepository;
pub use event_repository::SqliteEventRepository;

use chrono::{DateTime, Utc};

/// Parse a stored timestamp: RFC 3339, or SQLite's `datetime('now')` format.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return dt.and_utc();
    }
    Utc::now()
}
