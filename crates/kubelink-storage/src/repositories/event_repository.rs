//! SQLite implementation of EventRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use kubelink_core::{EventRepository, Severity, SystemEvent};
use rusqlite::params;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::parse_datetime;
use crate::Database;

/// SQLite-backed audit event store.
pub struct SqliteEventRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteEventRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<SystemEvent> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let system_id: String = row.get(2)?;
        let acted_upon: Option<String> = row.get(3)?;
        let severity: String = row.get(6)?;
        let metadata: String = row.get(8)?;
        let created_at: String = row.get(9)?;

        Ok(SystemEvent {
            id: id.parse().unwrap_or_default(),
            user_id: user_id.parse().unwrap_or_default(),
            system_id: system_id.parse().unwrap_or_default(),
            acted_upon: acted_upon.and_then(|s| s.parse::<Uuid>().ok()),
            category: row.get(4)?,
            action: row.get(5)?,
            severity: Severity::parse(&severity),
            description: row.get(7)?,
            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
            created_at: parse_datetime(&created_at),
        })
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn persist_event(&self, event: &SystemEvent) -> Result<()> {
        let metadata = serde_json::to_string(&event.metadata)?;

        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO events (id, user_id, system_id, acted_upon, category, action, severity,
                description, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id.to_string(),
                event.user_id.to_string(),
                event.system_id.to_string(),
                event.acted_upon.map(|id| id.to_string()),
                event.category,
                event.action,
                event.severity.as_str(),
                event.description,
                metadata,
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SystemEvent>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT id, user_id, system_id, acted_upon, category, action, severity,
                description, metadata_json, created_at
             FROM events ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let events = stmt
            .query_map(params![limit as i64], Self::row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}
