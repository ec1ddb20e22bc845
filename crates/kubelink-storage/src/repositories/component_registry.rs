//! SQLite implementation of ComponentRegistry.
//!
//! Components are unique per (hostname, scope, kind, apiVersion). Lookups
//! ignore the host, so a component registered for one context is found
//! when another context serves the same kind.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use kubelink_core::{
    ComponentDefinition, ComponentFilter, ComponentRegistry, Host, ModelReference,
};
use rusqlite::params;
use tokio::sync::Mutex;
use tracing::debug;

use crate::Database;

/// SQLite-backed component registry.
pub struct SqliteComponentRegistry {
    db: Arc<Mutex<Database>>,
}

impl SqliteComponentRegistry {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn row_to_component(row: &rusqlite::Row) -> rusqlite::Result<ComponentDefinition> {
        let id: String = row.get(0)?;
        let metadata: String = row.get(8)?;

        Ok(ComponentDefinition {
            id: id.parse().unwrap_or_default(),
            kind: row.get(1)?,
            api_version: row.get(2)?,
            display_name: row.get(3)?,
            model: ModelReference {
                name: row.get(4)?,
                version: row.get(5)?,
                display_name: row.get(6)?,
                category: row.get(7)?,
            },
            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
            schema: row.get(9)?,
        })
    }
}

#[async_trait]
impl ComponentRegistry for SqliteComponentRegistry {
    async fn lookup(&self, filter: &ComponentFilter) -> Result<Vec<ComponentDefinition>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT id, kind, api_version, display_name, model_name, model_version,
                model_display_name, model_category, metadata_json, schema
             FROM components WHERE kind = ?1 AND api_version = ?2
             ORDER BY created_at, rowid",
        )?;
        let components = stmt
            .query_map(
                params![filter.kind, filter.api_version],
                Self::row_to_component,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(components)
    }

    async fn register(&self, host: &Host, component: &ComponentDefinition) -> Result<()> {
        let metadata = serde_json::to_string(&component.metadata)?;
        let now = Utc::now().to_rfc3339();

        let db = self.db.lock().await;
        db.connection().execute(
            "INSERT INTO components (id, hostname, scope, kind, api_version, display_name,
                model_name, model_version, model_display_name, model_category, metadata_json,
                schema, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
             ON CONFLICT(hostname, scope, kind, api_version) DO UPDATE SET
                display_name = excluded.display_name,
                model_name = excluded.model_name,
                model_version = excluded.model_version,
                model_display_name = excluded.model_display_name,
                model_category = excluded.model_category,
                metadata_json = excluded.metadata_json,
                schema = excluded.schema,
                updated_at = excluded.updated_at",
            params![
                component.id.to_string(),
                host.hostname,
                host.scope,
                component.kind,
                component.api_version,
                component.display_name,
                component.model.name,
                component.model.version,
                component.model.display_name,
                component.model.category,
                metadata,
                component.schema,
                now,
            ],
        )?;

        debug!(
            host = %host.hostname,
            scope = %host.scope,
            kind = %component.kind,
            "[ComponentRegistry] Registered component"
        );
        Ok(())
    }

    async fn delete_scope(&self, host: &Host) -> Result<usize> {
        let db = self.db.lock().await;
        let removed = db.connection().execute(
            "DELETE FROM components WHERE hostname = ?1 AND scope = ?2",
            params![host.hostname, host.scope],
        )?;
        Ok(removed)
    }
}
