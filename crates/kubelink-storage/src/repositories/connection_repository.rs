//! SQLite implementation of ConnectionRepository.
//!
//! One row per context id. The auth entry and the flattened kubeconfig are
//! encrypted; everything needed to list and classify connections is not.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use kubelink_core::{
    ConnectionRecord, ConnectionRepository, ConnectionStatus, DeploymentType, KubeContext,
};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::parse_datetime;
use crate::crypto::FieldEncryptor;
use crate::Database;

/// Raw connection row before decryption.
struct RawConnectionRow {
    id: String,
    context_id: String,
    name: String,
    kind: String,
    status: String,
    server: String,
    namespace: Option<String>,
    deployment_type: String,
    cluster_json: String,
    auth_encrypted: String,
    kubeconfig_encrypted: String,
    system_id: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

/// SQLite-backed connection repository.
///
/// The store is local to one control plane, so the caller's token is not
/// used to scope reads or writes.
pub struct SqliteConnectionRepository {
    db: Arc<Mutex<Database>>,
    encryptor: Arc<FieldEncryptor>,
}

impl SqliteConnectionRepository {
    pub fn new(db: Arc<Mutex<Database>>, encryptor: Arc<FieldEncryptor>) -> Self {
        Self { db, encryptor }
    }

    const SELECT_COLUMNS: &'static str = "id, context_id, name, kind, status, server, namespace, \
         deployment_type, cluster_json, auth_encrypted, kubeconfig_encrypted, system_id, \
         created_by, created_at, updated_at";

    fn extract_row(row: &rusqlite::Row) -> rusqlite::Result<RawConnectionRow> {
        Ok(RawConnectionRow {
            id: row.get(0)?,
            context_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            status: row.get(4)?,
            server: row.get(5)?,
            namespace: row.get(6)?,
            deployment_type: row.get(7)?,
            cluster_json: row.get(8)?,
            auth_encrypted: row.get(9)?,
            kubeconfig_encrypted: row.get(10)?,
            system_id: row.get(11)?,
            created_by: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn build_record(row: &RawConnectionRow) -> Result<ConnectionRecord> {
        Ok(ConnectionRecord {
            id: row
                .id
                .parse()
                .with_context(|| format!("Invalid connection id {}", row.id))?,
            context_id: row.context_id.clone(),
            name: row.name.clone(),
            kind: row.kind.clone(),
            status: ConnectionStatus::parse(&row.status),
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        })
    }

    fn build_context(&self, row: RawConnectionRow) -> Result<KubeContext> {
        let auth = self
            .encryptor
            .decrypt(&row.auth_encrypted)
            .context("Failed to decrypt connection auth")?;
        let kubeconfig = self
            .encryptor
            .decrypt_bytes(&row.kubeconfig_encrypted)
            .context("Failed to decrypt connection kubeconfig")?;

        Ok(KubeContext {
            id: row.context_id,
            name: row.name,
            server: row.server,
            cluster: serde_json::from_str(&row.cluster_json)
                .context("Stored cluster entry is not valid JSON")?,
            auth: serde_json::from_str(&auth).context("Stored auth entry is not valid JSON")?,
            namespace: row.namespace,
            kubeconfig,
            system_id: row.system_id.parse().unwrap_or_default(),
            created_by: row.created_by,
            connection_id: Some(
                row.id
                    .parse()
                    .with_context(|| format!("Invalid connection id {}", row.id))?,
            ),
            deployment_type: DeploymentType::parse(&row.deployment_type),
            status: ConnectionStatus::parse(&row.status),
        })
    }
}

#[async_trait]
impl ConnectionRepository for SqliteConnectionRepository {
    async fn save_context(&self, _token: &str, context: &KubeContext) -> Result<ConnectionRecord> {
        let cluster_json = serde_json::to_string(&context.cluster)?;
        let auth = self
            .encryptor
            .encrypt(&serde_json::to_string(&context.auth)?)
            .context("Failed to encrypt connection auth")?;
        let kubeconfig = self
            .encryptor
            .encrypt_bytes(&context.kubeconfig)
            .context("Failed to encrypt connection kubeconfig")?;
        let now = Utc::now().to_rfc3339();

        let db = self.db.lock().await;
        db.transaction(|conn| {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM connections WHERE context_id = ?1",
                        Self::SELECT_COLUMNS
                    ),
                    params![context.id],
                    Self::extract_row,
                )
                .optional()?;

            match existing {
                Some(row) => {
                    conn.execute(
                        "UPDATE connections SET name = ?2, server = ?3, namespace = ?4,
                            deployment_type = ?5, cluster_json = ?6, auth_encrypted = ?7,
                            kubeconfig_encrypted = ?8, updated_at = ?9
                         WHERE id = ?1",
                        params![
                            row.id,
                            context.name,
                            context.server,
                            context.namespace,
                            context.deployment_type.as_str(),
                            cluster_json,
                            auth,
                            kubeconfig,
                            now,
                        ],
                    )?;
                    let mut record = Self::build_record(&row)?;
                    record.name = context.name.clone();
                    record.updated_at = parse_datetime(&now);
                    debug!(
                        connection_id = %record.id,
                        status = %record.status,
                        "[ConnectionRepository] Context already saved"
                    );
                    Ok(record)
                }
                None => {
                    let record = ConnectionRecord::new(&context.id, &context.name);
                    conn.execute(
                        "INSERT INTO connections (id, context_id, name, kind, status, server,
                            namespace, deployment_type, cluster_json, auth_encrypted,
                            kubeconfig_encrypted, system_id, created_by, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                        params![
                            record.id.to_string(),
                            record.context_id,
                            record.name,
                            record.kind,
                            record.status.as_str(),
                            context.server,
                            context.namespace,
                            context.deployment_type.as_str(),
                            cluster_json,
                            auth,
                            kubeconfig,
                            context.system_id.to_string(),
                            context.created_by,
                            record.created_at.to_rfc3339(),
                            record.updated_at.to_rfc3339(),
                        ],
                    )?;
                    debug!(
                        connection_id = %record.id,
                        context = %record.name,
                        "[ConnectionRepository] Context saved"
                    );
                    Ok(record)
                }
            }
        })
    }

    async fn get_context(&self, _token: &str, connection_id: &Uuid) -> Result<Option<KubeContext>> {
        let row = {
            let db = self.db.lock().await;
            db.connection()
                .query_row(
                    &format!(
                        "SELECT {} FROM connections WHERE id = ?1",
                        Self::SELECT_COLUMNS
                    ),
                    params![connection_id.to_string()],
                    Self::extract_row,
                )
                .optional()?
        };

        row.map(|r| self.build_context(r)).transpose()
    }

    async fn list(&self) -> Result<Vec<ConnectionRecord>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connections ORDER BY created_at, name",
            Self::SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], Self::extract_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter().map(Self::build_record).collect()
    }

    async fn update_status(&self, connection_id: &Uuid, status: ConnectionStatus) -> Result<()> {
        let db = self.db.lock().await;
        let updated = db.connection().execute(
            "UPDATE connections SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                connection_id.to_string(),
                status.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        if updated == 0 {
            anyhow::bail!("Connection {} not found", connection_id);
        }
        Ok(())
    }

    async fn delete(&self, connection_id: &Uuid) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(
            "DELETE FROM connections WHERE id = ?1",
            params![connection_id.to_string()],
        )?;
        Ok(())
    }
}
