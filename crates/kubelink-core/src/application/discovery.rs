//! Discovery Service
//!
//! Finds cluster credentials when none were uploaded: the kubeconfig in the
//! configured directory first, the process' own service account second.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::AuditTrail;
use crate::domain::{DeploymentType, EventBuilder, KubeContext, Severity};
use crate::kubeconfig::{self, ExtractRequest, KubeconfigError};
use crate::repository::ConnectionRepository;
use crate::service::{ExternalSource, InClusterSource};

/// Name of the synthesized in-cluster context
pub const IN_CLUSTER_CONTEXT: &str = "in-cluster";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("failed to import in-cluster kubeconfig: {0}")]
    InClusterUnavailable(String),

    #[error("no contexts detected in the in-cluster kubeconfig")]
    NoInClusterIdentity,

    #[error("unable to persist context \"{context}\": {reason}")]
    Persist { context: String, reason: String },

    #[error("invalid kubeconfig: {0}")]
    Malformed(#[from] KubeconfigError),
}

/// Application service for kubeconfig discovery
pub struct DiscoveryService {
    connections: Arc<dyn ConnectionRepository>,
    source: Arc<dyn ExternalSource>,
    in_cluster: Arc<dyn InClusterSource>,
    audit: AuditTrail,
    system_id: Uuid,
    kubeconfig_dir: PathBuf,
}

impl DiscoveryService {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        source: Arc<dyn ExternalSource>,
        in_cluster: Arc<dyn InClusterSource>,
        audit: AuditTrail,
        system_id: Uuid,
        kubeconfig_dir: PathBuf,
    ) -> Self {
        Self {
            connections,
            source,
            in_cluster,
            audit,
            system_id,
            kubeconfig_dir,
        }
    }

    pub fn kubeconfig_dir(&self) -> &Path {
        &self.kubeconfig_dir
    }

    /// `file://<kubeconfig_dir>/config`
    pub fn source_uri(&self) -> String {
        let path = self.kubeconfig_dir.join("config");
        Url::from_file_path(&path)
            .map(String::from)
            .unwrap_or_else(|_| format!("file://{}", path.display()))
    }

    /// Discover, persist and return contexts.
    ///
    /// From the kubeconfig file every context is persisted as
    /// `out_of_cluster`, skipping the ones storage rejects. Without the file,
    /// exactly one `in_cluster` context is synthesized or the call fails.
    pub async fn discover(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Vec<KubeContext>, DiscoveryError> {
        let uri = self.source_uri();
        let request = ExtractRequest {
            user_id,
            system_id: self.system_id,
        };
        let base = EventBuilder::new()
            .from_user(user_id)
            .from_system(self.system_id)
            .with_category("connection")
            .with_action("create")
            .with_severity(Severity::Informational);

        match self.source.read(&uri).await {
            Ok(raw) => self.discover_from_file(&uri, &raw, &request, token, base).await,
            Err(e) => {
                debug!(uri = %uri, error = %e, "[Discovery] No kubeconfig file, trying in-cluster");
                self.discover_in_cluster(&request, token, base).await
            }
        }
    }

    async fn discover_from_file(
        &self,
        uri: &str,
        raw: &[u8],
        request: &ExtractRequest,
        token: &str,
        base: EventBuilder,
    ) -> Result<Vec<KubeContext>, DiscoveryError> {
        let bundle = kubeconfig::normalize(raw, Some(&self.kubeconfig_dir));
        let mut metadata = Map::new();
        let extracted = kubeconfig::extract_contexts(
            &bundle,
            request,
            self.audit.broadcaster(),
            &mut metadata,
        )?;
        if extracted.is_empty() {
            info!(uri = %uri, "[Discovery] Kubeconfig has no contexts");
        }

        let mut contexts = Vec::with_capacity(extracted.len());
        for mut context in extracted {
            context.deployment_type = DeploymentType::OutOfCluster;
            match self.connections.save_context(token, &context).await {
                Ok(record) => {
                    context.connection_id = Some(record.id);
                    context.status = record.status;
                    metadata.insert(context.name.clone(), established(&context));
                    contexts.push(context);
                }
                Err(e) => {
                    warn!(
                        context = %context.name,
                        error = %e,
                        "[Discovery] Failed to save the context"
                    );
                    metadata.insert(context.name.clone(), unable(&context, &e.to_string()));
                }
            }
        }

        self.audit
            .record(
                base.with_description(format!("Kubernetes config imported from {}.", uri))
                    .with_metadata(metadata)
                    .build(),
            )
            .await;

        info!(
            uri = %uri,
            persisted = contexts.len(),
            "[Discovery] Imported kubeconfig"
        );
        Ok(contexts)
    }

    async fn discover_in_cluster(
        &self,
        request: &ExtractRequest,
        token: &str,
        base: EventBuilder,
    ) -> Result<Vec<KubeContext>, DiscoveryError> {
        let mut context = match self.in_cluster.context(IN_CLUSTER_CONTEXT, request).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                warn!("[Discovery] Nil context generated from in-cluster config");
                return Err(DiscoveryError::NoInClusterIdentity);
            }
            Err(e) => {
                warn!(error = %e, "[Discovery] Failed to generate in-cluster context");
                return Err(DiscoveryError::InClusterUnavailable(format!("{:#}", e)));
            }
        };
        context.deployment_type = DeploymentType::InCluster;

        let record = self
            .connections
            .save_context(token, &context)
            .await
            .map_err(|e| {
                warn!(error = %e, "[Discovery] Failed to save the in-cluster context");
                DiscoveryError::Persist {
                    context: context.name.clone(),
                    reason: e.to_string(),
                }
            })?;
        context.connection_id = Some(record.id);
        context.status = record.status;

        let mut metadata = Map::new();
        metadata.insert(IN_CLUSTER_CONTEXT.to_string(), established(&context));
        self.audit
            .record(
                base.acted_upon(record.id)
                    .with_description("Kubernetes config imported from in-cluster service account.")
                    .with_metadata(metadata)
                    .build(),
            )
            .await;

        info!(server = %context.server, "[Discovery] Registered in-cluster context");
        Ok(vec![context])
    }
}

fn established(context: &KubeContext) -> Value {
    json!({
        "description": format!(
            "Connection established with context \"{}\" at {}",
            context.name, context.server
        ),
        "context": context.redacted(),
    })
}

fn unable(context: &KubeContext, error: &str) -> Value {
    json!({
        "description": format!(
            "Unable to establish connection with context \"{}\" at {}",
            context.name, context.server
        ),
        "context": context.redacted(),
        "error": error,
    })
}
