//! The process' own in-cluster identity

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::{ConnectionStatus, DeploymentType, KubeContext};
use crate::kubeconfig::{
    ContextEntry, ExtractRequest, Kubeconfig, NamedCluster, NamedContext, NamedUser,
};

/// Where Kubernetes mounts the pod's service account
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Synthesizes a context for the cluster this process runs in
#[async_trait]
pub trait InClusterSource: Send + Sync {
    /// `Ok(None)` when the process is not running inside a cluster
    async fn context(&self, name: &str, request: &ExtractRequest) -> Result<Option<KubeContext>>;
}

/// Builds the in-cluster context from the mounted service account and the
/// `KUBERNETES_SERVICE_HOST` / `KUBERNETES_SERVICE_PORT` environment.
pub struct ServiceAccountSource {
    root: PathBuf,
    host: Option<String>,
    port: Option<String>,
}

impl ServiceAccountSource {
    pub fn new(root: impl Into<PathBuf>, host: Option<String>, port: Option<String>) -> Self {
        Self {
            root: root.into(),
            host,
            port,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            SERVICE_ACCOUNT_DIR,
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
        )
    }

    fn server(&self) -> Option<String> {
        let host = self.host.as_deref().filter(|h| !h.is_empty())?;
        let port = self.port.as_deref().filter(|p| !p.is_empty())?;
        Some(if host.contains(':') {
            format!("https://[{}]:{}", host, port)
        } else {
            format!("https://{}:{}", host, port)
        })
    }

    async fn read_optional(&self, file: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl InClusterSource for ServiceAccountSource {
    async fn context(&self, name: &str, request: &ExtractRequest) -> Result<Option<KubeContext>> {
        let Some(server) = self.server() else {
            debug!("[InCluster] KUBERNETES_SERVICE_HOST/PORT not set");
            return Ok(None);
        };

        let token = self
            .read_optional("token")
            .await?
            .map(|t| String::from_utf8_lossy(&t).trim().to_string())
            .filter(|t| !t.is_empty())
            .with_context(|| {
                format!("No service account token under {}", self.root.display())
            })?;
        let ca = self.read_optional("ca.crt").await?;
        let namespace = self
            .read_optional("namespace")
            .await?
            .map(|n| String::from_utf8_lossy(&n).trim().to_string())
            .filter(|n| !n.is_empty());

        let mut cluster = json!({ "server": server });
        if let Some(ca) = &ca {
            cluster["certificate-authority-data"] = Value::String(BASE64.encode(ca));
        }
        let auth = json!({ "token": token });

        let named_cluster = NamedCluster {
            name: name.to_string(),
            cluster: cluster.clone(),
        };
        let named_user = NamedUser {
            name: name.to_string(),
            user: auth.clone(),
        };
        let named_context = NamedContext {
            name: name.to_string(),
            context: Some(ContextEntry {
                cluster: name.to_string(),
                user: name.to_string(),
                namespace: namespace.clone(),
            }),
        };
        let kubeconfig =
            Kubeconfig::single_context(&named_context, &named_cluster, Some(&named_user))
                .to_bytes()?;

        Ok(Some(KubeContext {
            id: KubeContext::compute_id(&server, name, name, name),
            name: name.to_string(),
            server,
            cluster,
            auth,
            namespace,
            kubeconfig,
            system_id: request.system_id,
            created_by: request.user_id.to_string(),
            connection_id: None,
            deployment_type: DeploymentType::InCluster,
            status: ConnectionStatus::Discovered,
        }))
    }
}
