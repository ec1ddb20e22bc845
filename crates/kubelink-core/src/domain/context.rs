use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{ConnectionStatus, DeploymentType};

/// Cluster fields that carry key or certificate material
const SECRET_CLUSTER_FIELDS: &[&str] = &["certificate-authority-data", "certificate-authority"];

/// One named cluster-access definition extracted from a kubeconfig.
///
/// Credentials (`auth`, `kubeconfig`) are never serialized into API
/// responses; storage persists them separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubeContext {
    /// Stable identifier derived from server, cluster, user and context name
    pub id: String,
    /// Context name as it appears in the kubeconfig
    pub name: String,
    /// API server endpoint
    pub server: String,
    /// Cluster entry (`server`, `certificate-authority-data`, ...)
    #[serde(default)]
    pub cluster: Value,
    /// User entry (token, client certificate, exec plugin, ...)
    #[serde(skip_serializing, default)]
    pub auth: Value,
    /// Default namespace for the context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Flattened single-context kubeconfig used to reach the cluster
    #[serde(skip_serializing, default)]
    pub kubeconfig: Vec<u8>,
    /// System (control plane instance) that owns this context
    pub system_id: Uuid,
    /// User that uploaded or discovered the context
    pub created_by: String,
    /// Assigned once the context has been persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<Uuid>,
    #[serde(default)]
    pub deployment_type: DeploymentType,
    #[serde(default)]
    pub status: ConnectionStatus,
}

impl KubeContext {
    /// Compute the stable context id
    pub fn compute_id(server: &str, cluster_name: &str, user_name: &str, name: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [server, cluster_name, user_name, name] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Snapshot safe to attach to audit events: no auth, no kubeconfig,
    /// no certificate data.
    pub fn redacted(&self) -> Value {
        let mut cluster = self.cluster.clone();
        if let Some(map) = cluster.as_object_mut() {
            for field in SECRET_CLUSTER_FIELDS {
                map.remove(*field);
            }
        }

        json!({
            "id": self.id,
            "name": self.name,
            "server": self.server,
            "cluster": cluster,
            "namespace": self.namespace,
            "system_id": self.system_id,
            "created_by": self.created_by,
            "connection_id": self.connection_id,
            "deployment_type": self.deployment_type,
            "status": self.status,
        })
    }
}

/// Kubernetes API server version as reported by `/version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerVersion {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
    pub git_version: String,
    #[serde(default)]
    pub platform: String,
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.git_version)
    }
}
