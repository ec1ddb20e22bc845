//! Kubeconfig handling
//!
//! - [`normalize`]: best-effort flatten + minify of a raw kubeconfig
//! - [`extract_contexts`]: turn a kubeconfig into candidate [`KubeContext`]s
//!
//! Only the parts of the kubeconfig schema Kubelink needs are typed; cluster
//! and user entries are carried as JSON values so exec plugins, auth
//! providers and future fields survive a round trip untouched.
//!
//! [`KubeContext`]: crate::domain::KubeContext

mod extract;
mod normalize;

pub use extract::{extract_contexts, ExtractRequest};
pub use normalize::{normalize, try_normalize};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading a kubeconfig
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigError {
    #[error("kubeconfig is empty")]
    Empty,

    #[error("kubeconfig is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("kubeconfig is not valid YAML: {0}")]
    InvalidYaml(String),

    #[error("document kind \"{0}\" is not a kubeconfig")]
    NotAKubeconfig(String),

    #[error("failed to serialize kubeconfig: {0}")]
    Serialize(String),

    #[error("failed to read referenced file {path}: {reason}")]
    ReferencedFile { path: String, reason: String },
}

/// A kubeconfig document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub contexts: Vec<NamedContext>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub users: Vec<NamedUser>,
    #[serde(rename = "current-context", default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Kubeconfig {
    /// Parse a kubeconfig from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KubeconfigError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| KubeconfigError::InvalidUtf8(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(KubeconfigError::Empty);
        }

        let config: Kubeconfig = serde_yaml::from_str(text)
            .map_err(|e| KubeconfigError::InvalidYaml(e.to_string()))?;

        match config.kind.as_deref() {
            None | Some("Config") => Ok(config),
            Some(other) => Err(KubeconfigError::NotAKubeconfig(other.to_string())),
        }
    }

    /// Serialize back to YAML bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, KubeconfigError> {
        serde_yaml::to_string(self)
            .map(String::into_bytes)
            .map_err(|e| KubeconfigError::Serialize(e.to_string()))
    }

    pub fn cluster(&self, name: &str) -> Option<&NamedCluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&NamedUser> {
        self.users.iter().find(|u| u.name == name)
    }

    /// Build a kubeconfig holding just one context and what it references
    pub fn single_context(
        context: &NamedContext,
        cluster: &NamedCluster,
        user: Option<&NamedUser>,
    ) -> Self {
        Self {
            api_version: Some("v1".to_string()),
            kind: Some("Config".to_string()),
            clusters: vec![cluster.clone()],
            contexts: vec![context.clone()],
            users: user.cloned().into_iter().collect(),
            current_context: Some(context.name.clone()),
            preferences: None,
        }
    }
}
