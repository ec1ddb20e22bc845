//! Component generation from a cluster's API schema

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::ClusterClient;
use crate::domain::{ComponentDefinition, KubeContext, Metadata, ModelReference};

/// Derives component definitions for a context
#[async_trait]
pub trait ComponentGenerator: Send + Sync {
    async fn generate(&self, context: &KubeContext) -> Result<Vec<ComponentDefinition>>;
}

/// Generates one component per served version of every
/// CustomResourceDefinition in the cluster.
pub struct ClusterComponentGenerator {
    client: Arc<dyn ClusterClient>,
}

impl ClusterComponentGenerator {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComponentGenerator for ClusterComponentGenerator {
    async fn generate(&self, context: &KubeContext) -> Result<Vec<ComponentDefinition>> {
        let version = match self.client.server_version(context).await {
            Ok(version) => version.git_version,
            Err(e) => {
                warn!(context = %context.name, error = %e, "[Generator] Server version unavailable");
                String::new()
            }
        };
        let model = kubernetes_model(version);

        let crds = self.client.custom_resource_definitions(context).await?;
        let components: Vec<_> = crds
            .iter()
            .flat_map(|crd| components_from_crd(crd, &model))
            .collect();

        debug!(
            context = %context.name,
            crds = crds.len(),
            components = components.len(),
            "[Generator] Generated components"
        );
        Ok(components)
    }
}

fn kubernetes_model(version: String) -> ModelReference {
    ModelReference {
        name: "kubernetes".to_string(),
        version,
        display_name: "Kubernetes".to_string(),
        category: "Orchestration & Management".to_string(),
    }
}

/// One definition per served version; CRDs missing a group or kind yield nothing
pub(crate) fn components_from_crd(crd: &Value, model: &ModelReference) -> Vec<ComponentDefinition> {
    let spec = &crd["spec"];
    let (Some(group), Some(kind)) = (spec["group"].as_str(), spec["names"]["kind"].as_str()) else {
        return Vec::new();
    };
    let namespaced = spec["scope"].as_str() == Some("Namespaced");

    let Some(versions) = spec["versions"].as_array() else {
        return Vec::new();
    };

    versions
        .iter()
        .filter(|v| v["served"].as_bool().unwrap_or(true))
        .filter_map(|v| v["name"].as_str().map(|name| (name, v)))
        .map(|(version, entry)| {
            let mut metadata = Metadata::new();
            metadata.insert("isNamespaced".to_string(), json!(namespaced));
            metadata.insert("group".to_string(), json!(group));

            let schema = entry["schema"]["openAPIV3Schema"].clone();
            ComponentDefinition::new(kind, format!("{}/{}", group, version))
                .with_model(model.clone())
                .with_metadata(metadata)
                .with_schema(if schema.is_null() {
                    String::new()
                } else {
                    schema.to_string()
                })
        })
        .collect()
}
