//! Context extraction

use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Kubeconfig, KubeconfigError, NamedContext};
use crate::domain::{ConnectionStatus, DeploymentType, EventBuilder, KubeContext, Severity};
use crate::event_bus::EventBroadcaster;

/// Who is asking, and on behalf of which system
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest {
    pub user_id: Uuid,
    pub system_id: Uuid,
}

/// Turn a (normalized) kubeconfig into one [`KubeContext`] per usable context.
///
/// Writes one discovery entry per context into `metadata`, keyed by context
/// name. Contexts that can't be resolved are skipped: their entry carries
/// the error and a warning is published to the requesting user.
pub fn extract_contexts(
    bundle: &[u8],
    request: &ExtractRequest,
    broadcaster: &EventBroadcaster,
    metadata: &mut Map<String, Value>,
) -> Result<Vec<KubeContext>, KubeconfigError> {
    let config = Kubeconfig::from_bytes(bundle)?;
    let mut contexts = Vec::with_capacity(config.contexts.len());

    for named in &config.contexts {
        match resolve(&config, named, request) {
            Ok(context) => {
                metadata.insert(
                    context.name.clone(),
                    json!({
                        "description": format!(
                            "K8S context \"{}\" discovered with cluster at {}",
                            context.name, context.server
                        ),
                        "context": context.redacted(),
                    }),
                );
                contexts.push(context);
            }
            Err(reason) => {
                warn!(
                    context = %named.name,
                    reason = %reason,
                    "[Kubeconfig] Skipping unusable context"
                );
                let description = format!("Unable to read K8S context \"{}\"", named.name);
                metadata.insert(
                    named.name.clone(),
                    json!({ "description": description, "error": reason }),
                );
                broadcaster.publish(
                    request.user_id,
                    EventBuilder::new()
                        .from_user(request.user_id)
                        .from_system(request.system_id)
                        .with_category("connection")
                        .with_action("discovered")
                        .with_severity(Severity::Warning)
                        .with_description(format!("{}: {}", description, reason))
                        .build(),
                );
            }
        }
    }

    debug!(
        found = config.contexts.len(),
        usable = contexts.len(),
        "[Kubeconfig] Extracted contexts"
    );
    Ok(contexts)
}

fn resolve(
    config: &Kubeconfig,
    named: &NamedContext,
    request: &ExtractRequest,
) -> Result<KubeContext, String> {
    let entry = named
        .context
        .as_ref()
        .ok_or_else(|| "context has no definition".to_string())?;

    let cluster = config
        .cluster(&entry.cluster)
        .ok_or_else(|| format!("cluster \"{}\" not found", entry.cluster))?;

    let user = if entry.user.is_empty() {
        None
    } else {
        Some(
            config
                .user(&entry.user)
                .ok_or_else(|| format!("user \"{}\" not found", entry.user))?,
        )
    };

    let server = cluster
        .cluster
        .get("server")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("cluster \"{}\" has no server", entry.cluster))?
        .to_string();

    let kubeconfig = Kubeconfig::single_context(named, cluster, user)
        .to_bytes()
        .map_err(|e| e.to_string())?;

    Ok(KubeContext {
        id: KubeContext::compute_id(&server, &cluster.name, &entry.user, &named.name),
        name: named.name.clone(),
        server,
        cluster: cluster.cluster.clone(),
        auth: user.map(|u| u.user.clone()).unwrap_or_else(|| json!({})),
        namespace: entry.namespace.clone(),
        kubeconfig,
        system_id: request.system_id,
        created_by: request.user_id.to_string(),
        connection_id: None,
        deployment_type: DeploymentType::OutOfCluster,
        status: ConnectionStatus::Discovered,
    })
}
