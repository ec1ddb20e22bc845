//! Flatten + minify

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use tracing::debug;

use super::{Kubeconfig, KubeconfigError};

/// (file reference field, inline field) pairs on cluster entries
const CLUSTER_FILE_FIELDS: &[(&str, &str)] =
    &[("certificate-authority", "certificate-authority-data")];

/// (file reference field, inline field) pairs on user entries
const USER_FILE_FIELDS: &[(&str, &str)] = &[
    ("client-certificate", "client-certificate-data"),
    ("client-key", "client-key-data"),
];

/// Best-effort normalization of a raw kubeconfig.
///
/// Returns the raw bytes unchanged when the bundle can't be normalized.
/// `base_dir` is where relative file references are resolved; with `None`
/// file references are left in place.
pub fn normalize(raw: &[u8], base_dir: Option<&Path>) -> Vec<u8> {
    match try_normalize(raw, base_dir) {
        Ok(normalized) => normalized,
        Err(e) => {
            debug!(error = %e, "[Kubeconfig] Normalization failed, using raw bundle");
            raw.to_vec()
        }
    }
}

/// Flatten file references into inline data and drop clusters and users
/// no context refers to.
pub fn try_normalize(raw: &[u8], base_dir: Option<&Path>) -> Result<Vec<u8>, KubeconfigError> {
    let mut config = Kubeconfig::from_bytes(raw)?;

    if let Some(base) = base_dir {
        for cluster in &mut config.clusters {
            inline_files(&mut cluster.cluster, CLUSTER_FILE_FIELDS, base)?;
        }
        for user in &mut config.users {
            inline_files(&mut user.user, USER_FILE_FIELDS, base)?;
            inline_token_file(&mut user.user, base)?;
        }
    }

    minify(&mut config);
    config.to_bytes()
}

fn minify(config: &mut Kubeconfig) {
    let (clusters, users): (HashSet<String>, HashSet<String>) = config
        .contexts
        .iter()
        .filter_map(|c| c.context.as_ref())
        .map(|c| (c.cluster.clone(), c.user.clone()))
        .unzip();

    config.clusters.retain(|c| clusters.contains(&c.name));
    config.users.retain(|u| users.contains(&u.name));
    config.preferences = None;
}

fn inline_files(
    entry: &mut Value,
    fields: &[(&str, &str)],
    base: &Path,
) -> Result<(), KubeconfigError> {
    let Some(map) = entry.as_object_mut() else {
        return Ok(());
    };

    for (file_field, data_field) in fields {
        let Some(path) = map.get(*file_field).and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        if !map.contains_key(*data_field) {
            let bytes = read_reference(&path, base)?;
            map.insert(data_field.to_string(), Value::String(BASE64.encode(bytes)));
        }
        map.remove(*file_field);
    }
    Ok(())
}

fn inline_token_file(entry: &mut Value, base: &Path) -> Result<(), KubeconfigError> {
    let Some(map) = entry.as_object_mut() else {
        return Ok(());
    };
    let Some(path) = map.get("tokenFile").and_then(Value::as_str).map(str::to_string) else {
        return Ok(());
    };

    if !map.contains_key("token") {
        let bytes = read_reference(&path, base)?;
        let token = String::from_utf8_lossy(&bytes).trim().to_string();
        map.insert("token".to_string(), Value::String(token));
    }
    map.remove("tokenFile");
    Ok(())
}

fn read_reference(path: &str, base: &Path) -> Result<Vec<u8>, KubeconfigError> {
    let resolved = resolve(path, base);
    std::fs::read(&resolved).map_err(|e| KubeconfigError::ReferencedFile {
        path: resolved.display().to_string(),
        reason: e.to_string(),
    })
}

fn resolve(path: &str, base: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
