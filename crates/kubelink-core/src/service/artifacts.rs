//! Filesystem artifact store for component SVGs

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::ComponentDefinition;
use crate::repository::ArtifactStore;

/// (metadata key, file suffix)
const SVG_FIELDS: &[(&str, &str)] = &[
    ("svgColor", "color"),
    ("svgWhite", "white"),
    ("svgComplete", "complete"),
];

/// Writes inline SVGs under `<root>/<model>/<kind>-<variant>.svg` and points
/// the metadata at the written file (relative to `root`).
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist_artifacts(&self, component: &mut ComponentDefinition) -> Result<()> {
        let model = sanitize(if component.model.name.is_empty() {
            "unknown"
        } else {
            &component.model.name
        });
        let kind = sanitize(&component.kind.to_lowercase());

        for (key, variant) in SVG_FIELDS {
            let Some(svg) = component.metadata.get(*key).and_then(Value::as_str) else {
                continue;
            };
            if !svg.trim_start().starts_with("<svg") {
                continue;
            }

            let relative = format!("{}/{}-{}.svg", model, kind, variant);
            let path = self.root.join(&relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&path, svg.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            debug!(path = %path.display(), "[Artifacts] Wrote SVG");
            component
                .metadata
                .insert(key.to_string(), Value::String(relative));
        }
        Ok(())
    }
}

fn sanitize(segment: &str) -> String {
    let cleaned = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect::<String>();
    match cleaned.trim_start_matches('.') {
        "" => "unknown".to_string(),
        rest => rest.to_string(),
    }
}
