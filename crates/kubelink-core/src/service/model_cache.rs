//! Default model metadata for generated components

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::Metadata;

/// Model-level metadata applied to components the registry has never seen.
///
/// Loaded once at startup and never mutated; share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMetadataCache {
    metadata: Metadata,
}

impl ModelMetadataCache {
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }

    /// Load from a JSON object template.
    ///
    /// A missing or invalid template yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "[ModelCache] Template unreadable");
                return Self::default();
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(metadata)) => {
                info!(
                    path = %path.display(),
                    keys = metadata.len(),
                    "[ModelCache] Loaded model template"
                );
                Self { metadata }
            }
            Ok(_) => {
                warn!(path = %path.display(), "[ModelCache] Template is not a JSON object");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "[ModelCache] Template is not valid JSON");
                Self::default()
            }
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}
