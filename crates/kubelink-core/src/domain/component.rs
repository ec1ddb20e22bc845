//! Component definitions derived from cluster APIs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form component metadata
pub type Metadata = Map<String, Value>;

/// Model a component belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModelReference {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub category: String,
}

/// A resource-schema artifact registered for later reuse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: Uuid,
    pub kind: String,
    pub api_version: String,
    #[serde(default)]
    pub display_name: String,
    pub model: ModelReference,
    #[serde(default)]
    pub metadata: Metadata,
    /// JSON schema of the resource, serialized
    #[serde(default)]
    pub schema: String,
}

impl ComponentDefinition {
    pub fn new(kind: impl Into<String>, api_version: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            id: Uuid::new_v4(),
            display_name: kind.clone(),
            kind,
            api_version: api_version.into(),
            model: ModelReference::default(),
            metadata: Metadata::new(),
            schema: String::new(),
        }
    }

    pub fn with_model(mut self, model: ModelReference) -> Self {
        self.model = model;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Registry lookup key
    pub fn filter(&self) -> ComponentFilter {
        ComponentFilter::new(&self.kind, &self.api_version)
    }
}

/// Registry lookup by (kind, apiVersion)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentFilter {
    pub kind: String,
    pub api_version: String,
}

impl ComponentFilter {
    pub fn new(kind: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            api_version: api_version.into(),
        }
    }
}

/// Namespace under which components are registered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// API family, e.g. "kubernetes"
    pub hostname: String,
    /// Which context the registration came from
    pub scope: String,
}

impl Host {
    pub fn new(hostname: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            scope: scope.into(),
        }
    }
}

/// Copy keys from `source` that `target` does not already have.
pub fn merge_missing(target: &mut Metadata, source: &Metadata) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Copy every key from `source`, overwriting what `target` has.
pub fn merge_preferring(target: &mut Metadata, source: &Metadata) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}
