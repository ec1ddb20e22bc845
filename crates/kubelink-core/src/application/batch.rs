//! Per-pass outcome aggregation

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::domain::{ConnectionStatus, KubeContext};

/// Result bucket of one context in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Newly registered (`discovered`)
    Registered,
    Connected,
    Ignored,
    Errored,
}

impl Classification {
    pub fn from_status(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Discovered => Self::Registered,
            ConnectionStatus::Connected => Self::Connected,
            ConnectionStatus::Ignored => Self::Ignored,
            ConnectionStatus::Errored => Self::Errored,
        }
    }

    /// Audit description for a context that was persisted with this outcome
    pub fn describe(&self, context: &KubeContext) -> String {
        match self {
            Self::Registered => format!(
                "Connection registered with kubernetes context \"{}\" at {}.",
                context.name, context.server
            ),
            Self::Connected => format!(
                "Connection already exists with Kubernetes context \"{}\" at {}",
                context.name, context.server
            ),
            Self::Ignored => format!(
                "Kubernetes context \"{}\" is set to ignored state.",
                context.name
            ),
            Self::Errored => format!(
                "Connection with Kubernetes context \"{}\" at {} is in errored state.",
                context.name, context.server
            ),
        }
    }
}

/// Contexts of one submission, split by outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveContextsResponse {
    pub registered_contexts: Vec<KubeContext>,
    pub connected_contexts: Vec<KubeContext>,
    pub ignored_contexts: Vec<KubeContext>,
    pub errored_contexts: Vec<KubeContext>,
}

impl SaveContextsResponse {
    pub fn len(&self) -> usize {
        self.registered_contexts.len()
            + self.connected_contexts.len()
            + self.ignored_contexts.len()
            + self.errored_contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket(&mut self, classification: Classification) -> &mut Vec<KubeContext> {
        match classification {
            Classification::Registered => &mut self.registered_contexts,
            Classification::Connected => &mut self.connected_contexts,
            Classification::Ignored => &mut self.ignored_contexts,
            Classification::Errored => &mut self.errored_contexts,
        }
    }
}

/// What a finished pass hands back: the response, the metadata for the one
/// audit event, and whether observers need a topology refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub response: SaveContextsResponse,
    pub metadata: Map<String, Value>,
    pub registered_count: usize,
}

impl BatchOutcome {
    pub fn should_notify(&self) -> bool {
        self.registered_count > 0
    }
}

/// Accumulates per-context outcomes during a pass.
///
/// Seeded with the extractor's discovery metadata; a recorded outcome
/// replaces the discovery entry of the same context name.
#[derive(Debug, Default)]
pub struct BatchAggregator {
    response: SaveContextsResponse,
    metadata: Map<String, Value>,
    registered_count: usize,
}

impl BatchAggregator {
    pub fn new(discovery: Map<String, Value>) -> Self {
        Self {
            response: SaveContextsResponse::default(),
            metadata: discovery,
            registered_count: 0,
        }
    }

    pub fn record(
        &mut self,
        context: KubeContext,
        classification: Classification,
        description: String,
        error: Option<String>,
    ) {
        let mut entry = json!({
            "description": description,
            "context": context.redacted(),
        });
        if let Some(error) = error {
            entry["error"] = Value::String(error);
        }
        self.metadata.insert(context.name.clone(), entry);

        if classification == Classification::Registered {
            self.registered_count += 1;
        }
        self.response.bucket(classification).push(context);
    }

    pub fn finish(self) -> BatchOutcome {
        BatchOutcome {
            response: self.response,
            metadata: self.metadata,
            registered_count: self.registered_count,
        }
    }
}
