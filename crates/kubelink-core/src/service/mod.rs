//! Collaborators that reach outside the process
//!
//! Files, HTTP sources, the cluster API server and the artifact directory.
//! Application services only see the traits.

mod artifacts;
mod cluster_client;
mod generator;
mod in_cluster;
mod model_cache;
mod source;

pub use artifacts::FsArtifactStore;
pub use cluster_client::{ClusterClient, HttpClusterClient};
pub use generator::{ClusterComponentGenerator, ComponentGenerator};
pub use in_cluster::{InClusterSource, ServiceAccountSource, SERVICE_ACCOUNT_DIR};
pub use model_cache::ModelMetadataCache;
pub use source::{ExternalSource, UriSource};
