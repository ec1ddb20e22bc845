//! Dependency Injection Container
//!
//! Everything the server needs from outside the application layer:
//! storage, the artifact store, the model template and the optional
//! collaborator overrides used by tests.

use std::sync::Arc;

use anyhow::{Context, Result};
use kubelink_core::{
    ArtifactStore, ClusterClient, ComponentGenerator, ComponentRegistry, ConnectionRepository,
    EventRepository, ExternalSource, FsArtifactStore, InClusterSource, ModelMetadataCache,
};
use kubelink_storage::{
    Database, FieldEncryptor, FileKeyProvider, MasterKeyProvider, SqliteComponentRegistry,
    SqliteConnectionRepository, SqliteEventRepository, StaticKeyProvider,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::ServerConfig;

/// Dependency container for the server
#[derive(Clone)]
pub struct ServerDependencies {
    // Repositories (Data Layer)
    pub connection_repo: Arc<dyn ConnectionRepository>,
    pub event_repo: Arc<dyn EventRepository>,
    pub component_registry: Arc<dyn ComponentRegistry>,
    pub artifact_store: Arc<dyn ArtifactStore>,

    /// Model metadata template, loaded once
    pub model_cache: Arc<ModelMetadataCache>,

    // Collaborator overrides; production defaults when `None`
    pub cluster_client: Option<Arc<dyn ClusterClient>>,
    pub generator: Option<Arc<dyn ComponentGenerator>>,
    pub external_source: Option<Arc<dyn ExternalSource>>,
    pub in_cluster_source: Option<Arc<dyn InClusterSource>>,
}

impl ServerDependencies {
    /// Wire SQLite storage in `config.data_dir`.
    ///
    /// The master key comes from `config.master_key` when set, otherwise
    /// from (or into) the key file next to the database.
    pub fn open(config: &ServerConfig) -> Result<Self> {
        let master_key = match &config.master_key {
            Some(hex_key) => StaticKeyProvider::from_hex(hex_key)
                .context("KUBELINK_MASTER_KEY is not a valid key")?
                .get_or_create_key()?,
            None => FileKeyProvider::new(config.master_key_path()).get_or_create_key()?,
        };
        let encryptor = Arc::new(FieldEncryptor::new(&master_key)?);

        let database = Database::open(&config.database_path())?;
        info!(path = ?config.database_path(), "[Dependencies] Database ready");

        let model_cache = match &config.model_template {
            Some(path) => ModelMetadataCache::load(path),
            None => ModelMetadataCache::default(),
        };

        Ok(Self::sqlite(
            Arc::new(Mutex::new(database)),
            encryptor,
            Arc::new(FsArtifactStore::new(config.artifacts_dir())),
        )
        .with_model_cache(model_cache))
    }

    /// SQLite repositories over an already opened database
    pub fn sqlite(
        database: Arc<Mutex<Database>>,
        encryptor: Arc<FieldEncryptor>,
        artifact_store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            connection_repo: Arc::new(SqliteConnectionRepository::new(
                database.clone(),
                encryptor,
            )),
            event_repo: Arc::new(SqliteEventRepository::new(database.clone())),
            component_registry: Arc::new(SqliteComponentRegistry::new(database)),
            artifact_store,
            model_cache: Arc::new(ModelMetadataCache::default()),
            cluster_client: None,
            generator: None,
            external_source: None,
            in_cluster_source: None,
        }
    }

    pub fn with_model_cache(mut self, cache: ModelMetadataCache) -> Self {
        self.model_cache = Arc::new(cache);
        self
    }

    pub fn with_cluster_client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.cluster_client = Some(client);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ComponentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_external_source(mut self, source: Arc<dyn ExternalSource>) -> Self {
        self.external_source = Some(source);
        self
    }

    pub fn with_in_cluster_source(mut self, source: Arc<dyn InClusterSource>) -> Self {
        self.in_cluster_source = Some(source);
        self
    }
}
