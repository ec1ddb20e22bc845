//! HTTP server tests
//!
//! Routes exercised through the router with `tower::ServiceExt::oneshot`,
//! plus one real listener for the server lifecycle.

mod lifecycle;
mod routes;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use kubelink_core::{ClusterClient, ComponentGenerator, ExternalSource, FsArtifactStore, InClusterSource};
use kubelink_server::{KubelinkServer, ServerConfig, ServerDependencies};
use serde_json::Value;
use tempfile::TempDir;
use tests::db::TestDatabase;
use tests::mocks::{
    MockClusterClient, MockComponentGenerator, MockExternalSource, MockInClusterSource,
};
use uuid::Uuid;

pub const TOKEN: &str = "provider-token";

/// A server over a temporary SQLite database and mock collaborators
pub struct TestServer {
    pub server: KubelinkServer,
    pub user_id: Uuid,
    _db: TestDatabase,
    _data_dir: TempDir,
}

pub struct TestServerOptions {
    pub cluster_client: Arc<dyn ClusterClient>,
    pub generator: Arc<dyn ComponentGenerator>,
    pub external_source: Arc<dyn ExternalSource>,
    pub in_cluster_source: Arc<dyn InClusterSource>,
    pub discover_on_startup: bool,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            cluster_client: Arc::new(MockClusterClient::reachable("v1.30.0")),
            generator: Arc::new(MockComponentGenerator::default()),
            external_source: Arc::new(MockExternalSource::missing()),
            in_cluster_source: Arc::new(MockInClusterSource::not_in_cluster()),
            discover_on_startup: false,
        }
    }
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_options(TestServerOptions::default())
    }

    pub fn with_options(options: TestServerOptions) -> Self {
        let data_dir = TempDir::new().expect("Failed to create data dir");
        let db = TestDatabase::new();

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: data_dir.path().to_path_buf(),
            kubeconfig_dir: data_dir.path().join(".kube"),
            system_id: Some(Uuid::new_v4()),
            discover_on_startup: options.discover_on_startup,
            provider_token: TOKEN.to_string(),
            ..ServerConfig::default()
        };

        let deps = ServerDependencies::sqlite(
            db.db.clone(),
            db.encryptor.clone(),
            Arc::new(FsArtifactStore::new(config.artifacts_dir())),
        )
        .with_cluster_client(options.cluster_client)
        .with_generator(options.generator)
        .with_external_source(options.external_source)
        .with_in_cluster_source(options.in_cluster_source);

        let server = KubelinkServer::new(config, deps).expect("Failed to create server");
        Self {
            server,
            user_id: Uuid::new_v4(),
            _db: db,
            _data_dir: data_dir,
        }
    }

    /// Request builder carrying this test's user and token
    pub fn authorized(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", TOKEN))
            .header("X-User-Id", self.user_id.to_string())
    }
}

/// Raw multipart body with a single file field
pub fn multipart(field: &str, content: &str) -> (String, Body) {
    let boundary = "kubelink-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"config\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{boundary}--\r\n"
    );
    (
        format!("multipart/form-data; boundary={}", boundary),
        Body::from(body),
    )
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
