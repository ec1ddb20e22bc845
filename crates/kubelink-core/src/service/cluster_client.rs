//! HTTP access to a cluster's API server through a context's credentials

use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::domain::{KubeContext, ServerVersion};

const CRD_PATH: &str = "/apis/apiextensions.k8s.io/v1/customresourcedefinitions";

/// Reads from a cluster on behalf of a context
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// `GET /version`
    async fn server_version(&self, context: &KubeContext) -> Result<ServerVersion>;

    /// Every CustomResourceDefinition the cluster serves, as raw JSON
    async fn custom_resource_definitions(&self, context: &KubeContext) -> Result<Vec<Value>>;
}

/// [`ClusterClient`] built on `reqwest`.
///
/// A new client is built per call from the context's cluster and auth
/// entries (CA bundle, client certificate, bearer token or basic auth).
pub struct HttpClusterClient {
    timeout: Duration,
}

impl HttpClusterClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client_for(&self, context: &KubeContext) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("kubelink/", env!("CARGO_PKG_VERSION")));

        if let Some(ca) = string_field(&context.cluster, "certificate-authority-data") {
            let pem = BASE64
                .decode(ca)
                .context("certificate-authority-data is not valid base64")?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .context("certificate-authority-data is not a PEM certificate")?;
            builder = builder.add_root_certificate(cert);
        }

        if context
            .cluster
            .get("insecure-skip-tls-verify")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let (Some(cert), Some(key)) = (
            string_field(&context.auth, "client-certificate-data"),
            string_field(&context.auth, "client-key-data"),
        ) {
            let mut pem = BASE64
                .decode(cert)
                .context("client-certificate-data is not valid base64")?;
            pem.push(b'\n');
            pem.extend(
                BASE64
                    .decode(key)
                    .context("client-key-data is not valid base64")?,
            );
            let identity =
                reqwest::Identity::from_pem(&pem).context("invalid client certificate or key")?;
            builder = builder.identity(identity);
        }

        builder.build().context("Failed to build cluster HTTP client")
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        context: &KubeContext,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = string_field(&context.auth, "token") {
            return request.bearer_auth(token);
        }
        match string_field(&context.auth, "username") {
            Some(user) => request.basic_auth(user, string_field(&context.auth, "password")),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, context: &KubeContext, path: &str) -> Result<T> {
        let url = format!("{}{}", context.server.trim_end_matches('/'), path);
        debug!(context = %context.name, url = %url, "[ClusterClient] GET");

        let client = self.client_for(context)?;
        let response = self
            .authorize(client.get(&url), context)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach cluster at {}", context.server))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Cluster returned status {} for {}", status, path);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

impl Default for HttpClusterClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn server_version(&self, context: &KubeContext) -> Result<ServerVersion> {
        self.get_json(context, "/version").await
    }

    async fn custom_resource_definitions(&self, context: &KubeContext) -> Result<Vec<Value>> {
        let list: Value = self.get_json(context, CRD_PATH).await?;
        Ok(match list.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        })
    }
}

fn string_field<'a>(entry: &'a Value, field: &str) -> Option<&'a str> {
    entry.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}
