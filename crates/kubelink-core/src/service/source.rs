//! Byte sources for discovery

use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

/// Fetches raw bytes from a URI
#[async_trait]
pub trait ExternalSource: Send + Sync {
    async fn read(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Reads `file://` URIs from disk and `http(s)://` URIs over the network
pub struct UriSource {
    http_client: reqwest::Client,
}

impl UriSource {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ExternalSource for UriSource {
    async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let url = Url::parse(uri).with_context(|| format!("Invalid source URI: {}", uri))?;
        debug!(uri = %uri, "[Source] Reading");

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow::anyhow!("Not a local file path: {}", uri))?;
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))
            }
            "http" | "https" => {
                let response = self
                    .http_client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch {}", uri))?;
                if !response.status().is_success() {
                    anyhow::bail!("Fetching {} returned status {}", uri, response.status());
                }
                Ok(response.bytes().await?.to_vec())
            }
            other => anyhow::bail!("Unsupported source scheme: {}", other),
        }
    }
}
