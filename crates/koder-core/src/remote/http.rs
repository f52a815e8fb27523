//! HTTP client for a `koder-server` remote tier.
//!
//! # Usage
//!
//! ```rust,no_run
//! use koder_core::config::RemoteConfig;
//! use koder_core::remote::{HttpRemote, RemoteStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = HttpRemote::new(&RemoteConfig {
//!     url: Some("http://127.0.0.1:7878".into()),
//!     ..Default::default()
//! })?;
//! let results = remote.search_code("login").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{DocumentQuery, RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;
use crate::types::SearchMatch;

/// Remote store reached over HTTP
#[derive(Clone)]
pub struct HttpRemote {
    /// Base URL without trailing slash
    base_url: String,
    /// Bearer token for authentication
    token: Option<String>,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpRemote {
    /// Create a client from remote configuration
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| RemoteError::unavailable("no remote URL configured"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("Remote request: {} {}", method, url);

        let mut req = self.client.request(method, &url);
        if let Some(ref token) = self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> RemoteResult<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::unavailable(format!("HTTP request failed: {}", e)))?;

        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(resp);
        }

        let message = resp.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> RemoteResult<T> {
        let resp = self.send(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: "not found".to_string(),
            });
        }
        resp.json()
            .await
            .map_err(|e| RemoteError::decode(e.to_string()))
    }

    /// Check that the server is reachable and accepts our token
    pub async fn health(&self) -> RemoteResult<()> {
        let _: serde_json::Value = self.json(self.request(Method::GET, "/health")).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn store_blob(&self, key: &str, bytes: &[u8]) -> RemoteResult<()> {
        let req = self
            .request(Method::PUT, &format!("/api/blobs/{}", key))
            .body(bytes.to_vec());
        let _: serde_json::Value = self.json(req).await?;
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        let resp = self
            .send(self.request(Method::GET, &format!("/api/blobs/{}", key)))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::unavailable(format!("failed to read blob body: {}", e)))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn store_document(&self, collection: &str, document: &serde_json::Value) -> RemoteResult<()> {
        let req = self
            .request(Method::PUT, &format!("/api/collections/{}/documents", collection))
            .json(document);
        let _: serde_json::Value = self.json(req).await?;
        Ok(())
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        let req = self
            .request(Method::POST, &format!("/api/collections/{}/query", collection))
            .json(query);
        self.json(req).await
    }

    async fn search_code(&self, query: &str) -> RemoteResult<Vec<SearchMatch>> {
        let req = self
            .request(Method::GET, "/api/search")
            .query(&[("q", query)]);
        self.json(req).await
    }
}
