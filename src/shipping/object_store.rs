// src/shipping/object_store.rs
//! Remote object store backends
//!
//! The uploader only needs "put this blob under this key, tell me if it
//! landed". Two backends implement that:
//!
//! - `HttpObjectStore`: plain HTTP `PUT <endpoint>/<key>` against an
//!   S3-compatible path-style gateway
//! - `LocalObjectStore`: a directory tree, for offline capture and tests

use crate::utils::config::User;
use crate::utils::errors::{PipelineError, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Write-once blob store
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`; `Ok` only once the store confirmed it
    fn put<'a>(&'a self, key: &'a str, body: Bytes) -> BoxFuture<'a, Result<()>>;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// Pick a backend from a destination string
///
/// `http://host[:port]/bucket` selects HTTP; `file:///dir` or any other
/// string is treated as a local directory.
pub fn from_destination(destination: &str, user: &User) -> Result<Box<dyn ObjectStore>> {
    let destination = destination.trim();

    if destination.starts_with("http://") {
        let store = HttpObjectStore::new(destination, user.api_key.clone())?;
        return Ok(Box::new(store));
    }

    if destination.starts_with("https://") {
        return Err(PipelineError::ConfigError(format!(
            "TLS destinations are not supported, use an http:// gateway: {}",
            destination
        )));
    }

    let root = destination.strip_prefix("file://").unwrap_or(destination);
    if root.is_empty() {
        return Err(PipelineError::ConfigError("destination cannot be empty".to_string()));
    }
    Ok(Box::new(LocalObjectStore::new(root)))
}

/// HTTP PUT object store
pub struct HttpObjectStore {
    endpoint: String,
    api_key: Option<String>,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpObjectStore {
    /// `endpoint` is the bucket base URL, e.g. `http://127.0.0.1:9000/records-bucket`
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        endpoint
            .parse::<Uri>()
            .map_err(|e| PipelineError::ConfigError(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }

    fn object_uri(&self, key: &str) -> Result<Uri> {
        format!("{}/{}", self.endpoint, key.trim_start_matches('/'))
            .parse::<Uri>()
            .map_err(|e| PipelineError::Upload(format!("Invalid object key {}: {}", key, e)))
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<()> {
        let uri = self.object_uri(key)?;
        let len = body.len();

        let mut builder = Request::builder()
            .method(Method::PUT)
            .uri(uri.clone())
            .header(hyper::header::CONTENT_TYPE, "text/csv")
            .header(hyper::header::CONTENT_LENGTH, len);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("x-api-key", api_key);
        }

        let request = builder
            .body(Full::new(body))
            .map_err(|e| PipelineError::Upload(format!("Request build error: {}", e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| PipelineError::Upload(format!("PUT {} failed: {}", uri, e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("PUT {} ({} bytes) -> {}", uri, len, status);
            return Ok(());
        }

        let detail = match response.into_body().collect().await {
            Ok(collected) => String::from_utf8_lossy(&collected.to_bytes())
                .chars()
                .take(200)
                .collect::<String>(),
            Err(_) => String::new(),
        };

        Err(PipelineError::Upload(format!(
            "PUT {} returned {} {}",
            uri, status, detail
        )))
    }
}

impl ObjectStore for HttpObjectStore {
    fn put<'a>(&'a self, key: &'a str, body: Bytes) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.put_object(key, body))
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Object store backed by a local directory
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<()> {
        let path = self.root.join(key.trim_start_matches('/'));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::Upload(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::write(&path, &body).await.map_err(|e| {
            PipelineError::Upload(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!("Stored {} bytes at {}", body.len(), path.display());
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn put<'a>(&'a self, key: &'a str, body: Bytes) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.put_object(key, body))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
