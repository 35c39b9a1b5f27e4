//! Cluster clients.
//!
//! The core never talks HTTP itself: it builds [`Request`]s and hands them to
//! an [`IndexAdminClient`]. Two implementations ship with the crate:
//!
//! - [`HttpAdminClient`]: sends requests over HTTP with `reqwest`.
//! - [`InMemoryCluster`](crate::memory::InMemoryCluster): answers requests
//!   from memory, for tests and dry runs.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::work::{Method, Request, Response};
use quarry_core::{Error, Result};

/// Executes requests against a cluster.
///
/// Implementations return non-2xx answers as a [`Response`]; only transport
/// failures are errors.
#[async_trait]
pub trait IndexAdminClient: Send + Sync {
    /// Send one request and wait for the answer.
    async fn execute(&self, request: Request) -> Result<Response>;

    /// A short name for diagnostics.
    fn name(&self) -> &str;
}

/// Sends requests to a cluster over HTTP, rotating through the configured
/// hosts.
#[derive(Debug)]
pub struct HttpAdminClient {
    http: reqwest::Client,
    hosts: Vec<String>,
    next_host: AtomicUsize,
}

impl HttpAdminClient {
    /// A client for `hosts` (`http://localhost:9200`, ...) with a request
    /// timeout.
    pub fn new(hosts: Vec<String>, timeout: Duration) -> Result<Self> {
        if hosts.is_empty() {
            return Err(Error::config("At least one cluster host must be configured"));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport_with_source("Failed to build the HTTP client", e))?;
        Ok(Self {
            http,
            hosts: hosts
                .into_iter()
                .map(|h| h.trim_end_matches('/').to_string())
                .collect(),
            next_host: AtomicUsize::new(0),
        })
    }

    /// The configured hosts.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    fn host(&self) -> &str {
        let index = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[index]
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl IndexAdminClient for HttpAdminClient {
    async fn execute(&self, request: Request) -> Result<Response> {
        let host = self.host();
        let url = format!("{host}{}", request.path_and_query());
        log::debug!("Sending {request} to {host}");

        let mut builder = self.http.request(http_method(request.method), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport_with_source(format!("{request} failed"), e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            Error::transport_with_source(format!("{request}: failed to read the response"), e)
        })?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(Response::new(status, body))
    }

    fn name(&self) -> &str {
        "http"
    }
}
