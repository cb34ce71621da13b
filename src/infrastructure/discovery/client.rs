//! HTTP client for the DPI daemon's Discovery Service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client as ReqwestClient, Response, header};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::errors::from_status;
use super::streaming::SseStreamParser;
use crate::domain::errors::ServiceError;
use crate::domain::models::{DiscoverySession, ServiceConfig, StartRequest, StartResponse};
use crate::domain::ports::{DiscoveryService, SessionStream};

/// Configuration for the Discovery Service client
#[derive(Debug, Clone)]
pub struct DiscoveryClientConfig {
    /// Daemon base URL, e.g. `http://127.0.0.1:8080`
    pub base_url: String,

    /// Route prefix in front of `/discovery`
    pub api_prefix: String,

    /// Per-request timeout in seconds (does not apply to the event stream)
    pub timeout_secs: u64,
}

impl Default for DiscoveryClientConfig {
    fn default() -> Self {
        Self::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for DiscoveryClientConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_prefix: config.api_prefix.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

/// reqwest-backed `DiscoveryService`
///
/// Routes, relative to `{base_url}{api_prefix}`:
/// - `POST /discovery` starts a search
/// - `GET /discovery/status?id=` fetches a snapshot
/// - `DELETE /discovery/cancel?id=` cancels
/// - `GET /discovery/events?id=` streams snapshots as server-sent events
pub struct HttpDiscoveryClient {
    /// Pooled client for request/response calls
    http_client: ReqwestClient,

    /// Client without a total timeout for the event stream
    stream_client: ReqwestClient,

    /// `{base_url}{api_prefix}/discovery` without a trailing slash
    endpoint: String,
}

impl HttpDiscoveryClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(DiscoveryClientConfig::default())
    }

    /// Create a client from the `service` config section
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::with_config(DiscoveryClientConfig::from(config))
    }

    /// Create a client with custom configuration
    pub fn with_config(config: DiscoveryClientConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let http_client = ReqwestClient::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        let stream_client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build streaming HTTP client")?;

        Ok(Self {
            http_client,
            stream_client,
            endpoint: join_endpoint(&config.base_url, &config.api_prefix),
        })
    }

    /// Base URL of the discovery routes
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.endpoint, route)
    }

    /// Turn a non-success status into a `ServiceError`
    async fn check(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(from_status(status, body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn join_endpoint(base_url: &str, api_prefix: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = api_prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{base}/discovery")
    } else {
        format!("{base}/{prefix}/discovery")
    }
}

#[async_trait]
impl DiscoveryService for HttpDiscoveryClient {
    #[instrument(skip(self, request), fields(discovery_target = request.target.as_str()))]
    async fn start(&self, request: &StartRequest) -> Result<StartResponse, ServiceError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let started: StartResponse = Self::decode(response).await?;
        debug!(session_id = %started.id, estimated_tests = ?started.estimated_tests, "discovery accepted");
        Ok(started)
    }

    #[instrument(skip(self))]
    async fn status(&self, session_id: &str) -> Result<DiscoverySession, ServiceError> {
        let response = self
            .http_client
            .get(self.url("/status"))
            .query(&[("id", session_id)])
            .send()
            .await?;

        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn cancel(&self, session_id: &str) -> Result<(), ServiceError> {
        let response = self
            .http_client
            .delete(self.url("/cancel"))
            .query(&[("id", session_id)])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, session_id: &str) -> Result<SessionStream, ServiceError> {
        let response = self
            .stream_client
            .get(self.url("/events"))
            .query(&[("id", session_id)])
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let response = Self::check(response).await?;
        let is_event_stream = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));
        if !is_event_stream {
            return Err(ServiceError::Unsupported(
                "event endpoint did not return an event stream".to_string(),
            ));
        }

        Ok(SseStreamParser::new(response.bytes_stream()).boxed())
    }
}
