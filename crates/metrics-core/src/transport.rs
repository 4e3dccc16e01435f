use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::AgentConfig;
use crate::snapshot::SystemMetrics;

/// Overall per-request deadline enforced by the HTTP client
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to marshal metrics: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to send metrics: {0}")]
    Request(#[source] reqwest::Error),
    #[error("metrics endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("transport is closed")]
    Closed,
}

/// Body of POST /api/v1/metrics/ingest
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload<'a> {
    pub host_id: &'a str,
    pub hostname: &'a str,
    pub metrics: &'a SystemMetrics,
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a BTreeMap<String, String>,
}

fn no_tags(tags: &&BTreeMap<String, String>) -> bool {
    tags.is_empty()
}

/// Posts snapshots to the ingestion endpoint. One request per `send`, no
/// retries; identity and tags are fixed at construction.
pub struct HttpTransport {
    client: Option<reqwest::Client>,
    url: String,
    api_key: String,
    host_id: String,
    hostname: String,
    tags: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn new(config: &AgentConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self {
            client: Some(client),
            url: config.ingest_url(),
            api_key: config.api_key.clone(),
            host_id: config.host_id.clone(),
            hostname: config.hostname.clone(),
            tags: config.tags.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Serialize the envelope for `metrics`
    pub fn encode(&self, metrics: &SystemMetrics) -> Result<Vec<u8>, TransportError> {
        let payload = MetricsPayload {
            host_id: &self.host_id,
            hostname: &self.hostname,
            metrics,
            tags: &self.tags,
        };
        Ok(serde_json::to_vec(&payload)?)
    }

    /// POST one snapshot. Statuses >= 400 fail with the response body in the
    /// error; the body of a successful response is ignored.
    ///
    /// Dropping the returned future aborts the request.
    pub async fn send(&self, metrics: &SystemMetrics) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::Closed)?;
        let body = self.encode(metrics)?;

        debug!("posting {} bytes to {}", body.len(), self.url);
        let resp = client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .body(body)
            .send()
            .await
            .map_err(TransportError::Request)?;

        let status = resp.status();
        if status.as_u16() >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Drop the pooled client and its idle connections. Safe to call twice.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("http transport closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }
}
