use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{DreamError, Result};
use crate::types::*;
use crate::workflow::Workflow;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8188";
pub const DEFAULT_CLIENT_ID: &str = "seedream-client";

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// The three remote calls the polling loop needs from a job-queue backend.
///
/// Implementations are stateless and never retry; callers decide.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL used to build `/view` links for produced media.
    fn api_base(&self) -> &str;

    /// Submit a job graph. The backend assigns the job id.
    async fn submit(&self, workflow: &Workflow) -> Result<JobHandle>;

    /// Snapshot of the shared queue.
    async fn queue_state(&self) -> Result<QueueSnapshot>;

    /// History record for a job, or `None` if it has not finished (or is unknown).
    async fn history(&self, job_id: &str) -> Result<Option<HistoryEntry>>;
}

/// HTTP transport for a ComfyUI server instance.
///
/// # Example
/// ```no_run
/// use dream_loop::{ComfyTransport, Transport};
///
/// # async fn example() -> dream_loop::Result<()> {
/// let transport = ComfyTransport::new("http://127.0.0.1:8188");
/// let queue = transport.queue_state().await?;
/// println!("{} running, {} pending", queue.running.len(), queue.pending.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ComfyTransport {
    http: Client,
    endpoint: String,
    client_id: String,
}

impl ComfyTransport {
    /// Create a new transport pointing at the given ComfyUI endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::new_with_client(endpoint, Client::new())
    }

    /// Create a transport that reuses an existing `reqwest::Client` and its
    /// connection pool.
    pub fn new_with_client(endpoint: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            endpoint: normalize(endpoint.into()),
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Set the client ID sent with every submitted job.
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the configured client ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn unreachable(&self, e: reqwest::Error) -> DreamError {
        DreamError::Network {
            context: format!(
                "Cannot connect to ComfyUI at {}; is the service running?",
                self.endpoint
            ),
            source: e,
        }
    }

    // ── Reachability ────────────────────────────────────────────────

    /// Cheap reachability check: a bounded GET on `/queue`.
    /// Any failure, including a non-success status, reads as unreachable.
    pub async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/queue", self.endpoint);
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "ComfyUI probe failed");
                false
            }
        }
    }

    async fn get_json(&self, url: &str, timeout: Duration, what: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DreamError::Http { status, body });
        }

        resp.json().await.map_err(|e| DreamError::Network {
            context: format!("Failed to parse ComfyUI {} response", what),
            source: e,
        })
    }
}

#[async_trait]
impl Transport for ComfyTransport {
    fn api_base(&self) -> &str {
        &self.endpoint
    }

    // ── Prompt ──────────────────────────────────────────────────────

    async fn submit(&self, workflow: &Workflow) -> Result<JobHandle> {
        let url = format!("{}/prompt", self.endpoint);
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": self.client_id,
        });

        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(DreamError::Http {
                status,
                body: body_text,
            });
        }

        let json: Value = resp.json().await.map_err(|e| DreamError::Network {
            context: "Failed to parse ComfyUI /prompt response".into(),
            source: e,
        })?;

        if let Some(errors) = json.get("node_errors").and_then(|e| e.as_object()) {
            if !errors.is_empty() {
                return Err(DreamError::NodeErrors(
                    serde_json::to_string_pretty(errors).unwrap_or_default(),
                ));
            }
        }

        let job_id = json
            .get("prompt_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| DreamError::InvalidResponse("Response missing prompt_id".into()))?;
        let queue_position = json.get("number").and_then(|v| v.as_i64()).unwrap_or(0);

        debug!(job_id = %job_id, queue_position, "Job submitted to ComfyUI");
        Ok(JobHandle {
            job_id,
            queue_position,
        })
    }

    // ── Queue ───────────────────────────────────────────────────────

    async fn queue_state(&self) -> Result<QueueSnapshot> {
        let url = format!("{}/queue", self.endpoint);
        let json = self.get_json(&url, Duration::from_secs(5), "queue").await?;
        Ok(QueueSnapshot::from_payload(&json))
    }

    // ── History ─────────────────────────────────────────────────────

    async fn history(&self, job_id: &str) -> Result<Option<HistoryEntry>> {
        let url = format!("{}/history/{}", self.endpoint, job_id);
        let json = self.get_json(&url, Duration::from_secs(10), "history").await?;
        Ok(HistoryEntry::from_payload(&json, job_id))
    }
}
