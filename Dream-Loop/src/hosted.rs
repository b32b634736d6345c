use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DreamConfig;
use crate::error::{DreamError, Result};
use crate::poll::{poll_until, PollConfig, PollOutcome};
use crate::provider::VideoProvider;
use crate::types::{GenerationResult, GenerationStatus};
use crate::workflow::GenerationParams;

pub const DEFAULT_HOSTED_URL: &str = "https://api.seedream.com/v1";
pub const DEFAULT_HOSTED_MODEL: &str = "dream-loop-v1";
pub const DEFAULT_HOSTED_QUALITY: &str = "high";

/// Connection settings for the hosted video service.
#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub quality: String,
    /// Optional style hint forwarded with every request.
    pub style: Option<String>,
    pub poll: PollConfig,
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_HOSTED_URL.to_string(),
            api_key: None,
            model: DEFAULT_HOSTED_MODEL.to_string(),
            quality: DEFAULT_HOSTED_QUALITY.to_string(),
            style: None,
            poll: PollConfig::new(Duration::from_secs(180), Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HostedRequest<'a> {
    prompt: &'a str,
    duration: u32,
    quality: &'a str,
    model: &'a str,
    #[serde(rename = "loop")]
    looped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
}

/// Clip details reported by the hosted service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedMetadata {
    pub duration: f64,
    pub resolution: String,
    pub file_size: u64,
}

/// Job record returned by both `/generate` and `/status/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedResponse {
    pub id: String,
    pub status: GenerationStatus,
    pub video_url: Option<String>,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub metadata: Option<HostedMetadata>,
}

impl HostedResponse {
    fn into_result(self) -> GenerationResult {
        match self.status {
            GenerationStatus::Completed => {
                if let Some(meta) = &self.metadata {
                    info!(
                        job_id = %self.id,
                        duration_secs = meta.duration,
                        resolution = %meta.resolution,
                        file_size = meta.file_size,
                        "Hosted clip ready"
                    );
                }
                GenerationResult::completed(self.id, self.video_url, Vec::new())
            }
            GenerationStatus::Failed => GenerationResult::failed(
                self.id,
                self.error
                    .unwrap_or_else(|| "Video generation failed".to_string()),
            ),
            GenerationStatus::Processing => {
                GenerationResult::processing(self.id, self.progress.unwrap_or(0.0))
            }
            GenerationStatus::Pending => GenerationResult::pending(self.id),
        }
    }
}

/// Provider for the hosted video-generation service.
///
/// The service renders the whole loop itself; this client submits the
/// prompt and polls the job status.
#[derive(Debug, Clone)]
pub struct HostedProvider {
    http: Client,
    api_url: String,
    api_key: String,
    config: HostedConfig,
}

impl HostedProvider {
    /// Fails with [`DreamError::Config`] when no API key is configured.
    pub fn new(config: HostedConfig) -> Result<Self> {
        Self::new_with_client(config, Client::new())
    }

    /// Like [`HostedProvider::new`], reusing an existing `reqwest::Client`.
    pub fn new_with_client(config: HostedConfig, http: Client) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DreamError::Config("SEEDREAM_API_KEY environment variable is required".into())
            })?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            config,
        })
    }

    pub fn from_config(config: &DreamConfig, http: Client) -> Result<Self> {
        Self::new_with_client(config.hosted.clone(), http)
    }

    /// Use a custom `reqwest::Client`.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn read_response(&self, resp: reqwest::Response, what: &str) -> Result<HostedResponse> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DreamError::Http { status, body });
        }
        resp.json().await.map_err(|e| DreamError::Network {
            context: format!("Failed to parse hosted service {} response", what),
            source: e,
        })
    }

    /// Start a generation. The returned record may already be completed.
    pub async fn submit(&self, params: &GenerationParams) -> Result<HostedResponse> {
        let body = HostedRequest {
            prompt: &params.prompt,
            duration: params.frame_count,
            quality: &self.config.quality,
            model: &self.config.model,
            looped: true,
            style: self.config.style.as_deref(),
        };

        let resp = self
            .http
            .post(format!("{}/generate", self.api_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| DreamError::Network {
                context: format!("Cannot reach hosted video service at {}", self.api_url),
                source: e,
            })?;

        self.read_response(resp, "generate").await
    }

    /// Fetch the current state of a job.
    pub async fn status(&self, job_id: &str) -> Result<HostedResponse> {
        let resp = self
            .http
            .get(format!("{}/status/{}", self.api_url, job_id))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| DreamError::Network {
                context: "Failed to fetch hosted job status".into(),
                source: e,
            })?;

        self.read_response(resp, "status").await
    }

    async fn wait_for_completion(&self, job_id: &str, cancel: &CancellationToken) -> GenerationResult {
        let poll = &self.config.poll;
        if let Err(e) = poll.validate() {
            return GenerationResult::failed(job_id, e.to_string());
        }

        let (outcome, polls) = poll_until(
            poll,
            cancel,
            move || self.status(job_id),
            |status: Result<HostedResponse>, _elapsed| match status {
                Ok(resp) if resp.status.is_terminal() => Some(resp.into_result()),
                Ok(resp) => {
                    debug!(job_id, status = ?resp.status, progress = ?resp.progress, "Hosted job in progress");
                    None
                }
                Err(e) => {
                    warn!(job_id, error = %e, "Hosted status check failed, will retry");
                    None
                }
            },
        )
        .await;

        match outcome {
            PollOutcome::Finished(result) => {
                info!(job_id, polls, status = ?result.status, "Hosted generation finished");
                result
            }
            PollOutcome::TimedOut => {
                warn!(job_id, polls, "Hosted generation timed out");
                GenerationResult::failed(job_id, "Video generation timed out")
            }
            PollOutcome::Cancelled => {
                GenerationResult::failed(job_id, DreamError::Cancelled.to_string())
            }
        }
    }
}

#[async_trait]
impl VideoProvider for HostedProvider {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn generate_and_wait(
        &self,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let initial = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DreamError::Cancelled),
            r = self.submit(params) => r,
        };

        match initial {
            Ok(resp) if resp.status.is_terminal() => resp.into_result(),
            Ok(resp) => {
                info!(job_id = %resp.id, "Hosted generation started");
                self.wait_for_completion(&resp.id, cancel).await
            }
            Err(e) => {
                warn!(error = %e, "Hosted generation request failed");
                GenerationResult::failed(Uuid::new_v4().to_string(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn provider_for(url: String) -> HostedProvider {
        HostedProvider::new(HostedConfig {
            api_url: url,
            api_key: Some("secret".into()),
            poll: PollConfig::new(Duration::from_secs(2), Duration::from_millis(20)),
            ..HostedConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = HostedProvider::new(HostedConfig::default()).unwrap_err();
        assert!(matches!(err, DreamError::Config(_)));

        let blank = HostedConfig {
            api_key: Some("  ".into()),
            ..HostedConfig::default()
        };
        assert!(HostedProvider::new(blank).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let body = HostedRequest {
            prompt: "p",
            duration: 15,
            quality: "high",
            model: "dream-loop-v1",
            looped: true,
            style: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["loop"], true);
        assert_eq!(json["duration"], 15);
        assert!(json.get("style").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let resp: HostedResponse = serde_json::from_str(
            r#"{"id": "j1", "status": "completed", "videoUrl": "https://cdn/x.mp4",
                "metadata": {"duration": 15, "resolution": "1920x1080", "fileSize": 5242880}}"#,
        )
        .unwrap();
        assert_eq!(resp.metadata.as_ref().unwrap().file_size, 5_242_880);
        let result = resp.into_result();
        assert!(result.is_completed());
        assert_eq!(result.media_url.as_deref(), Some("https://cdn/x.mp4"));
    }

    #[tokio::test]
    async fn test_immediate_completion() {
        let mut server = Server::new_async().await;
        let generate = server
            .mock("POST", "/generate")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({"loop": true, "duration": 15})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j1", "status": "completed", "videoUrl": "https://cdn/j1.mp4"}"#)
            .create_async()
            .await;

        let provider = provider_for(server.url());
        let result = provider
            .generate_and_wait(&GenerationParams::new("p"), &CancellationToken::new())
            .await;

        assert!(result.is_completed());
        assert_eq!(result.id, "j1");
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_polls_until_completed() {
        let mut server = Server::new_async().await;
        let _generate = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j2", "status": "processing", "progress": 0}"#)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/status/j2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j2", "status": "completed", "videoUrl": "https://cdn/j2.mp4"}"#)
            .create_async()
            .await;

        let provider = provider_for(server.url());
        let result = provider
            .generate_and_wait(&GenerationParams::new("p"), &CancellationToken::new())
            .await;

        assert!(result.is_completed());
        assert_eq!(result.media_url.as_deref(), Some("https://cdn/j2.mp4"));
    }

    #[tokio::test]
    async fn test_reported_failure() {
        let mut server = Server::new_async().await;
        let _generate = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j3", "status": "pending"}"#)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/status/j3")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j3", "status": "failed"}"#)
            .create_async()
            .await;

        let provider = provider_for(server.url());
        let result = provider
            .generate_and_wait(&GenerationParams::new("p"), &CancellationToken::new())
            .await;

        assert!(result.is_failed());
        assert_eq!(result.error.as_deref(), Some("Video generation failed"));
    }

    #[tokio::test]
    async fn test_hung_status_call_cut_at_deadline() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = HostedProvider::new(HostedConfig {
            api_url: format!("http://{}", addr),
            api_key: Some("secret".into()),
            poll: PollConfig::new(Duration::from_millis(300), Duration::from_millis(50)),
            ..HostedConfig::default()
        })
        .unwrap();
        let start = std::time::Instant::now();

        let result = provider
            .wait_for_completion("j5", &CancellationToken::new())
            .await;

        assert_eq!(result.error.as_deref(), Some("Video generation timed out"));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_times_out() {
        let mut server = Server::new_async().await;
        let _generate = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j4", "status": "processing"}"#)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/status/j4")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "j4", "status": "processing", "progress": 40}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let provider = HostedProvider::new(HostedConfig {
            api_url: server.url(),
            api_key: Some("secret".into()),
            poll: PollConfig::new(Duration::from_millis(200), Duration::from_millis(20)),
            ..HostedConfig::default()
        })
        .unwrap();
        let result = provider
            .generate_and_wait(&GenerationParams::new("p"), &CancellationToken::new())
            .await;

        assert!(result.is_failed());
        assert_eq!(result.error.as_deref(), Some("Video generation timed out"));
    }

    #[tokio::test]
    async fn test_unauthorized_submit() {
        let mut server = Server::new_async().await;
        let _generate = server
            .mock("POST", "/generate")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let provider = provider_for(server.url());
        let result = provider
            .generate_and_wait(&GenerationParams::new("p"), &CancellationToken::new())
            .await;

        assert!(result.is_failed());
        assert!(result.error.unwrap().contains("401"));
    }
}
