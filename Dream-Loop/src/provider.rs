use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{ComfyTransport, Transport};
use crate::config::{DreamConfig, ProviderKind};
use crate::error::{DreamError, Result};
use crate::hosted::HostedProvider;
use crate::poll::{await_result, PollConfig};
use crate::types::GenerationResult;
use crate::workflow::GenerationParams;

/// Sample clip returned by [`MockProvider`].
pub const MOCK_MEDIA_URL: &str = "https://www.w3schools.com/html/mov_bbb.mp4";

/// Something that can turn generation parameters into a finished video.
///
/// Implementations never return errors for backend states: failures,
/// timeouts and cancellation all come back as a failed [`GenerationResult`].
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Short identifier for logs and responses.
    fn name(&self) -> &str;

    /// Submit a generation and wait for its terminal state.
    async fn generate_and_wait(
        &self,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> GenerationResult;
}

/// Provider backed by a ComfyUI-style job queue.
#[derive(Debug, Clone)]
pub struct ComfyProvider<T = ComfyTransport> {
    transport: T,
    poll: PollConfig,
}

impl<T: Transport> ComfyProvider<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Like [`VideoProvider::generate_and_wait`], handing every intermediate
    /// snapshot to `on_update`.
    pub async fn generate_with_updates<F>(
        &self,
        params: &GenerationParams,
        cancel: &CancellationToken,
        on_update: F,
    ) -> GenerationResult
    where
        F: FnMut(&GenerationResult) + Send,
    {
        let (workflow, seed) = params.build();
        if let Err(e) = workflow.validate() {
            return GenerationResult::failed(Uuid::new_v4().to_string(), e.to_string());
        }

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DreamError::Cancelled),
            r = self.transport.submit(&workflow) => r,
        };

        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Failed to submit generation");
                return GenerationResult::failed(Uuid::new_v4().to_string(), e.to_string());
            }
        };

        info!(
            job_id = %handle.job_id,
            seed,
            queue_position = handle.queue_position,
            frames = params.frame_count,
            "Generation queued"
        );
        await_result(&self.transport, &handle.job_id, &self.poll, cancel, on_update).await
    }
}

#[async_trait]
impl<T: Transport> VideoProvider for ComfyProvider<T> {
    fn name(&self) -> &str {
        "comfyui"
    }

    async fn generate_and_wait(
        &self,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        self.generate_with_updates(params, cancel, |_| {}).await
    }
}

/// Offline stand-in: waits, then returns a fixed sample clip.
#[derive(Debug, Clone)]
pub struct MockProvider {
    delay: Duration,
    media_url: String,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            media_url: MOCK_MEDIA_URL.to_string(),
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulated generation latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = url.into();
        self
    }
}

#[async_trait]
impl VideoProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_and_wait(
        &self,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> GenerationResult {
        let id = format!("mock-{}", chrono::Utc::now().timestamp_millis());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return GenerationResult::failed(id, DreamError::Cancelled.to_string());
            }
            _ = tokio::time::sleep(self.delay) => {}
        }
        info!(id = %id, prompt_len = params.prompt.len(), "Mock generation completed");
        GenerationResult::completed(id, Some(self.media_url.clone()), Vec::new())
    }
}

/// Pick the provider for one request.
///
/// `Auto` probes the job-queue backend and falls back to [`MockProvider`]
/// when it does not answer. Only construction problems (such as a missing
/// hosted-service key) return an error. Builds a fresh HTTP client; callers
/// selecting per request should hold one and use [`select_provider_with_client`].
pub async fn select_provider(config: &DreamConfig) -> Result<Arc<dyn VideoProvider>> {
    select_provider_with_client(config, Client::new()).await
}

/// [`select_provider`] over a shared `reqwest::Client`, so repeated
/// selections keep one connection pool.
pub async fn select_provider_with_client(
    config: &DreamConfig,
    http: Client,
) -> Result<Arc<dyn VideoProvider>> {
    let provider: Arc<dyn VideoProvider> = match config.provider {
        ProviderKind::Mock => Arc::new(mock_provider(config)),
        ProviderKind::ComfyUi => Arc::new(
            ComfyProvider::new(comfy_transport(config, http))
                .with_poll_config(config.comfy_poll.clone()),
        ),
        ProviderKind::Hosted => Arc::new(HostedProvider::from_config(config, http)?),
        ProviderKind::Auto => {
            let transport = comfy_transport(config, http);
            if transport.probe(config.probe_timeout).await {
                Arc::new(ComfyProvider::new(transport).with_poll_config(config.comfy_poll.clone()))
            } else {
                warn!(
                    endpoint = %config.comfy_url,
                    "ComfyUI not available, using mock provider"
                );
                Arc::new(mock_provider(config))
            }
        }
    };
    info!(provider = provider.name(), "Selected video provider");
    Ok(provider)
}

fn comfy_transport(config: &DreamConfig, http: Client) -> ComfyTransport {
    ComfyTransport::new_with_client(config.comfy_url.clone(), http)
        .with_client_id(config.client_id.clone())
}

fn mock_provider(config: &DreamConfig) -> MockProvider {
    MockProvider::new().with_delay(config.mock_delay)
}
