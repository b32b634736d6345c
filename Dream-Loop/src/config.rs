use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::client::{DEFAULT_CLIENT_ID, DEFAULT_ENDPOINT};
use crate::error::{DreamError, Result};
use crate::hosted::HostedConfig;
use crate::poll::PollConfig;
use crate::workflow::{GenerationParams, DEFAULT_CFG_SCALE, DEFAULT_MODEL, DEFAULT_STEPS};

/// Which backend serves generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    /// Probe ComfyUI per request, fall back to the mock.
    #[default]
    Auto,
    ComfyUi,
    Hosted,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = DreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(ProviderKind::Auto),
            "comfyui" | "comfy" => Ok(ProviderKind::ComfyUi),
            "hosted" | "seedream" => Ok(ProviderKind::Hosted),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(DreamError::Config(format!("Unknown provider '{}'", other))),
        }
    }
}

/// Runtime configuration.
///
/// Use [`DreamConfig::from_env()`] to read the recognised environment keys,
/// [`DreamConfig::builder()`] for programmatic construction, or
/// [`DreamConfig::default()`] for a local ComfyUI on port 8188.
#[derive(Debug, Clone)]
pub struct DreamConfig {
    /// ComfyUI base URL (`COMFYUI_API_URL`).
    pub comfy_url: String,
    /// Client id sent with submitted jobs (`COMFYUI_CLIENT_ID`).
    pub client_id: String,
    /// Checkpoint name (`SEEDREAM_MODEL_PATH`).
    pub model_path: String,
    pub width: u32,
    pub height: u32,
    /// Frames per loop, also the latent batch size (`SEEDREAM_DURATION`).
    pub frame_count: u32,
    pub provider: ProviderKind,
    pub hosted: HostedConfig,
    pub comfy_poll: PollConfig,
    /// Bound on the per-request reachability probe.
    pub probe_timeout: Duration,
    /// Simulated latency of the mock provider.
    pub mock_delay: Duration,
}

impl Default for DreamConfig {
    fn default() -> Self {
        Self {
            comfy_url: DEFAULT_ENDPOINT.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            model_path: DEFAULT_MODEL.to_string(),
            width: 1024,
            height: 576,
            frame_count: 15,
            provider: ProviderKind::Auto,
            hosted: HostedConfig::default(),
            comfy_poll: PollConfig::default(),
            probe_timeout: Duration::from_secs(3),
            mock_delay: Duration::from_secs(3),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %v, default = %default, "Invalid number in config, using default");
            default
        }),
    }
}

impl DreamConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> DreamConfigBuilder {
        DreamConfigBuilder::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Absent keys keep their defaults;
    /// unparseable numbers fall back to the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("DREAM_PROVIDER") {
            Some(v) => v.parse()?,
            None => defaults.provider,
        };

        let hosted = HostedConfig {
            api_url: get("SEEDREAM_API_URL").unwrap_or(defaults.hosted.api_url),
            api_key: get("SEEDREAM_API_KEY"),
            model: get("SEEDREAM_MODEL").unwrap_or(defaults.hosted.model),
            quality: get("SEEDREAM_QUALITY").unwrap_or(defaults.hosted.quality),
            style: get("SEEDREAM_STYLE"),
            poll: defaults.hosted.poll,
        };

        Ok(Self {
            comfy_url: get("COMFYUI_API_URL").unwrap_or(defaults.comfy_url),
            client_id: get("COMFYUI_CLIENT_ID").unwrap_or(defaults.client_id),
            model_path: get("SEEDREAM_MODEL_PATH").unwrap_or(defaults.model_path),
            width: parse_or("SEEDREAM_WIDTH", get("SEEDREAM_WIDTH"), defaults.width),
            height: parse_or("SEEDREAM_HEIGHT", get("SEEDREAM_HEIGHT"), defaults.height),
            frame_count: parse_or(
                "SEEDREAM_DURATION",
                get("SEEDREAM_DURATION"),
                defaults.frame_count,
            ),
            provider,
            hosted,
            comfy_poll: defaults.comfy_poll,
            probe_timeout: defaults.probe_timeout,
            mock_delay: defaults.mock_delay,
        })
    }

    /// Generation parameters for `prompt` under this configuration.
    pub fn generation_params(&self, prompt: impl Into<String>) -> GenerationParams {
        GenerationParams::new(prompt)
            .size(self.width, self.height)
            .frame_count(self.frame_count)
            .steps(DEFAULT_STEPS)
            .cfg_scale(DEFAULT_CFG_SCALE)
            .model_path(self.model_path.clone())
    }
}

/// Builder for [`DreamConfig`].
#[derive(Default)]
pub struct DreamConfigBuilder {
    config: DreamConfig,
}

impl DreamConfigBuilder {
    pub fn with_comfy_url(mut self, url: impl Into<String>) -> Self {
        self.config.comfy_url = url.into();
        self
    }

    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_id = id.into();
        self
    }

    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.config.model_path = path.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn with_frame_count(mut self, frames: u32) -> Self {
        self.config.frame_count = frames;
        self
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn with_hosted(mut self, hosted: HostedConfig) -> Self {
        self.config.hosted = hosted;
        self
    }

    /// Set the wait policy for the ComfyUI backend.
    pub fn with_comfy_poll(mut self, poll: PollConfig) -> Self {
        self.config.comfy_poll = poll;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn with_mock_delay(mut self, delay: Duration) -> Self {
        self.config.mock_delay = delay;
        self
    }

    /// Build the final [`DreamConfig`].
    pub fn build(self) -> DreamConfig {
        self.config
    }
}
