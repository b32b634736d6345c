//! # dream-loop
//!
//! Turn three "dream elements" into a short looping video rendered by a
//! diffusion backend.
//!
//! Generation goes through a [`VideoProvider`]. Three are provided:
//!
//! - [`ComfyProvider`]: builds a job graph, submits it to a
//!   [ComfyUI](https://github.com/comfyanonymous/ComfyUI) queue, polls
//!   `/history` and `/queue` until the job finishes, then extracts `/view`
//!   URLs from the outputs
//! - [`HostedProvider`]: a hosted video service with its own job status API
//! - [`MockProvider`]: returns a sample clip after a delay
//!
//! [`select_provider`] picks one per request, probing ComfyUI and falling
//! back to the mock when it does not answer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dream_loop::{optimize_elements, loop_prompt, select_provider, DreamConfig, DreamElements, VideoProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> dream_loop::Result<()> {
//! let config = DreamConfig::from_env()?;
//! let elements = optimize_elements(&DreamElements::new("a cat", "galaxy", "the waterfall"));
//! let params = config.generation_params(loop_prompt(&elements));
//!
//! let provider = select_provider(&config).await?;
//! let result = provider.generate_and_wait(&params, &CancellationToken::new()).await;
//!
//! match result.media_url {
//!     Some(url) => println!("Loop ready: {}", url),
//!     None => eprintln!("Generation failed: {:?}", result.error),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod hosted;
pub mod poll;
pub mod prompt;
pub mod provider;
pub mod types;
pub mod workflow;

pub use client::{ComfyTransport, Transport};
pub use config::{DreamConfig, DreamConfigBuilder, ProviderKind};
pub use error::{DreamError, Result};
pub use extract::{extract, view_url, ExtractedMedia};
pub use hosted::{HostedConfig, HostedProvider};
pub use poll::{await_result, PollConfig};
pub use prompt::{
    enhanced_prompt, loop_prompt, optimize_element, optimize_elements, prompt_variations,
    transition_prompts, DreamElements,
};
pub use provider::{
    select_provider, select_provider_with_client, ComfyProvider, MockProvider, VideoProvider,
};
pub use types::{
    GenerationResult, GenerationStatus, HistoryEntry, HistoryStatus, JobHandle, MediaRef,
    QueueItem, QueuePosition, QueueSnapshot,
};
pub use workflow::{GenerationParams, Step, StepInput, StepRef, Workflow};
