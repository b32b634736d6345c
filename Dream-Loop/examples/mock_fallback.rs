//! Select a provider the way the server does: probe ComfyUI, fall back to
//! the mock when it is down.
//!
//! ```sh
//! COMFYUI_API_URL=http://127.0.0.1:9 cargo run --example mock_fallback
//! ```

use dream_loop::{
    loop_prompt, optimize_elements, select_provider, DreamConfig, DreamElements, VideoProvider,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = DreamConfig::from_env()?;
    let provider = select_provider(&config).await?;
    println!("Using provider: {}", provider.name());

    let elements = optimize_elements(&DreamElements::new("an owl", "clocks", "rain"));
    let params = config.generation_params(loop_prompt(&elements));
    let result = provider
        .generate_and_wait(&params, &CancellationToken::new())
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
