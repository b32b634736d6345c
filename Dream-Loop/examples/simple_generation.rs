//! Generate one dream loop on a local ComfyUI and print progress.
//!
//! Requires a running ComfyUI instance at http://127.0.0.1:8188 with the
//! `seedream-v1.safetensors` checkpoint (or set SEEDREAM_MODEL_PATH).
//!
//! ```sh
//! cargo run --example simple_generation
//! ```

use dream_loop::{
    loop_prompt, optimize_elements, ComfyProvider, ComfyTransport, DreamConfig, DreamElements,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = DreamConfig::from_env()?;
    let transport = ComfyTransport::new(&config.comfy_url).with_client_id(&config.client_id);

    if !transport.probe(Duration::from_secs(3)).await {
        eprintln!("ComfyUI is not responding at {}", config.comfy_url);
        return Ok(());
    }
    println!("ComfyUI is online");

    let elements = optimize_elements(&DreamElements::new("a jellyfish", "the moon", "lanterns"));
    let params = config.generation_params(loop_prompt(&elements));
    println!("Prompt: {}", params.prompt);

    let provider = ComfyProvider::new(transport).with_poll_config(config.comfy_poll.clone());
    let result = provider
        .generate_with_updates(&params, &CancellationToken::new(), |snapshot| {
            println!("{:?} ({:.0}%)", snapshot.status, snapshot.progress.unwrap_or(0.0));
        })
        .await;

    match (result.media_url, result.error) {
        (Some(url), _) => {
            println!("Loop: {}", url);
            for frame in &result.auxiliary_media {
                println!("Frame: {}", frame);
            }
        }
        (None, Some(error)) => eprintln!("Generation failed: {}", error),
        (None, None) => eprintln!("Generation finished without an animated output"),
    }

    Ok(())
}
