//! dream-loop-server: HTTP front end for dream-loop generation.
//!
//! ```text
//! POST    /generate   {"elements": ["cat", "galaxy", "waterfall"]}
//! OPTIONS /generate
//! GET     /health
//! ```
//!
//! Backend settings come from the environment (`COMFYUI_API_URL`,
//! `SEEDREAM_*`, `DREAM_PROVIDER`); see [`dream_loop::DreamConfig::from_env`].

mod error;
mod middleware;
mod models;
mod routes;
mod state;
mod validation;

use anyhow::Context;
use clap::Parser;
use dream_loop::DreamConfig;
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::routes::create_router;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "dream-loop-server", version, about)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "DREAM_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "DREAM_PORT", default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = DreamConfig::from_env().context("Failed to read configuration")?;
    info!(
        provider = ?config.provider,
        comfy_url = %config.comfy_url,
        size = %format!("{}x{}", config.width, config.height),
        frames = config.frame_count,
        "Configuration loaded"
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, create_router(AppState::new(config)))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
