use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use dream_loop::{loop_prompt, optimize_elements, select_provider_with_client};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::middleware::{cors_layer, trace_layer};
use crate::models::{GenerateResponse, HealthResponse};
use crate::state::AppState;
use crate::validation::validate_elements;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate_handler))
        .route("/health", get(health_handler))
        .layer(cors_layer())
        .layer(trace_layer())
        .with_state(state)
}

/// POST /generate: three elements in, one looping video out.
async fn generate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let body: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::Internal(e.to_string()))?;
    let elements = optimize_elements(&validate_elements(&body)?);
    let prompt = loop_prompt(&elements);
    info!(prompt = %prompt, elements = ?elements.as_array(), "Generated prompt");

    let params = state.config.generation_params(prompt.clone());
    let provider = select_provider_with_client(&state.config, state.http.clone()).await?;

    // Dropping this future (client went away) cancels the wait.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let result = provider.generate_and_wait(&params, &cancel).await;

    if result.is_failed() {
        let error = result
            .error
            .unwrap_or_else(|| "Video generation failed".to_string());
        warn!(job_id = %result.id, provider = provider.name(), error = %error, "Generation failed");
        return Err(ApiError::Generation(error));
    }

    Ok(Json(GenerateResponse {
        success: true,
        video_url: result.media_url,
        prompt,
        elements,
        images: result.auxiliary_media,
        job_id: result.id,
        workflow_params: params,
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: format!("{:?}", state.config.provider).to_lowercase(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}
