use dream_loop::{DreamElements, GenerationParams};
use serde::Serialize;

/// Body of a successful `POST /generate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub prompt: String,
    /// The optimized elements the prompt was built from.
    pub elements: DreamElements,
    pub images: Vec<String>,
    pub job_id: String,
    pub workflow_params: GenerationParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub uptime_secs: i64,
}
