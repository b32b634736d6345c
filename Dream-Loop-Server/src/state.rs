use chrono::{DateTime, Utc};
use dream_loop::DreamConfig;
use std::sync::Arc;

/// Shared by every handler. Each request selects its own provider, all of
/// them on the one HTTP client so connections are pooled across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DreamConfig>,
    pub http: reqwest::Client,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: DreamConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            started_at: Utc::now(),
        }
    }
}
