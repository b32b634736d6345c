use thiserror::Error;

/// Errors returned by dream-loop operations.
///
/// Providers resolve expected backend states (failure, timeout, cancellation)
/// into a failed [`GenerationResult`](crate::GenerationResult) instead of
/// returning these. They surface from raw [`Transport`](crate::Transport)
/// calls and from provider construction.
#[derive(Error, Debug)]
pub enum DreamError {
    /// The backend returned a non-success HTTP status.
    #[error("Backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response from the backend was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// The submitted job graph was rejected with node-level errors.
    #[error("Workflow node errors: {0}")]
    NodeErrors(String),

    /// Timed out waiting for generation to complete.
    #[error("Generation timed out")]
    Timeout,

    /// The backend reported an execution error during generation.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The caller stopped waiting before a terminal state was observed.
    #[error("Generation cancelled")]
    Cancelled,

    /// Misconfiguration detected before any request was attempted.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DreamError {
    /// Whether a later poll may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        match self {
            DreamError::Network { .. } => true,
            DreamError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DreamError>;
