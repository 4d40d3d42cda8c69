use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreatmapError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {message}")]
    Transport { message: String, timeout: bool },

    #[error("PubTator returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML write error: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Seed provider error: {0}")]
    Llm(String),
}

impl TreatmapError {
    /// Whether a retry has a chance of succeeding.
    /// Transport faults and 429/500/502/503/504 are transient; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            TreatmapError::Transport { .. } => true,
            TreatmapError::Status { status, .. } => is_retryable_status(*status),
            TreatmapError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// HTTP statuses the PubTator client retries with backoff.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub type Result<T> = std::result::Result<T, TreatmapError>;
