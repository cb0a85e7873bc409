use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    /// The archive refused further requests; callers must stop, not retry.
    #[error("request quota exhausted (HTTP {status})")]
    QuotaExhausted { status: u16 },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }
}
