use thiserror::Error;

/// Core error types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The handle does not name a retained stream (never begun, or reset).
    #[error("unknown stream: {0}")]
    UnknownStream(String),
    /// Invalid session id.
    #[error("invalid session id: {0}")]
    InvalidSession(#[from] scxq2_canonical::ValidationError),
    /// Frame projection or encoding failed.
    #[error("journal error: {0}")]
    Journal(#[from] scxq2_journal::JournalError),
    /// JSON projection failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
