/// Errors raised by a [`ProgressStore`](super::ProgressStore) backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document changed since it was read
    #[error("concurrent modification of {0}")]
    Conflict(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("document encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Only compare-and-swap conflicts are worth retrying with fresh data
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
