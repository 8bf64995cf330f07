use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Rejected locally; surfaced to the initiating caller and never broadcast.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("no local node matched the anchor")]
    ResolutionMiss,
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("no content nodes to anchor against")]
    EmptyContent,
    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SyncError::InvalidOperation(reason.into())
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Codec(err) => SyncError::Codec(err),
            other => SyncError::TransportUnavailable(other.to_string()),
        }
    }
}
