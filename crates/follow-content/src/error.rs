use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    /// Name never published, or its record outlived its lifetime.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("fetch failed for {path}: {reason}")]
    FetchFailure { path: String, reason: String },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response from content node: {0}")]
    InvalidResponse(String),
}

impl ContentError {
    pub fn fetch(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::FetchFailure {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type ContentResult<T> = Result<T, ContentError>;
