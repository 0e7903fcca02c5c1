use std::fmt::Display;

use follow_content::ContentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Key or name absent. Expected during normal operation.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network, timeout, or parse failure against the content store.
    #[error("fetch failed for {target}: {reason}")]
    FetchFailure { target: String, reason: String },

    /// The key is reserved for engine bookkeeping.
    #[error("reserved key cannot hold an identity: {0}")]
    ReservedKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] follow_store::StoreError),
}

impl SyncError {
    /// Map a content-store failure for `target` onto the engine taxonomy.
    pub fn remote(target: impl Display, error: ContentError) -> Self {
        match error {
            ContentError::NotFound(what) => Self::NotFound(what),
            other => Self::FetchFailure {
                target: target.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn fetch(target: impl Display, reason: impl Display) -> Self {
        Self::FetchFailure {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// `true` for failures caused by the network rather than local storage.
    ///
    /// Only these are tolerated by placeholder fallback; a broken local store
    /// must still surface.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::FetchFailure { .. })
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
