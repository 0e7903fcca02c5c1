use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("empty identifier")]
    EmptyId,

    #[error("malformed content id {id}: {reason}")]
    MalformedContentId { id: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
