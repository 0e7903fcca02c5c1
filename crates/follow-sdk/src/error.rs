use follow_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    /// An edit named an unknown field or carried a value of the wrong type.
    #[error("schema mismatch for field {key}: {reason}")]
    SchemaMismatch { key: String, reason: String },

    /// An upload returned a content id that does not have the expected shape.
    #[error("malformed content id {id}: {reason}")]
    MalformedContentId { id: String, reason: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("sync error: {0}")]
    Sync(#[from] follow_sync::SyncError),

    #[error("content error: {0}")]
    Content(#[from] follow_content::ContentError),

    #[error("store error: {0}")]
    Store(#[from] follow_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    pub fn schema(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<TypeError> for SdkError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::MalformedContentId { id, reason } => Self::MalformedContentId { id, reason },
            other => Self::Serialization(other.to_string()),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
