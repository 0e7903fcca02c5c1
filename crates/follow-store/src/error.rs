/// Errors from local store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key cannot be used by this backend (empty, or unsafe as a file name).
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// A stored document could not be encoded or decoded.
    #[error("serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
