use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Reserved key holding the persisted feed snapshot.
pub const FEED_KEY: &str = "feed";

/// Key → JSON document store mirroring network documents locally.
///
/// All implementations must satisfy these invariants:
/// - `get` of a key that was never written returns `Ok(None)`.
/// - `put` atomically replaces the previous document for the key.
/// - A successful `put` is visible to every subsequent `get`.
pub trait LocalStore: Send + Sync {
    /// Read the document stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Store `document` under `key`, replacing any previous document.
    fn put(&self, key: &str, document: &Value) -> StoreResult<()>;

    /// Check whether a document is stored under `key`.
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Reject keys no backend can store.
pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "empty".into(),
        });
    }
    Ok(())
}
