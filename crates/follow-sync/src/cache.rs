//! Typed view over the local durable store.
//!
//! Identity records live under their id, the feed under [`FEED_KEY`]. This is
//! the only place that knows how documents are laid out in the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use follow_store::{LocalStore, FEED_KEY};
use follow_types::{CachedIdentity, ContentId, FeedPost, IdentityId, IdentityRecord, PostRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Clones share one update lock: every read-modify-write of an identity
/// entry runs under it, so a post-cache write and a record write for the same
/// id never overwrite each other.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn LocalStore>,
    update: Arc<Mutex<()>>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            update: Arc::new(Mutex::new(())),
        }
    }

    fn lock_update(&self) -> MutexGuard<'_, ()> {
        // Guards no data of its own, so a poisoned lock is still usable.
        self.update.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    fn identity_key(id: &IdentityId) -> SyncResult<&str> {
        if id.as_str() == FEED_KEY {
            return Err(SyncError::ReservedKey(id.to_string()));
        }
        if id.is_empty() {
            return Err(SyncError::NotFound("empty identity id".into()));
        }
        Ok(id.as_str())
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        match self.store.get(key)? {
            Some(doc) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| SyncError::Serialization(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> SyncResult<()> {
        let doc = serde_json::to_value(value)
            .map_err(|e| SyncError::Serialization(format!("{key}: {e}")))?;
        self.store.put(key, &doc)?;
        Ok(())
    }

    pub fn has_identity(&self, id: &IdentityId) -> SyncResult<bool> {
        Ok(self.store.has(Self::identity_key(id)?)?)
    }

    pub fn load_identity(&self, id: &IdentityId) -> SyncResult<Option<CachedIdentity>> {
        self.read(Self::identity_key(id)?)
    }

    pub fn save_identity(&self, entry: &CachedIdentity) -> SyncResult<()> {
        self.write(Self::identity_key(entry.id())?, entry)
    }

    /// Store new published fields for `record.id`, keeping whatever posts were
    /// already cached for it. The entry stops being a placeholder.
    pub fn save_record(&self, record: &IdentityRecord) -> SyncResult<CachedIdentity> {
        let _guard = self.lock_update();
        let entry = self.overlay(record)?;
        self.save_identity(&entry)?;
        Ok(entry)
    }

    /// `record` paired with the post cache stored for its id, if any.
    ///
    /// Used for the self identity, whose authoritative fields live in memory.
    pub fn overlay(&self, record: &IdentityRecord) -> SyncResult<CachedIdentity> {
        let post_cache = self
            .load_identity(&record.id)?
            .and_then(|entry| entry.post_cache);
        Ok(CachedIdentity {
            record: record.clone(),
            post_cache,
            placeholder: false,
        })
    }

    /// Record a fetched post under its owner.
    ///
    /// The owner entry is re-read before writing so that fields committed
    /// since `owner` was loaded are not rolled back; `owner` is only written
    /// as-is if the store no longer holds it.
    pub fn cache_post(&self, owner: &CachedIdentity, cid: &ContentId, post: &PostRecord) -> SyncResult<()> {
        let _guard = self.lock_update();
        let mut entry = self
            .load_identity(owner.id())?
            .unwrap_or_else(|| owner.clone());
        entry.post_cache_mut().insert(cid.clone(), post.clone());
        self.save_identity(&entry)
    }

    /// Drop a cached post of `owner`. Returns `true` if an entry was removed.
    pub fn evict_post(&self, owner: &IdentityId, cid: &ContentId) -> SyncResult<bool> {
        let _guard = self.lock_update();
        let Some(mut entry) = self.load_identity(owner)? else {
            return Ok(false);
        };
        if !entry.evict_post(cid) {
            return Ok(false);
        }
        self.save_identity(&entry)?;
        debug!(owner = %owner.short(), cid = %cid.short(), "cached post evicted");
        Ok(true)
    }

    /// The persisted feed; empty if none was ever written or the stored one
    /// cannot be read back. The next pass rewrites it.
    pub fn load_feed(&self) -> SyncResult<Vec<FeedPost>> {
        match self.read(FEED_KEY) {
            Ok(feed) => Ok(feed.unwrap_or_default()),
            Err(SyncError::Serialization(reason)) => {
                warn!(%reason, "discarding unreadable feed");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn save_feed(&self, feed: &[FeedPost]) -> SyncResult<()> {
        self.write(FEED_KEY, &feed)
    }

    /// Write an empty feed if none exists. Returns `true` if one was created.
    pub fn ensure_feed(&self) -> SyncResult<bool> {
        if self.store.has(FEED_KEY)? {
            return Ok(false);
        }
        self.save_feed(&[])?;
        Ok(true)
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache").finish_non_exhaustive()
    }
}
