//! Identity resolution: local store first, content network on a miss.

use std::sync::Arc;

use follow_content::ContentStore;
use follow_types::{now_ms, CachedIdentity, IdentityId, IdentityRecord};
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::error::{SyncError, SyncResult};
use crate::report::ItemStatus;

/// Name of the identity document inside a published identity bundle.
pub const IDENTITY_DOCUMENT: &str = "identity.json";

/// Where a resolved identity came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentitySource {
    Cached,
    Fetched,
    Placeholder,
}

impl From<IdentitySource> for ItemStatus {
    fn from(source: IdentitySource) -> Self {
        match source {
            IdentitySource::Cached => ItemStatus::Cached,
            IdentitySource::Fetched => ItemStatus::Fetched,
            IdentitySource::Placeholder => ItemStatus::Placeholder,
        }
    }
}

/// Resolves identity ids to records.
///
/// The self identity is only ever read from the local store; every other id
/// falls back to resolving its published name and fetching the identity
/// document beneath it.
#[derive(Clone)]
pub struct IdentityCache {
    cache: LocalCache,
    content: Arc<dyn ContentStore>,
    self_id: IdentityId,
}

impl IdentityCache {
    pub fn new(cache: LocalCache, content: Arc<dyn ContentStore>, self_id: IdentityId) -> Self {
        Self {
            cache,
            content,
            self_id,
        }
    }

    pub fn self_id(&self) -> &IdentityId {
        &self.self_id
    }

    fn is_self(&self, id: &IdentityId) -> bool {
        *id == self.self_id
    }

    /// Resolve `id`, fetching it on a cache miss.
    ///
    /// A cached placeholder is retried against the network and upgraded in
    /// place when the fetch succeeds; if it fails again the placeholder is
    /// returned unchanged.
    pub async fn resolve(&self, id: &IdentityId) -> SyncResult<(CachedIdentity, IdentitySource)> {
        if let Some(entry) = self.cache.load_identity(id)? {
            if !entry.placeholder || self.is_self(id) {
                debug!(id = %id.short(), "identity cache hit");
                return Ok((entry, IdentitySource::Cached));
            }
            return match self.fetch_remote(id).await {
                Ok(record) => {
                    let upgraded = self.cache.save_record(&record)?;
                    info!(id = %id.short(), posts = record.posts.len(), "placeholder identity upgraded");
                    Ok((upgraded, IdentitySource::Fetched))
                }
                Err(e) if e.is_remote() => {
                    debug!(id = %id.short(), error = %e, "identity still unreachable");
                    Ok((entry, IdentitySource::Placeholder))
                }
                Err(e) => Err(e),
            };
        }

        if self.is_self(id) {
            return Err(SyncError::NotFound(format!("self identity {id} not initialized")));
        }

        debug!(id = %id.short(), "identity cache miss");
        let record = self.fetch_remote(id).await?;
        let entry = self.cache.save_record(&record)?;
        Ok((entry, IdentitySource::Fetched))
    }

    /// Like [`resolve`](Self::resolve), but an unreachable identity is
    /// replaced by a persisted placeholder instead of failing.
    pub async fn resolve_or_placeholder(
        &self,
        id: &IdentityId,
    ) -> SyncResult<(CachedIdentity, IdentitySource)> {
        match self.resolve(id).await {
            Err(e) if e.is_remote() && !self.is_self(id) => {
                warn!(id = %id.short(), error = %e, "identity unreachable, storing placeholder");
                let entry = CachedIdentity::placeholder(id.clone(), now_ms());
                self.cache.save_identity(&entry)?;
                Ok((entry, IdentitySource::Placeholder))
            }
            other => other,
        }
    }

    /// Re-fetch `id` and overwrite its cached fields, keeping cached posts.
    ///
    /// Returns `Ok(None)` for the self id, which is never fetched.
    pub async fn refresh(&self, id: &IdentityId) -> SyncResult<Option<CachedIdentity>> {
        if self.is_self(id) {
            return Ok(None);
        }
        let record = self.fetch_remote(id).await?;
        let entry = self.cache.save_record(&record)?;
        debug!(id = %id.short(), ts = record.ts, "identity refreshed");
        Ok(Some(entry))
    }

    /// Fetch the latest published document of `id`.
    ///
    /// The requested id is authoritative: a document declaring any other id
    /// is corrected before it is returned.
    pub async fn fetch_remote(&self, id: &IdentityId) -> SyncResult<IdentityRecord> {
        let root = self
            .content
            .resolve_name(id)
            .await
            .map_err(|e| SyncError::remote(id, e))?;
        let bytes = self
            .content
            .get_bytes(&root.join(IDENTITY_DOCUMENT))
            .await
            .map_err(|e| SyncError::remote(id, e))?;
        let mut record =
            IdentityRecord::from_document(&bytes).map_err(|e| SyncError::fetch(id, e))?;
        if record.id != *id {
            warn!(
                requested = %id,
                declared = %record.id,
                "identity document declares a different id, using requested id"
            );
            record.id = id.clone();
        }
        Ok(record)
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("self_id", &self.self_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use follow_content::{AddOptions, DocumentEntry, InMemoryContentStore, DEFAULT_LIFETIME};
    use follow_store::InMemoryLocalStore;

    struct Fixture {
        content: Arc<InMemoryContentStore>,
        cache: LocalCache,
        identities: IdentityCache,
    }

    fn fixture() -> Fixture {
        let content = Arc::new(InMemoryContentStore::new("QmSelf"));
        let cache = LocalCache::new(Arc::new(InMemoryLocalStore::new()));
        let identities = IdentityCache::new(cache.clone(), content.clone(), "QmSelf".into());
        Fixture {
            content,
            cache,
            identities,
        }
    }

    async fn publish(content: &InMemoryContentStore, name: &str, record: &IdentityRecord) {
        let cid = content
            .add_document(
                &[DocumentEntry::new(IDENTITY_DOCUMENT, record.to_document().unwrap())],
                &AddOptions::default(),
            )
            .await
            .unwrap();
        content.publish_as(&name.into(), &cid, DEFAULT_LIFETIME);
    }

    fn peer(id: &str, name: &str) -> IdentityRecord {
        let mut record = IdentityRecord::fresh(id.into(), 100);
        record.display_name = name.into();
        record
    }

    #[tokio::test]
    async fn miss_fetches_and_persists() {
        let f = fixture();
        publish(&f.content, "QmPeer", &peer("QmPeer", "peer")).await;

        let (entry, source) = f.identities.resolve(&"QmPeer".into()).await.unwrap();
        assert_eq!(source, IdentitySource::Fetched);
        assert_eq!(entry.record.display_name, "peer");
        assert!(f.cache.has_identity(&"QmPeer".into()).unwrap());
    }

    #[tokio::test]
    async fn cached_ids_resolve_without_network() {
        let f = fixture();
        publish(&f.content, "QmPeer", &peer("QmPeer", "peer")).await;
        let (first, _) = f.identities.resolve(&"QmPeer".into()).await.unwrap();

        f.content.set_name_reachable(&"QmPeer".into(), false);
        let (second, source) = f.identities.resolve(&"QmPeer".into()).await.unwrap();
        assert_eq!(source, IdentitySource::Cached);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn declared_id_is_overwritten_by_requested_id() {
        let f = fixture();
        publish(&f.content, "QmPeer", &peer("QmImpostor", "peer")).await;

        let (entry, _) = f.identities.resolve(&"QmPeer".into()).await.unwrap();
        assert_eq!(entry.id().as_str(), "QmPeer");
        let stored = f.cache.load_identity(&"QmPeer".into()).unwrap().unwrap();
        assert_eq!(stored.id().as_str(), "QmPeer");
        assert!(f.cache.load_identity(&"QmImpostor".into()).unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_declared_id_is_filled_in() {
        let f = fixture();
        let mut record = peer("QmPeer", "peer");
        record.id = IdentityId::default();
        publish(&f.content, "QmPeer", &record).await;

        let (entry, _) = f.identities.resolve(&"QmPeer".into()).await.unwrap();
        assert!(!entry.id().is_empty());
        assert_eq!(entry.id().as_str(), "QmPeer");
    }

    #[tokio::test]
    async fn self_is_never_fetched() {
        let f = fixture();
        publish(&f.content, "QmSelf", &peer("QmSelf", "remote copy")).await;
        let err = f.identities.resolve(&"QmSelf".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));

        let err = f.identities.resolve_or_placeholder(&"QmSelf".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert!(f.identities.refresh(&"QmSelf".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_identity_becomes_placeholder() {
        let f = fixture();
        let (entry, source) = f
            .identities
            .resolve_or_placeholder(&"QmGone".into())
            .await
            .unwrap();
        assert_eq!(source, IdentitySource::Placeholder);
        assert!(entry.placeholder);
        assert_eq!(entry.record.following, vec![IdentityId::new("QmGone")]);
        assert!(entry.record.posts.is_empty());
        assert!(entry.record.ts > 0);

        let stored = f.cache.load_identity(&"QmGone".into()).unwrap().unwrap();
        assert!(stored.placeholder);
    }

    #[tokio::test]
    async fn plain_resolve_surfaces_remote_failure() {
        let f = fixture();
        assert!(f.identities.resolve(&"QmGone".into()).await.unwrap_err().is_remote());
        assert!(!f.cache.has_identity(&"QmGone".into()).unwrap());
    }

    #[tokio::test]
    async fn placeholder_is_upgraded_once_reachable() {
        let f = fixture();
        f.identities
            .resolve_or_placeholder(&"QmLate".into())
            .await
            .unwrap();

        let (entry, source) = f.identities.resolve(&"QmLate".into()).await.unwrap();
        assert_eq!(source, IdentitySource::Placeholder);
        assert!(entry.placeholder);

        let mut record = peer("QmLate", "late");
        record.posts = vec!["QmPost".into()];
        publish(&f.content, "QmLate", &record).await;

        let (entry, source) = f.identities.resolve(&"QmLate".into()).await.unwrap();
        assert_eq!(source, IdentitySource::Fetched);
        assert!(!entry.placeholder);
        assert_eq!(entry.record.display_name, "late");
        assert_eq!(entry.record.posts.len(), 1);
    }

    #[tokio::test]
    async fn refresh_overwrites_fields_and_keeps_posts() {
        let f = fixture();
        publish(&f.content, "QmPeer", &peer("QmPeer", "old")).await;
        let (mut entry, _) = f.identities.resolve(&"QmPeer".into()).await.unwrap();
        entry
            .post_cache_mut()
            .insert("QmPost".into(), follow_types::PostRecord::default());
        f.cache.save_identity(&entry).unwrap();

        publish(&f.content, "QmPeer", &peer("QmPeer", "new")).await;
        let refreshed = f.identities.refresh(&"QmPeer".into()).await.unwrap().unwrap();
        assert_eq!(refreshed.record.display_name, "new");
        assert!(refreshed.cached_post(&"QmPost".into()).is_some());
    }

    #[tokio::test]
    async fn unparseable_document_is_fetch_failure() {
        let f = fixture();
        let cid = f
            .content
            .add_document(
                &[DocumentEntry::new(IDENTITY_DOCUMENT, b"not json".to_vec())],
                &AddOptions::default(),
            )
            .await
            .unwrap();
        f.content.publish_as(&"QmBad".into(), &cid, DEFAULT_LIFETIME);

        let err = f.identities.fetch_remote(&"QmBad".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::FetchFailure { .. }));
    }
}
