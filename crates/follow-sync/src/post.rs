//! Post resolution, memoized per owning identity.

use std::sync::Arc;

use follow_content::ContentStore;
use follow_types::{CachedIdentity, ContentId, ContentPath, FeedPost, PostRecord};
use tracing::{debug, warn};

use crate::cache::LocalCache;
use crate::error::{SyncError, SyncResult};
use crate::report::ItemStatus;

/// Name of the post document inside a post bundle.
pub const POST_DOCUMENT: &str = "post.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostSource {
    Cached,
    Fetched,
}

impl From<PostSource> for ItemStatus {
    fn from(source: PostSource) -> Self {
        match source {
            PostSource::Cached => ItemStatus::Cached,
            PostSource::Fetched => ItemStatus::Fetched,
        }
    }
}

/// Resolves post content ids through the post cache of their owner.
///
/// Posts are immutable per content id, so a cached entry is never refetched.
#[derive(Clone)]
pub struct PostCache {
    cache: LocalCache,
    content: Arc<dyn ContentStore>,
    pin_fetched: bool,
}

impl PostCache {
    pub fn new(cache: LocalCache, content: Arc<dyn ContentStore>) -> Self {
        Self {
            cache,
            content,
            pin_fetched: true,
        }
    }

    /// Whether freshly fetched posts are pinned on the local node.
    pub fn with_pinning(mut self, pin_fetched: bool) -> Self {
        self.pin_fetched = pin_fetched;
        self
    }

    /// Resolve `cid` as a post of `owner`.
    ///
    /// On a miss the post is fetched, added to `owner`'s cache both in memory
    /// and in the local store, and pinned on a best-effort basis.
    pub async fn resolve(
        &self,
        owner: &mut CachedIdentity,
        cid: &ContentId,
    ) -> SyncResult<(FeedPost, PostSource)> {
        if let Some(post) = owner.cached_post(cid) {
            debug!(owner = %owner.id().short(), cid = %cid.short(), "post cache hit");
            let item = FeedPost::attach(post.clone(), cid.clone(), &owner.record);
            return Ok((item, PostSource::Cached));
        }

        debug!(owner = %owner.id().short(), cid = %cid.short(), "post cache miss");
        let post = self.fetch(cid).await?;
        owner.post_cache_mut().insert(cid.clone(), post.clone());
        self.cache.cache_post(owner, cid, &post)?;

        if self.pin_fetched {
            if let Err(e) = self.content.pin(cid).await {
                warn!(cid = %cid.short(), error = %e, "failed to pin fetched post");
            }
        }
        Ok((FeedPost::attach(post, cid.clone(), &owner.record), PostSource::Fetched))
    }

    /// Fetch and parse the post at `cid`, trying the bundle layout first and
    /// the bare document second.
    pub async fn fetch(&self, cid: &ContentId) -> SyncResult<PostRecord> {
        let bytes = match self.content.get_bytes(&cid.join(POST_DOCUMENT)).await {
            Ok(bytes) => bytes,
            Err(bundled) => {
                debug!(cid = %cid.short(), error = %bundled, "no post bundle, trying bare document");
                self.content
                    .get_bytes(&ContentPath::from(cid))
                    .await
                    .map_err(|bare| SyncError::fetch(cid, format!("{bundled}; {bare}")))?
            }
        };
        PostRecord::from_document(&bytes).map_err(|e| SyncError::fetch(cid, e))
    }
}

impl std::fmt::Debug for PostCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostCache")
            .field("pin_fetched", &self.pin_fetched)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use follow_content::{AddOptions, DocumentEntry, InMemoryContentStore};
    use follow_store::InMemoryLocalStore;
    use follow_types::IdentityRecord;

    fn setup() -> (Arc<InMemoryContentStore>, LocalCache, PostCache) {
        let content = Arc::new(InMemoryContentStore::new("QmSelf"));
        let cache = LocalCache::new(Arc::new(InMemoryLocalStore::new()));
        let posts = PostCache::new(cache.clone(), content.clone());
        (content, cache, posts)
    }

    fn owner(id: &str) -> CachedIdentity {
        CachedIdentity::new(IdentityRecord::fresh(id.into(), 1))
    }

    async fn add(content: &InMemoryContentStore, post: &PostRecord, wrapped: bool) -> ContentId {
        let entries = [DocumentEntry::new(POST_DOCUMENT, post.to_document().unwrap())];
        let options = AddOptions {
            pin: false,
            wrap_with_directory: wrapped,
            ..AddOptions::default()
        };
        content.add_document(&entries, &options).await.unwrap()
    }

    #[tokio::test]
    async fn miss_fetches_caches_and_pins() {
        let (content, cache, posts) = setup();
        let mut owner = owner("QmPeer");
        cache.save_identity(&owner).unwrap();
        let cid = add(&content, &PostRecord::new("hello", "QmPeer".into(), 1000), true).await;
        assert!(!content.is_pinned(&cid));

        let (item, source) = posts.resolve(&mut owner, &cid).await.unwrap();
        assert_eq!(source, PostSource::Fetched);
        assert_eq!(item.post.body, "hello");
        assert_eq!(item.post_cid, cid);
        assert!(owner.cached_post(&cid).is_some());
        assert!(content.is_pinned(&cid));

        let stored = cache.load_identity(&"QmPeer".into()).unwrap().unwrap();
        assert!(stored.cached_post(&cid).is_some());
    }

    #[tokio::test]
    async fn hit_needs_no_network() {
        let (content, _cache, posts) = setup();
        let mut owner = owner("QmPeer");
        let cid = add(&content, &PostRecord::new("hello", "QmPeer".into(), 1000), true).await;
        posts.resolve(&mut owner, &cid).await.unwrap();

        content.set_content_reachable(&cid, false);
        let (item, source) = posts.resolve(&mut owner, &cid).await.unwrap();
        assert_eq!(source, PostSource::Cached);
        assert_eq!(item.post.body, "hello");
    }

    #[tokio::test]
    async fn bare_document_layout_is_accepted() {
        let (content, _cache, posts) = setup();
        let mut owner = owner("QmPeer");
        let cid = add(&content, &PostRecord::new("bare", "QmPeer".into(), 7), false).await;
        let (item, _) = posts.resolve(&mut owner, &cid).await.unwrap();
        assert_eq!(item.post.body, "bare");
    }

    #[tokio::test]
    async fn missing_publisher_defaults_to_owner() {
        let (content, _cache, posts) = setup();
        let mut owner = owner("QmPeer");
        let cid = add(&content, &PostRecord::new("anon", Default::default(), 7), true).await;
        let (item, _) = posts.resolve(&mut owner, &cid).await.unwrap();
        assert_eq!(item.post.publisher.as_str(), "QmPeer");
        assert_eq!(item.identity.id.as_str(), "QmPeer");
    }

    #[tokio::test]
    async fn unreachable_post_names_the_content_id() {
        let (content, _cache, posts) = setup();
        let mut owner = owner("QmPeer");
        let cid = add(&content, &PostRecord::new("x", "QmPeer".into(), 7), true).await;
        content.set_content_reachable(&cid, false);

        match posts.resolve(&mut owner, &cid).await.unwrap_err() {
            SyncError::FetchFailure { target, .. } => assert_eq!(target, cid.as_str()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(owner.post_cache.is_none());
    }

    #[tokio::test]
    async fn pin_failure_is_not_fatal() {
        let (_content, _cache, posts) = setup();
        let other = Arc::new(InMemoryContentStore::new("QmOther"));
        let cid = add(&other, &PostRecord::new("x", "QmPeer".into(), 7), true).await;
        // Only the fetch side can see the content; pinning on the local node fails.
        let posts = PostCache {
            content: Arc::new(SplitStore { read: other, write: Arc::new(InMemoryContentStore::new("QmSelf")) }),
            ..posts
        };
        let mut owner = owner("QmPeer");
        let (item, source) = posts.resolve(&mut owner, &cid).await.unwrap();
        assert_eq!(source, PostSource::Fetched);
        assert_eq!(item.post.body, "x");
    }

    /// Reads from one network, pins on another.
    struct SplitStore {
        read: Arc<InMemoryContentStore>,
        write: Arc<InMemoryContentStore>,
    }

    #[async_trait::async_trait]
    impl ContentStore for SplitStore {
        async fn self_id(&self) -> follow_content::ContentResult<follow_types::IdentityId> {
            self.write.self_id().await
        }
        async fn resolve_name(
            &self,
            name: &follow_types::IdentityId,
        ) -> follow_content::ContentResult<ContentId> {
            self.read.resolve_name(name).await
        }
        async fn get_bytes(&self, path: &ContentPath) -> follow_content::ContentResult<Vec<u8>> {
            self.read.get_bytes(path).await
        }
        async fn add_document(
            &self,
            entries: &[DocumentEntry],
            options: &AddOptions,
        ) -> follow_content::ContentResult<ContentId> {
            self.write.add_document(entries, options).await
        }
        async fn publish_name(
            &self,
            cid: &ContentId,
            options: &follow_content::PublishOptions,
        ) -> follow_content::ContentResult<follow_content::PublishRecord> {
            self.write.publish_name(cid, options).await
        }
        async fn pin(&self, cid: &ContentId) -> follow_content::ContentResult<()> {
            self.write.pin(cid).await
        }
    }
}
