use std::sync::Arc;

use follow_content::ContentStore;
use follow_store::LocalStore;
use follow_types::IdentityId;

use crate::cache::LocalCache;
use crate::feed::FeedAggregator;
use crate::identity::IdentityCache;
use crate::post::PostCache;

/// The caches and the aggregator of one identity instance, wired to the
/// same local store and content network.
pub struct SyncEngine {
    cache: LocalCache,
    identities: IdentityCache,
    posts: PostCache,
    feed: FeedAggregator,
    content: Arc<dyn ContentStore>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn LocalStore>, content: Arc<dyn ContentStore>, self_id: IdentityId) -> Self {
        let cache = LocalCache::new(store);
        let identities = IdentityCache::new(cache.clone(), content.clone(), self_id);
        let posts = PostCache::new(cache.clone(), content.clone());
        let feed = FeedAggregator::new(identities.clone(), posts.clone(), cache.clone());
        Self {
            cache,
            identities,
            posts,
            feed,
            content,
        }
    }

    pub fn self_id(&self) -> &IdentityId {
        self.identities.self_id()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn identities(&self) -> &IdentityCache {
        &self.identities
    }

    pub fn posts(&self) -> &PostCache {
        &self.posts
    }

    pub fn feed(&self) -> &FeedAggregator {
        &self.feed
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("self_id", self.self_id())
            .field("feed", &self.feed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use follow_content::InMemoryContentStore;
    use follow_store::InMemoryLocalStore;
    use follow_types::{CachedIdentity, IdentityRecord};

    #[tokio::test]
    async fn components_share_one_store() {
        let engine = SyncEngine::new(
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryContentStore::new("QmSelf")),
            "QmSelf".into(),
        );
        assert_eq!(engine.self_id().as_str(), "QmSelf");

        let me = CachedIdentity::new(IdentityRecord::fresh("QmSelf".into(), 1));
        engine.cache().save_identity(&me).unwrap();
        let (resolved, _) = engine.identities().resolve(&"QmSelf".into()).await.unwrap();
        assert_eq!(resolved, me);
        assert_eq!(engine.content().self_id().await.unwrap().as_str(), "QmSelf");
    }
}
