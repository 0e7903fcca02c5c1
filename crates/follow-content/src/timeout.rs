use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use follow_types::{ContentId, ContentPath, IdentityId};

use crate::error::{ContentError, ContentResult};
use crate::traits::ContentStore;
use crate::types::{AddOptions, DocumentEntry, PublishOptions, PublishRecord};

/// Bounds every call of the wrapped store by a request deadline.
///
/// Uploads use the deadline carried in their [`AddOptions`]; every other
/// call uses the wrapper's own deadline. An expired call fails with
/// [`ContentError::Timeout`] and leaves no partial result behind.
#[derive(Debug)]
pub struct TimeoutContentStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: ContentStore> TimeoutContentStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn bounded<T, F>(op: &'static str, after: Duration, fut: F) -> ContentResult<T>
where
    F: Future<Output = ContentResult<T>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| ContentError::Timeout { op, after })?
}

#[async_trait]
impl<S: ContentStore> ContentStore for TimeoutContentStore<S> {
    async fn self_id(&self) -> ContentResult<IdentityId> {
        bounded("id", self.timeout, self.inner.self_id()).await
    }

    async fn resolve_name(&self, name: &IdentityId) -> ContentResult<ContentId> {
        bounded("name resolve", self.timeout, self.inner.resolve_name(name)).await
    }

    async fn get_bytes(&self, path: &ContentPath) -> ContentResult<Vec<u8>> {
        bounded("get", self.timeout, self.inner.get_bytes(path)).await
    }

    async fn add_document(
        &self,
        entries: &[DocumentEntry],
        options: &AddOptions,
    ) -> ContentResult<ContentId> {
        bounded("add", options.timeout, self.inner.add_document(entries, options)).await
    }

    async fn publish_name(
        &self,
        cid: &ContentId,
        options: &PublishOptions,
    ) -> ContentResult<PublishRecord> {
        bounded("name publish", self.timeout, self.inner.publish_name(cid, options)).await
    }

    async fn pin(&self, cid: &ContentId) -> ContentResult<()> {
        bounded("pin", self.timeout, self.inner.pin(cid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryContentStore;

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let store = TimeoutContentStore::new(InMemoryContentStore::new("QmSelf"), Duration::from_secs(5));
        assert_eq!(store.self_id().await.unwrap().as_str(), "QmSelf");
        assert!(store.resolve_name(&"QmPeer".into()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let inner = InMemoryContentStore::new("QmSelf");
        inner.set_latency(Some(Duration::from_secs(30)));
        let store = TimeoutContentStore::new(inner, Duration::from_millis(20));
        let err = store.resolve_name(&"QmPeer".into()).await.unwrap_err();
        assert!(matches!(
            err,
            ContentError::Timeout { op: "name resolve", .. }
        ));
    }

    #[tokio::test]
    async fn add_uses_its_own_deadline() {
        let inner = InMemoryContentStore::new("QmSelf");
        inner.set_latency(Some(Duration::from_secs(30)));
        let store = TimeoutContentStore::new(inner, Duration::from_secs(60));
        let options = AddOptions {
            timeout: Duration::from_millis(20),
            ..AddOptions::default()
        };
        let err = store
            .add_document(&[DocumentEntry::new("a", b"1".to_vec())], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::Timeout { op: "add", .. }));
        assert!(store.inner().is_empty());
    }
}
