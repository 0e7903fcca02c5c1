use async_trait::async_trait;
use follow_types::{ContentId, ContentPath, IdentityId};

use crate::error::ContentResult;
use crate::types::{AddOptions, DocumentEntry, PublishOptions, PublishRecord};

/// Client interface for the content-addressed network.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// The identity this node publishes under.
    async fn self_id(&self) -> ContentResult<IdentityId>;

    /// Resolve a published name to the content id it currently points at.
    ///
    /// Fails with `NotFound` if the name was never published or its record is
    /// stale beyond its lifetime.
    async fn resolve_name(&self, name: &IdentityId) -> ContentResult<ContentId>;

    /// Fetch the raw bytes at `path`.
    async fn get_bytes(&self, path: &ContentPath) -> ContentResult<Vec<u8>>;

    /// Upload one or more entries as a unit and return the root content id.
    async fn add_document(
        &self,
        entries: &[DocumentEntry],
        options: &AddOptions,
    ) -> ContentResult<ContentId>;

    /// Point this node's name at `cid`.
    async fn publish_name(
        &self,
        cid: &ContentId,
        options: &PublishOptions,
    ) -> ContentResult<PublishRecord>;

    /// Retain `cid` against garbage collection.
    async fn pin(&self, cid: &ContentId) -> ContentResult<()>;
}
