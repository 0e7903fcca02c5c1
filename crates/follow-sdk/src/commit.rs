use std::sync::Arc;
use std::time::Duration;

use follow_content::{AddOptions, ContentStore, DocumentEntry, PublishOptions, PublishRecord};
use follow_sync::{LocalCache, IDENTITY_DOCUMENT};
use follow_types::{now_ms, ContentId, IdentityId, IdentityRecord};
use serde::Serialize;
use tracing::info;

use crate::error::SdkResult;

/// Result of publishing the self identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub name: IdentityId,
    /// Root of the published identity bundle.
    pub identity_cid: ContentId,
    /// `ts` of the record that was published.
    pub ts: u64,
}

/// Persists the self record and republishes it under the self name.
#[derive(Clone)]
pub(crate) struct Committer {
    cache: LocalCache,
    content: Arc<dyn ContentStore>,
    add: AddOptions,
    publish: PublishOptions,
}

impl Committer {
    pub fn new(
        cache: LocalCache,
        content: Arc<dyn ContentStore>,
        request_timeout: Duration,
        lifetime: Duration,
    ) -> Self {
        Self {
            cache,
            content,
            add: AddOptions {
                pin: true,
                wrap_with_directory: true,
                timeout: request_timeout,
            },
            publish: PublishOptions { lifetime },
        }
    }

    pub fn upload_options(&self) -> &AddOptions {
        &self.add
    }

    /// Stamp `record.ts` and write it to the local store, keeping its cached
    /// posts.
    pub fn persist(&self, record: &mut IdentityRecord) -> SdkResult<()> {
        record.ts = now_ms();
        self.cache.save_record(record)?;
        Ok(())
    }

    /// Upload `record` as `identity.json` and point the self name at it.
    pub async fn republish(&self, record: &IdentityRecord) -> SdkResult<CommitReceipt> {
        let document = record.to_document()?;
        let root = self
            .content
            .add_document(&[DocumentEntry::new(IDENTITY_DOCUMENT, document)], &self.add)
            .await?;
        let PublishRecord { name, value } = self.content.publish_name(&root, &self.publish).await?;
        info!(name = %name.short(), cid = %value.short(), ts = record.ts, "identity published");
        Ok(CommitReceipt {
            name,
            identity_cid: value,
            ts: record.ts,
        })
    }
}
