use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::{ContentId, IdentityId};
use crate::identity::{IdentityRecord, IdentitySnapshot};
use crate::tag::TagValue;

/// An immutable post document (`post.json`).
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub body: String,
    /// Author display name at posting time.
    #[serde(rename = "dn", default)]
    pub display_name: String,
    /// Attachment file names, in upload order.
    #[serde(default)]
    pub files: Vec<String>,
    /// Bundle containing `files`; empty when there are none.
    #[serde(rename = "filesRoot", default)]
    pub files_root: String,
    #[serde(default)]
    pub magnet: String,
    #[serde(default)]
    pub meta: Vec<TagValue>,
    /// Author identity. Older documents omit it.
    #[serde(default)]
    pub publisher: IdentityId,
    /// Creation time, epoch milliseconds. Also the feed dedup key.
    #[serde(default)]
    pub ts: u64,
}

impl PostRecord {
    pub fn new(body: impl Into<String>, publisher: IdentityId, ts: u64) -> Self {
        Self {
            body: body.into(),
            publisher,
            ts,
            ..Self::default()
        }
    }

    pub fn to_document(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_document(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// A post as handed to readers: the stored document plus the content id it
/// was fetched from and a snapshot of the identity that referenced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: PostRecord,
    #[serde(rename = "postCid")]
    pub post_cid: ContentId,
    pub identity: IdentitySnapshot,
}

impl FeedPost {
    /// Attach read-time display fields. A missing publisher defaults to the
    /// owning identity.
    pub fn attach(mut post: PostRecord, post_cid: ContentId, owner: &IdentityRecord) -> Self {
        if post.publisher.is_empty() {
            post.publisher = owner.id.clone();
        }
        Self {
            post,
            post_cid,
            identity: owner.snapshot(),
        }
    }

    pub fn ts(&self) -> u64 {
        self.post.ts
    }
}
