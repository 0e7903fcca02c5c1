use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::{ContentId, IdentityId};
use crate::post::PostRecord;
use crate::tag::{AuxMap, TagValue};

/// The published identity document (`identity.json`).
///
/// Field names on the wire are the short keys used by every existing client
/// (`av`, `dn`, `ts`, ...), serialized in that alphabetical order.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Forward-compatible fields; passthrough.
    #[serde(default)]
    pub aux: AuxMap,
    /// Avatar reference (usually a content path).
    #[serde(rename = "av", default)]
    pub avatar: String,
    #[serde(rename = "dn", default)]
    pub display_name: String,
    /// Followed identities, oldest follow first.
    #[serde(default)]
    pub following: Vec<IdentityId>,
    #[serde(default)]
    pub id: IdentityId,
    #[serde(default)]
    pub meta: Vec<TagValue>,
    /// Post content ids, newest first.
    #[serde(default)]
    pub posts: Vec<ContentId>,
    /// Epoch milliseconds of the last persisted mutation.
    #[serde(default)]
    pub ts: u64,
}

impl IdentityRecord {
    /// A minimal record for `id`: it follows only itself and has no posts.
    ///
    /// Used both for first-run self initialization and for placeholders of
    /// followed identities that could not be fetched yet.
    pub fn fresh(id: IdentityId, ts: u64) -> Self {
        Self {
            following: vec![id.clone()],
            id,
            ts,
            ..Self::default()
        }
    }

    pub fn follows(&self, id: &IdentityId) -> bool {
        self.following.contains(id)
    }

    pub fn has_post(&self, cid: &ContentId) -> bool {
        self.posts.contains(cid)
    }

    /// Display fields attached to every post read through this identity.
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            avatar: self.avatar.clone(),
            display_name: self.display_name.clone(),
            id: self.id.clone(),
            ts: self.ts,
        }
    }

    /// Serialize to the published JSON document.
    pub fn to_document(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Parse a published JSON document.
    pub fn from_document(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

/// Snapshot of the publishing identity carried by a feed entry.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    #[serde(rename = "av", default)]
    pub avatar: String,
    #[serde(rename = "dn", default)]
    pub display_name: String,
    #[serde(default)]
    pub id: IdentityId,
    #[serde(default)]
    pub ts: u64,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// An identity record as mirrored in the local store.
///
/// Adds the local-only post cache and placeholder flag on top of the
/// published fields. Neither is ever part of the published document: the
/// publish path serializes [`IdentityRecord`] only.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedIdentity {
    #[serde(flatten)]
    pub record: IdentityRecord,
    /// Fetched posts keyed by content id. `None` until the first post read.
    #[serde(rename = "posts_deep", default, skip_serializing_if = "Option::is_none")]
    pub post_cache: Option<BTreeMap<ContentId, PostRecord>>,
    /// Set while the record is a stand-in for an unreachable identity.
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl CachedIdentity {
    pub fn new(record: IdentityRecord) -> Self {
        Self {
            record,
            post_cache: None,
            placeholder: false,
        }
    }

    pub fn placeholder(id: IdentityId, ts: u64) -> Self {
        Self {
            record: IdentityRecord::fresh(id, ts),
            post_cache: None,
            placeholder: true,
        }
    }

    pub fn id(&self) -> &IdentityId {
        &self.record.id
    }

    pub fn cached_post(&self, cid: &ContentId) -> Option<&PostRecord> {
        self.post_cache.as_ref().and_then(|cache| cache.get(cid))
    }

    /// The post cache, created on first use.
    pub fn post_cache_mut(&mut self) -> &mut BTreeMap<ContentId, PostRecord> {
        self.post_cache.get_or_insert_with(BTreeMap::new)
    }

    /// Drop a cached post. Returns `true` if an entry was removed.
    pub fn evict_post(&mut self, cid: &ContentId) -> bool {
        self.post_cache
            .as_mut()
            .map(|cache| cache.remove(cid).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IdentityRecord {
        IdentityRecord {
            avatar: "QmAvatar/me.png".into(),
            display_name: "alice".into(),
            following: vec!["QmAlice".into(), "QmBob".into()],
            id: "QmAlice".into(),
            posts: vec!["QmPost2".into(), "QmPost1".into()],
            ts: 1000,
            ..IdentityRecord::default()
        }
    }

    #[test]
    fn fresh_follows_itself() {
        let r = IdentityRecord::fresh("QmSelf".into(), 5);
        assert_eq!(r.following, vec![IdentityId::new("QmSelf")]);
        assert!(r.posts.is_empty());
        assert_eq!(r.ts, 5);
        assert!(r.follows(&"QmSelf".into()));
    }

    #[test]
    fn wire_keys_are_short_and_sorted() {
        let json = String::from_utf8(sample().to_document().unwrap()).unwrap();
        let order = ["\"aux\"", "\"av\"", "\"dn\"", "\"following\"", "\"id\"", "\"meta\"", "\"posts\"", "\"ts\""];
        let positions: Vec<usize> = order.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn parses_sparse_documents() {
        let r = IdentityRecord::from_document(br#"{"id":"QmX","posts":["QmP"]}"#).unwrap();
        assert_eq!(r.id.as_str(), "QmX");
        assert_eq!(r.posts.len(), 1);
        assert!(r.following.is_empty());
        assert_eq!(r.display_name, "");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            IdentityRecord::from_document(b"not json"),
            Err(TypeError::Serialization(_))
        ));
    }

    #[test]
    fn published_document_never_carries_post_cache() {
        let mut cached = CachedIdentity::new(sample());
        cached.post_cache_mut().insert("QmPost1".into(), PostRecord::default());
        let local = serde_json::to_string(&cached).unwrap();
        assert!(local.contains("posts_deep"));
        let published = String::from_utf8(cached.record.to_document().unwrap()).unwrap();
        assert!(!published.contains("posts_deep"));
    }

    #[test]
    fn cached_identity_roundtrips_through_local_form() {
        let mut cached = CachedIdentity::placeholder("QmPeer".into(), 9);
        cached.post_cache_mut().insert("QmP".into(), PostRecord::default());
        let json = serde_json::to_value(&cached).unwrap();
        let back: CachedIdentity = serde_json::from_value(json).unwrap();
        assert_eq!(back, cached);
        assert!(back.placeholder);
    }

    #[test]
    fn absent_cache_is_a_miss_not_an_error() {
        let json = serde_json::to_value(sample()).unwrap();
        let mut cached: CachedIdentity = serde_json::from_value(json).unwrap();
        assert!(cached.post_cache.is_none());
        assert!(cached.cached_post(&"QmPost1".into()).is_none());
        assert!(!cached.evict_post(&"QmPost1".into()));
        assert!(!cached.placeholder);
    }

    #[test]
    fn snapshot_copies_display_fields() {
        let snap = sample().snapshot();
        assert_eq!(snap.id.as_str(), "QmAlice");
        assert_eq!(snap.display_name, "alice");
        assert_eq!(snap.avatar, "QmAvatar/me.png");
        assert_eq!(snap.ts, 1000);
    }
}
