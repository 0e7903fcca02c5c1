//! In-process content network.
//!
//! [`InMemoryContentStore`] behaves like a single well-connected node: content
//! ids are derived from the bytes, wrapped uploads produce directory nodes,
//! and name records expire after their lifetime. Reachability of names and
//! content can be switched off per item to exercise failure paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use follow_types::{now_ms, ContentId, ContentPath, IdentityId, DEFAULT_CONTENT_ID_LEN};
use tracing::debug;

use crate::error::{ContentError, ContentResult};
use crate::traits::ContentStore;
use crate::types::{AddOptions, DocumentEntry, PublishOptions, PublishRecord};

#[derive(Clone, Debug)]
enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, ContentId>),
}

#[derive(Clone, Debug)]
struct NameRecord {
    value: ContentId,
    expires_at_ms: u64,
}

#[derive(Default)]
struct Network {
    nodes: HashMap<ContentId, Node>,
    names: HashMap<IdentityId, NameRecord>,
    pins: HashSet<ContentId>,
    unreachable_names: HashSet<IdentityId>,
    unreachable_content: HashSet<ContentId>,
}

/// Deterministic in-memory implementation of [`ContentStore`].
pub struct InMemoryContentStore {
    self_id: IdentityId,
    latency: RwLock<Option<Duration>>,
    network: RwLock<Network>,
}

/// Derive a `Qm…` content id of the default length from a node's bytes.
fn derive_id(kind: &str, data: &[u8]) -> ContentId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_bytes());
    hasher.update(b":");
    hasher.update(data);
    let digest = hex::encode(hasher.finalize().as_bytes());
    ContentId::new(format!("Qm{}", &digest[..DEFAULT_CONTENT_ID_LEN - 2]))
}

fn dir_id(entries: &BTreeMap<String, ContentId>) -> ContentId {
    let mut listing = Vec::new();
    for (name, cid) in entries {
        listing.extend_from_slice(name.as_bytes());
        listing.push(0);
        listing.extend_from_slice(cid.as_str().as_bytes());
        listing.push(b'\n');
    }
    derive_id("dir", &listing)
}

impl InMemoryContentStore {
    /// Create an empty network where this node publishes as `self_id`.
    pub fn new(self_id: impl Into<IdentityId>) -> Self {
        Self {
            self_id: self_id.into(),
            latency: RwLock::new(None),
            network: RwLock::new(Network::default()),
        }
    }

    /// Delay every call by `latency` (for deadline tests).
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut l) = self.latency.write() {
            *l = latency;
        }
    }

    /// Make resolution of `name` fail as if its publisher were offline.
    pub fn set_name_reachable(&self, name: &IdentityId, reachable: bool) {
        if let Ok(mut net) = self.network.write() {
            if reachable {
                net.unreachable_names.remove(name);
            } else {
                net.unreachable_names.insert(name.clone());
            }
        }
    }

    /// Make fetches beneath `cid` fail.
    pub fn set_content_reachable(&self, cid: &ContentId, reachable: bool) {
        if let Ok(mut net) = self.network.write() {
            if reachable {
                net.unreachable_content.remove(cid);
            } else {
                net.unreachable_content.insert(cid.clone());
            }
        }
    }

    /// Publish a pointer on behalf of another identity.
    pub fn publish_as(&self, name: &IdentityId, cid: &ContentId, lifetime: Duration) {
        if let Ok(mut net) = self.network.write() {
            let record = NameRecord {
                value: cid.clone(),
                expires_at_ms: now_ms().saturating_add(lifetime.as_millis() as u64),
            };
            net.names.insert(name.clone(), record);
        }
    }

    pub fn is_pinned(&self, cid: &ContentId) -> bool {
        self.network
            .read()
            .map(|net| net.pins.contains(cid))
            .unwrap_or(false)
    }

    /// Current (possibly expired) pointer of `name`, without reachability checks.
    pub fn pointer_of(&self, name: &IdentityId) -> Option<ContentId> {
        self.network
            .read()
            .ok()
            .and_then(|net| net.names.get(name).map(|r| r.value.clone()))
    }

    /// Number of content nodes held.
    pub fn len(&self) -> usize {
        self.network.read().map(|net| net.nodes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn simulate_latency(&self) {
        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lock_err() -> ContentError {
        ContentError::Transport("network lock poisoned".into())
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("self_id", &self.self_id)
            .field("node_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn self_id(&self) -> ContentResult<IdentityId> {
        Ok(self.self_id.clone())
    }

    async fn resolve_name(&self, name: &IdentityId) -> ContentResult<ContentId> {
        self.simulate_latency().await;
        let net = self.network.read().map_err(|_| Self::lock_err())?;
        if net.unreachable_names.contains(name) {
            return Err(ContentError::fetch(name, "no route to publisher"));
        }
        let record = net
            .names
            .get(name)
            .ok_or_else(|| ContentError::NotFound(format!("name {name}")))?;
        if now_ms() >= record.expires_at_ms {
            return Err(ContentError::NotFound(format!("name {name} (record expired)")));
        }
        Ok(record.value.clone())
    }

    async fn get_bytes(&self, path: &ContentPath) -> ContentResult<Vec<u8>> {
        self.simulate_latency().await;
        let net = self.network.read().map_err(|_| Self::lock_err())?;
        if net.unreachable_content.contains(&path.root) {
            return Err(ContentError::fetch(path, "no providers"));
        }
        let node = net
            .nodes
            .get(&path.root)
            .ok_or_else(|| ContentError::fetch(path, "unknown content"))?;
        let node = match (&path.entry, node) {
            (None, node) => node,
            (Some(entry), Node::Dir(entries)) => entries
                .get(entry)
                .and_then(|cid| net.nodes.get(cid))
                .ok_or_else(|| ContentError::fetch(path, "no such entry"))?,
            (Some(_), Node::File(_)) => {
                return Err(ContentError::fetch(path, "not a directory"));
            }
        };
        match node {
            Node::File(bytes) => Ok(bytes.clone()),
            Node::Dir(_) => Err(ContentError::fetch(path, "is a directory")),
        }
    }

    async fn add_document(
        &self,
        entries: &[DocumentEntry],
        options: &AddOptions,
    ) -> ContentResult<ContentId> {
        self.simulate_latency().await;
        if entries.is_empty() {
            return Err(ContentError::Rejected("no entries to add".into()));
        }
        if !options.wrap_with_directory && entries.len() > 1 {
            return Err(ContentError::Rejected(
                "multiple entries require wrap_with_directory".into(),
            ));
        }

        let mut net = self.network.write().map_err(|_| Self::lock_err())?;
        let mut listing = BTreeMap::new();
        let mut last = None;
        for entry in entries {
            let cid = derive_id("file", &entry.content);
            net.nodes
                .entry(cid.clone())
                .or_insert_with(|| Node::File(entry.content.clone()));
            listing.insert(entry.path.clone(), cid.clone());
            last = Some(cid);
        }

        let root = if options.wrap_with_directory {
            let cid = dir_id(&listing);
            net.nodes.entry(cid.clone()).or_insert(Node::Dir(listing));
            cid
        } else {
            last.ok_or_else(|| ContentError::Rejected("no entries to add".into()))?
        };
        if options.pin {
            net.pins.insert(root.clone());
        }
        debug!(root = %root.short(), entries = entries.len(), "document added");
        Ok(root)
    }

    async fn publish_name(
        &self,
        cid: &ContentId,
        options: &PublishOptions,
    ) -> ContentResult<PublishRecord> {
        self.simulate_latency().await;
        let mut net = self.network.write().map_err(|_| Self::lock_err())?;
        if !net.nodes.contains_key(cid) {
            return Err(ContentError::Rejected(format!("cannot publish unknown content {cid}")));
        }
        let record = NameRecord {
            value: cid.clone(),
            expires_at_ms: now_ms().saturating_add(options.lifetime.as_millis() as u64),
        };
        net.names.insert(self.self_id.clone(), record);
        Ok(PublishRecord {
            name: self.self_id.clone(),
            value: cid.clone(),
        })
    }

    async fn pin(&self, cid: &ContentId) -> ContentResult<()> {
        self.simulate_latency().await;
        let mut net = self.network.write().map_err(|_| Self::lock_err())?;
        if !net.nodes.contains_key(cid) {
            return Err(ContentError::NotFound(format!("content {cid}")));
        }
        net.pins.insert(cid.clone());
        Ok(())
    }
}
