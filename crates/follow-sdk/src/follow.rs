use std::sync::Arc;

use follow_content::{ContentStore, DocumentEntry, KuboClient, TimeoutContentStore};
use follow_store::{DirLocalStore, LocalStore, FEED_KEY};
use follow_sync::{FeedRefresh, PassReport, SyncEngine, POST_DOCUMENT};
use follow_types::{now_ms, CachedIdentity, ContentId, FeedPost, IdentityId, IdentityRecord, PostRecord};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commit::{CommitReceipt, Committer};
use crate::config::FollowConfig;
use crate::edit::FieldEdit;
use crate::error::{SdkError, SdkResult};

/// Standalone page shipped next to every post so it can be opened directly
/// from a gateway.
const POST_VIEWER: &str = include_str!("viewer.html");
const POST_VIEWER_NAME: &str = "index.html";

/// A file attached to a new post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl PostFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// One identity instance: the self record, its caches, and the feed.
///
/// Every mutation runs to completion, persist and republish included, before
/// the next one starts.
pub struct Follow {
    config: FollowConfig,
    engine: SyncEngine,
    committer: Committer,
    me: Mutex<IdentityRecord>,
}

impl Follow {
    /// Open the instance backed by the content node and storage directory
    /// named in `config`.
    pub async fn connect(config: FollowConfig) -> SdkResult<Self> {
        let store = DirLocalStore::open(&config.storage_dir)?;
        let client = KuboClient::with_timeout(&config.api_url, Some(config.request_timeout()));
        let content = TimeoutContentStore::new(client, config.request_timeout());
        Self::open(config, Arc::new(store), Arc::new(content)).await
    }

    /// Open the instance on explicit backends.
    ///
    /// On first run a fresh self record following only itself is created,
    /// persisted and published.
    pub async fn open(
        config: FollowConfig,
        store: Arc<dyn LocalStore>,
        content: Arc<dyn ContentStore>,
    ) -> SdkResult<Self> {
        let self_id = content.self_id().await?;
        if self_id.is_empty() || self_id.as_str() == FEED_KEY {
            return Err(SdkError::InvalidOperation(format!(
                "content node reported an unusable identity id {self_id:?}"
            )));
        }

        let engine = SyncEngine::new(store, content.clone(), self_id.clone());
        let committer = Committer::new(
            engine.cache().clone(),
            content,
            config.request_timeout(),
            config.publish_lifetime(),
        );
        if engine.cache().ensure_feed()? {
            debug!("created empty feed");
        }

        let stored = engine.cache().load_identity(&self_id)?;
        let first_run = stored.is_none();
        let me = match stored {
            Some(entry) => {
                let mut record = entry.record;
                record.id = self_id.clone();
                if !record.follows(&self_id) {
                    record.following.insert(0, self_id.clone());
                }
                record
            }
            None => IdentityRecord::fresh(self_id.clone(), now_ms()),
        };

        let follow = Self {
            config,
            engine,
            committer,
            me: Mutex::new(me),
        };
        if first_run {
            info!(id = %self_id, "initializing new identity");
            let mut me = follow.me.lock().await;
            let next = me.clone();
            if let Err(e) = follow.commit_locked(&mut me, next).await {
                match e {
                    SdkError::Content(e) => warn!(error = %e, "initial publish failed, will retry on next commit"),
                    other => return Err(other),
                }
            }
        } else {
            info!(id = %self_id, "identity loaded");
        }
        Ok(follow)
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    // ---- Reads ----

    pub fn get_id(&self) -> &IdentityId {
        self.engine.self_id()
    }

    /// The self record in published form.
    pub async fn get_self(&self) -> IdentityRecord {
        self.me.lock().await.clone()
    }

    /// Any identity in published form; an unreachable one is returned as a
    /// placeholder.
    pub async fn get_identity(&self, id: &IdentityId) -> SdkResult<IdentityRecord> {
        if id == self.get_id() {
            return Ok(self.get_self().await);
        }
        let (entry, _) = self.engine.identities().resolve_or_placeholder(id).await?;
        Ok(entry.record)
    }

    /// Every followed identity, self included, in follow order.
    pub async fn get_following(&self) -> Vec<IdentityRecord> {
        let following = self.get_self().await.following;
        let mut out = Vec::with_capacity(following.len());
        for id in &following {
            match self.get_identity(id).await {
                Ok(record) => out.push(record),
                Err(e) => warn!(id = %id.short(), error = %e, "skipping followed identity"),
            }
        }
        out
    }

    pub async fn get_post(&self, id: &IdentityId, cid: &ContentId) -> SdkResult<FeedPost> {
        let mut owner = self.owner_entry(id).await?;
        let (post, _) = self.engine.posts().resolve(&mut owner, cid).await?;
        Ok(post)
    }

    /// Every post of `id` that can be resolved, newest first.
    pub async fn get_posts(&self, id: &IdentityId) -> SdkResult<Vec<FeedPost>> {
        let mut owner = self.owner_entry(id).await?;
        let mut out = Vec::with_capacity(owner.record.posts.len());
        for cid in owner.record.posts.clone() {
            match self.engine.posts().resolve(&mut owner, &cid).await {
                Ok((post, _)) => out.push(post),
                Err(e) => warn!(owner = %id.short(), cid = %cid.short(), error = %e, "skipping post"),
            }
        }
        Ok(out)
    }

    /// The feed as of the last aggregation pass.
    pub fn get_feed(&self) -> SdkResult<Vec<FeedPost>> {
        Ok(self.engine.feed().current()?)
    }

    async fn owner_entry(&self, id: &IdentityId) -> SdkResult<CachedIdentity> {
        if id == self.get_id() {
            let me = self.get_self().await;
            return Ok(self.engine.cache().overlay(&me)?);
        }
        let (entry, _) = self.engine.identities().resolve_or_placeholder(id).await?;
        Ok(entry)
    }

    // ---- Sync ----

    /// Re-fetch every followed identity.
    pub async fn update_following(&self) -> PassReport {
        let me = self.get_self().await;
        self.engine.feed().refresh_identities(&me).await
    }

    /// Run one feed aggregation pass.
    pub async fn update_feed(&self) -> SdkResult<FeedRefresh> {
        let me = self.get_self().await;
        Ok(self.engine.feed().refresh(&me).await?)
    }

    // ---- Mutations ----

    /// Apply a host `(key, value)` edit. Invalid edits are logged and ignored.
    pub async fn edit_field(&self, key: &str, value: &Value) -> SdkResult<Option<CommitReceipt>> {
        match FieldEdit::parse(key, value) {
            Ok(edit) => self.edit(edit).await.map(Some),
            Err(e @ SdkError::SchemaMismatch { .. }) => {
                warn!(key, error = %e, "ignoring identity edit");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn edit(&self, edit: FieldEdit) -> SdkResult<CommitReceipt> {
        let field = edit.key();
        let receipt = self
            .mutate(|me| {
                edit.apply(me);
                Ok(true)
            })
            .await?;
        debug!(field, "identity field edited");
        receipt.ok_or_else(|| SdkError::InvalidOperation("edit was not committed".into()))
    }

    /// Follow `id`. Returns `None` if it was already followed.
    pub async fn follow(&self, id: &IdentityId) -> SdkResult<Option<CommitReceipt>> {
        check_identity_id(id)?;
        self.mutate(|me| {
            if me.follows(id) {
                return Ok(false);
            }
            me.following.push(id.clone());
            Ok(true)
        })
        .await
    }

    /// Stop following `id`. Unfollowing self is refused as a no-op.
    pub async fn unfollow(&self, id: &IdentityId) -> SdkResult<Option<CommitReceipt>> {
        if id == self.get_id() {
            warn!("refusing to unfollow self");
            return Ok(None);
        }
        self.mutate(|me| {
            let before = me.following.len();
            me.following.retain(|f| f != id);
            Ok(me.following.len() != before)
        })
        .await
    }

    /// Publish a new post and prepend it to the self post list.
    pub async fn add_post(&self, body: impl Into<String>, files: Vec<PostFile>) -> SdkResult<ContentId> {
        let mut me = self.me.lock().await;
        let content = self.engine.content();
        let options = self.committer.upload_options();

        let mut post = PostRecord::new(body, me.id.clone(), now_ms());
        post.display_name = me.display_name.clone();
        if !files.is_empty() {
            let entries: Vec<DocumentEntry> = files
                .iter()
                .map(|f| DocumentEntry::new(f.name.clone(), f.content.clone()))
                .collect();
            let root = content.add_document(&entries, options).await?;
            debug!(root = %root.short(), files = files.len(), "post attachments uploaded");
            post.files = files.into_iter().map(|f| f.name).collect();
            post.files_root = root.to_string();
        }

        let bundle = [
            DocumentEntry::new(POST_DOCUMENT, post.to_document()?),
            DocumentEntry::new(POST_VIEWER_NAME, POST_VIEWER.as_bytes().to_vec()),
        ];
        let cid = content.add_document(&bundle, options).await?;
        cid.validate(self.config.content_id_len)?;

        let owner = self.engine.cache().overlay(&me)?;
        self.engine.cache().cache_post(&owner, &cid, &post)?;

        let mut next = me.clone();
        next.posts.insert(0, cid.clone());
        self.commit_locked(&mut me, next).await?;
        info!(cid = %cid.short(), files = post.files.len(), "post added");
        Ok(cid)
    }

    /// Remove `cid` from the self post list and drop its cached copy.
    pub async fn remove_post(&self, cid: &ContentId) -> SdkResult<Option<CommitReceipt>> {
        self.engine.cache().evict_post(self.get_id(), cid)?;
        self.mutate(|me| {
            let before = me.posts.len();
            me.posts.retain(|p| p != cid);
            Ok(me.posts.len() != before)
        })
        .await
    }

    /// Prepend another identity's post to the self post list.
    pub async fn repost(&self, cid: &ContentId) -> SdkResult<Option<CommitReceipt>> {
        if cid.is_empty() {
            return Err(SdkError::InvalidOperation("cannot repost an empty content id".into()));
        }
        self.mutate(|me| {
            if me.has_post(cid) {
                return Ok(false);
            }
            me.posts.insert(0, cid.clone());
            Ok(true)
        })
        .await
    }

    /// Republish the current self record without changing it.
    pub async fn publish_identity(&self) -> SdkResult<CommitReceipt> {
        let me = self.me.lock().await;
        self.committer.republish(&me).await
    }

    /// Apply `change` to a copy of the self record and commit it if it
    /// reports a change.
    async fn mutate<F>(&self, change: F) -> SdkResult<Option<CommitReceipt>>
    where
        F: FnOnce(&mut IdentityRecord) -> SdkResult<bool>,
    {
        let mut me = self.me.lock().await;
        let mut next = me.clone();
        if !change(&mut next)? {
            debug!("no change, skipping commit");
            return Ok(None);
        }
        self.commit_locked(&mut me, next).await.map(Some)
    }

    /// Persist `next`, republish it, then swap it in.
    ///
    /// The in-memory record keeps its pre-commit fields unless both steps
    /// succeed, so retrying a failed mutation commits it again. A record that
    /// was persisted but not published is picked up by the next successful
    /// commit or publish.
    async fn commit_locked(&self, me: &mut IdentityRecord, mut next: IdentityRecord) -> SdkResult<CommitReceipt> {
        next.id = self.get_id().clone();
        self.committer.persist(&mut next)?;
        let receipt = self.committer.republish(&next).await?;
        info!(
            ts = next.ts,
            following = next.following.len(),
            posts = next.posts.len(),
            "identity committed"
        );
        *me = next;
        Ok(receipt)
    }
}

fn check_identity_id(id: &IdentityId) -> SdkResult<()> {
    if id.is_empty() {
        return Err(SdkError::InvalidOperation("empty identity id".into()));
    }
    if id.as_str() == FEED_KEY {
        return Err(SdkError::InvalidOperation(format!("{FEED_KEY:?} is not an identity id")));
    }
    Ok(())
}

impl std::fmt::Debug for Follow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Follow")
            .field("id", self.get_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
