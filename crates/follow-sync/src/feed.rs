//! Feed aggregation.
//!
//! A pass walks the following list of the self identity in order, resolves
//! each followed identity and each of its posts through the caches, and
//! merges the posts into the persisted feed. Failures are isolated per item:
//! an unreachable identity or post is recorded in the [`PassReport`] and
//! skipped, never aborting the pass.

use std::collections::HashSet;

use follow_types::{FeedPost, IdentityRecord};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::LocalCache;
use crate::error::SyncResult;
use crate::identity::{IdentityCache, IdentitySource};
use crate::post::PostCache;
use crate::report::{ItemStatus, PassReport};

/// Working feed of one pass: deduplicated by post timestamp, sorted
/// newest-first on [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct FeedBuilder {
    entries: Vec<FeedPost>,
    seen: HashSet<u64>,
}

impl FeedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously persisted feed.
    pub fn from_existing(feed: Vec<FeedPost>) -> Self {
        let mut builder = Self::new();
        for post in feed {
            builder.insert(post);
        }
        builder
    }

    /// Add `post` unless an entry with the same timestamp is present.
    pub fn insert(&mut self, post: FeedPost) -> bool {
        if !self.seen.insert(post.ts()) {
            return false;
        }
        self.entries.push(post);
        true
    }

    pub fn contains_ts(&self, ts: u64) -> bool {
        self.seen.contains(&ts)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(mut self) -> Vec<FeedPost> {
        self.entries.sort_by(|a, b| b.ts().cmp(&a.ts()));
        self.entries
    }
}

/// Result of one aggregation pass.
#[derive(Clone, Debug)]
pub struct FeedRefresh {
    pub feed: Vec<FeedPost>,
    pub report: PassReport,
}

/// Builds the feed of the self identity. At most one pass runs at a time.
pub struct FeedAggregator {
    identities: IdentityCache,
    posts: PostCache,
    cache: LocalCache,
    pass_lock: Mutex<()>,
}

impl FeedAggregator {
    pub fn new(identities: IdentityCache, posts: PostCache, cache: LocalCache) -> Self {
        Self {
            identities,
            posts,
            cache,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one aggregation pass over `me.following` and persist the result.
    ///
    /// `me` is the current self record; it is used directly for the self id
    /// so that posts committed since the last persist are not missed.
    pub async fn refresh(&self, me: &IdentityRecord) -> SyncResult<FeedRefresh> {
        let _pass = self.pass_lock.lock().await;
        let mut builder = FeedBuilder::from_existing(self.cache.load_feed()?);
        let mut report = PassReport::default();

        for id in &me.following {
            let resolved = if *id == me.id {
                self.cache.overlay(me).map(|entry| (entry, IdentitySource::Cached))
            } else {
                self.identities.resolve_or_placeholder(id).await
            };
            let (mut owner, source) = match resolved {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(id = %id.short(), error = %e, "skipping followed identity");
                    report.record_identity(id, ItemStatus::Skipped { reason: e.to_string() });
                    continue;
                }
            };
            report.record_identity(id, source.into());

            for cid in owner.record.posts.clone() {
                match self.posts.resolve(&mut owner, &cid).await {
                    Ok((post, source)) => {
                        let inserted = builder.insert(post);
                        report.record_post(id, &cid, source.into(), inserted);
                    }
                    Err(e) => {
                        warn!(owner = %id.short(), cid = %cid.short(), error = %e, "skipping post");
                        report.record_post(id, &cid, ItemStatus::Skipped { reason: e.to_string() }, false);
                    }
                }
            }
        }

        let feed = builder.finish();
        self.cache.save_feed(&feed)?;
        info!(
            entries = feed.len(),
            identities = report.identities.len(),
            placeholders = report.placeholders(),
            skipped_identities = report.skipped_identities(),
            fetched_posts = report.fetched_posts(),
            skipped_posts = report.skipped_posts(),
            "feed refreshed"
        );
        Ok(FeedRefresh { feed, report })
    }

    /// Re-fetch every followed identity other than self, keeping cached
    /// posts. Unreachable identities keep their cached record.
    pub async fn refresh_identities(&self, me: &IdentityRecord) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let mut report = PassReport::default();
        for id in me.following.iter().filter(|id| **id != me.id) {
            match self.identities.refresh(id).await {
                Ok(_) => report.record_identity(id, ItemStatus::Fetched),
                Err(e) => {
                    warn!(id = %id.short(), error = %e, "failed to refresh followed identity");
                    report.record_identity(id, ItemStatus::Skipped { reason: e.to_string() });
                }
            }
        }
        info!(
            refreshed = report.identities.len() - report.skipped_identities(),
            skipped = report.skipped_identities(),
            "following refreshed"
        );
        report
    }

    /// The persisted feed, without running a pass.
    pub fn current(&self) -> SyncResult<Vec<FeedPost>> {
        self.cache.load_feed()
    }
}

impl std::fmt::Debug for FeedAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedAggregator")
            .field("identities", &self.identities)
            .field("posts", &self.posts)
            .finish_non_exhaustive()
    }
}
