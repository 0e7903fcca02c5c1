//! Synchronization engine for Follow.
//!
//! Reconciles the local store against the content network:
//!
//! - [`IdentityCache`] resolves identity ids, local store first, with
//!   placeholder fallback for identities that cannot be reached
//! - [`PostCache`] resolves post content ids, memoized per owning identity
//! - [`FeedAggregator`] merges the posts of every followed identity into one
//!   deduplicated, newest-first feed and reports per-item outcomes
//!
//! [`LocalCache`] owns the layout of documents in the local store and
//! [`SyncEngine`] wires all of the above to one store and one network.

pub mod cache;
pub mod engine;
pub mod error;
pub mod feed;
pub mod identity;
pub mod post;
pub mod report;

pub use cache::LocalCache;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use feed::{FeedAggregator, FeedBuilder, FeedRefresh};
pub use identity::{IdentityCache, IdentitySource, IDENTITY_DOCUMENT};
pub use post::{PostCache, PostSource, POST_DOCUMENT};
pub use report::{IdentityOutcome, ItemStatus, PassReport, PostOutcome};
