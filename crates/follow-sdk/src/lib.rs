//! High-level SDK for Follow.
//!
//! [`Follow`] is the entry point for hosts: it owns the self identity,
//! serializes every mutation through persist-then-republish, and exposes the
//! read and sync operations of the engine.

pub mod commit;
pub mod config;
pub mod edit;
pub mod error;
pub mod follow;

pub use commit::CommitReceipt;
pub use config::FollowConfig;
pub use edit::FieldEdit;
pub use error::{SdkError, SdkResult};
pub use follow::{Follow, PostFile};

// Re-export key types
pub use follow_sync::{FeedRefresh, ItemStatus, PassReport};
pub use follow_types::{ContentId, FeedPost, IdentityId, IdentityRecord, PostRecord, TagValue};
