//! Foundation types for Follow.
//!
//! This crate provides the identity, post, and feed records shared by every
//! other Follow crate, together with the string identifiers used to address
//! them on the content network.
//!
//! # Key Types
//!
//! - [`IdentityId`]: Stable identifier of a publishing identity (its name)
//! - [`ContentId`]: Content-addressed identifier of an immutable document
//! - [`IdentityRecord`]: The published identity document
//! - [`CachedIdentity`]: An identity record plus its local-only post cache
//! - [`PostRecord`]: An immutable post document
//! - [`FeedPost`]: A post with the display fields attached at read time
//! - [`TagValue`]: Opaque passthrough value for `meta` and `aux` fields

pub mod clock;
pub mod error;
pub mod id;
pub mod identity;
pub mod post;
pub mod tag;

pub use clock::now_ms;
pub use error::TypeError;
pub use id::{ContentId, ContentPath, IdentityId, DEFAULT_CONTENT_ID_LEN};
pub use identity::{CachedIdentity, IdentityRecord, IdentitySnapshot};
pub use post::{FeedPost, PostRecord};
pub use tag::{AuxMap, TagValue};
