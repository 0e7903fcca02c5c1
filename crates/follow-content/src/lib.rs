//! Content network client for Follow.
//!
//! The engine treats the content-addressed network as an abstract capability:
//! immutable documents are added and fetched by content id, and each identity
//! publishes a mutable pointer (its name) to the content id of its latest
//! identity document. This crate defines that capability as the
//! [`ContentStore`] trait and ships three implementations:
//!
//! - [`InMemoryContentStore`] -- deterministic in-process network for tests
//!   and embedding, with name lifetimes and injectable unreachability
//! - [`TimeoutContentStore`] -- wrapper bounding every call by a deadline
//! - [`KuboClient`] -- HTTP RPC adapter for a local content node

pub mod error;
pub mod kubo;
pub mod memory;
pub mod timeout;
pub mod traits;
pub mod types;

pub use error::{ContentError, ContentResult};
pub use kubo::{KuboClient, DEFAULT_API_URL};
pub use memory::InMemoryContentStore;
pub use timeout::TimeoutContentStore;
pub use traits::ContentStore;
pub use types::{AddOptions, DocumentEntry, PublishOptions, PublishRecord, DEFAULT_LIFETIME};
