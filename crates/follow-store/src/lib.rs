//! Local durable document storage for Follow.
//!
//! This crate mirrors documents fetched from the content network onto the
//! local machine. It is a plain key → JSON document store: the keys are
//! identity ids plus one reserved key for the feed snapshot, and the values
//! are whatever the engine chooses to persist.
//!
//! # Storage Backends
//!
//! All backends implement the [`LocalStore`] trait:
//!
//! - [`InMemoryLocalStore`] -- `HashMap`-based store for tests and embedding
//! - [`DirLocalStore`] -- one JSON file per key inside a storage directory
//!
//! # Design Rules
//!
//! 1. A missing key is `Ok(None)`, never an error.
//! 2. `put` replaces the whole document; there are no partial updates.
//! 3. The store never interprets document contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod dir;
pub mod error;
pub mod memory;
pub mod traits;

pub use dir::DirLocalStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryLocalStore;
pub use traits::{LocalStore, FEED_KEY};
