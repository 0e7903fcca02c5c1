use std::time::Duration;

use follow_types::{ContentId, IdentityId};
use serde::{Deserialize, Serialize};

/// Lifetime of a published name record: one year.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(8760 * 60 * 60);

/// One named entry of a document upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentEntry {
    pub path: String,
    pub content: Vec<u8>,
}

impl DocumentEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Options for [`crate::ContentStore::add_document`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddOptions {
    /// Retain the added content against garbage collection.
    pub pin: bool,
    /// Wrap the entries in a directory and return the directory's id.
    pub wrap_with_directory: bool,
    pub timeout: Duration,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            pin: true,
            wrap_with_directory: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Options for [`crate::ContentStore::publish_name`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOptions {
    pub lifetime: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_LIFETIME,
        }
    }
}

/// Result of publishing a name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub name: IdentityId,
    pub value: ContentId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_publish_policy() {
        let add = AddOptions::default();
        assert!(add.pin);
        assert!(add.wrap_with_directory);
        assert_eq!(add.timeout, Duration::from_secs(10));
        assert_eq!(PublishOptions::default().lifetime.as_secs(), 8760 * 3600);
    }
}
