use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Expected length of a content id in the `Qm…` base58 addressing scheme.
pub const DEFAULT_CONTENT_ID_LEN: usize = 46;

/// Stable identifier of a publishing identity.
///
/// The id doubles as the identity's published name: resolving it on the
/// content network yields the content id of the identity's latest document.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short form for log lines (first 12 characters).
    pub fn short(&self) -> &str {
        short(&self.0)
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({})", self.short())
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content-addressed identifier of an immutable document or bundle.
///
/// The mapping from a content id to its bytes never changes, which is what
/// lets fetched posts be memoized forever.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn short(&self) -> &str {
        short(&self.0)
    }

    /// Check that this id has the shape produced by the addressing scheme:
    /// `expected_len` ASCII alphanumeric characters.
    pub fn validate(&self, expected_len: usize) -> Result<(), TypeError> {
        if self.0.len() != expected_len {
            return Err(TypeError::MalformedContentId {
                id: self.0.clone(),
                reason: format!("expected length {expected_len}, got {}", self.0.len()),
            });
        }
        if !self.0.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypeError::MalformedContentId {
                id: self.0.clone(),
                reason: "non-alphanumeric character".into(),
            });
        }
        Ok(())
    }

    /// Path to a named entry inside the bundle rooted at this id.
    pub fn join(&self, name: impl Into<String>) -> ContentPath {
        ContentPath {
            root: self.clone(),
            entry: Some(name.into()),
        }
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Address of fetchable bytes: a content id, optionally followed by the name
/// of an entry inside the bundle it roots (`<cid>/post.json`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentPath {
    pub root: ContentId,
    pub entry: Option<String>,
}

impl ContentPath {
    /// Parse `<cid>` or `<cid>/<entry>`, tolerating a leading `/ipfs/`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("/ipfs/").unwrap_or(s);
        let (root, entry) = match s.split_once('/') {
            Some((root, entry)) if !entry.is_empty() => (root, Some(entry.to_string())),
            Some((root, _)) => (root, None),
            None => (s, None),
        };
        if root.is_empty() {
            return Err(TypeError::EmptyId);
        }
        Ok(Self {
            root: ContentId::new(root),
            entry,
        })
    }
}

impl From<ContentId> for ContentPath {
    fn from(root: ContentId) -> Self {
        Self { root, entry: None }
    }
}

impl From<&ContentId> for ContentPath {
    fn from(root: &ContentId) -> Self {
        Self {
            root: root.clone(),
            entry: None,
        }
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}/{}", self.root, entry),
            None => write!(f, "{}", self.root),
        }
    }
}

fn short(s: &str) -> &str {
    match s.char_indices().nth(12) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    #[test]
    fn well_formed_id_validates() {
        let id = ContentId::new(WELL_FORMED);
        assert_eq!(WELL_FORMED.len(), DEFAULT_CONTENT_ID_LEN);
        assert!(id.validate(DEFAULT_CONTENT_ID_LEN).is_ok());
    }

    #[test]
    fn wrong_length_is_malformed() {
        let id = ContentId::new("QmShort");
        let err = id.validate(DEFAULT_CONTENT_ID_LEN).unwrap_err();
        assert!(matches!(err, TypeError::MalformedContentId { .. }));
    }

    #[test]
    fn non_alphanumeric_is_malformed() {
        let mut s = WELL_FORMED.to_string();
        s.replace_range(10..11, "/");
        let err = ContentId::new(s).validate(DEFAULT_CONTENT_ID_LEN).unwrap_err();
        assert!(matches!(err, TypeError::MalformedContentId { .. }));
    }

    #[test]
    fn empty_is_malformed() {
        assert!(ContentId::default().validate(DEFAULT_CONTENT_ID_LEN).is_err());
    }

    #[test]
    fn join_and_display() {
        let path = ContentId::new("QmRoot").join("post.json");
        assert_eq!(path.to_string(), "QmRoot/post.json");
        let bare: ContentPath = ContentId::new("QmRoot").into();
        assert_eq!(bare.to_string(), "QmRoot");
    }

    #[test]
    fn parse_paths() {
        let p = ContentPath::parse("/ipfs/QmRoot/identity.json").unwrap();
        assert_eq!(p.root.as_str(), "QmRoot");
        assert_eq!(p.entry.as_deref(), Some("identity.json"));

        let p = ContentPath::parse("QmRoot").unwrap();
        assert!(p.entry.is_none());

        let p = ContentPath::parse("QmRoot/").unwrap();
        assert!(p.entry.is_none());

        assert_eq!(ContentPath::parse("").unwrap_err(), TypeError::EmptyId);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = IdentityId::new("QmPeer");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"QmPeer\"");
        let cid: ContentId = serde_json::from_str("\"QmPost\"").unwrap();
        assert_eq!(cid.as_str(), "QmPost");
    }

    #[test]
    fn short_truncates() {
        let id = IdentityId::new("QmAbcdefghijklmnop");
        assert_eq!(id.short(), "QmAbcdefghij");
        assert_eq!(IdentityId::new("abc").short(), "abc");
    }
}
