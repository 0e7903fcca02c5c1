use follow_types::{ContentId, IdentityId};
use serde::Serialize;

/// How a single item was obtained during an aggregation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Served from the local store without a network call.
    Cached,
    /// Fetched from the content network.
    Fetched,
    /// The identity is unreachable; a stand-in record was used.
    Placeholder,
    /// The item failed and was left out of the feed.
    Skipped { reason: String },
}

impl ItemStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdentityOutcome {
    pub id: IdentityId,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostOutcome {
    pub owner: IdentityId,
    pub cid: ContentId,
    #[serde(flatten)]
    pub status: ItemStatus,
    /// `false` when a post with the same timestamp was already in the feed.
    pub inserted: bool,
}

/// Outcome of one feed refresh, item by item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub identities: Vec<IdentityOutcome>,
    pub posts: Vec<PostOutcome>,
}

impl PassReport {
    pub fn record_identity(&mut self, id: &IdentityId, status: ItemStatus) {
        self.identities.push(IdentityOutcome {
            id: id.clone(),
            status,
        });
    }

    pub fn record_post(&mut self, owner: &IdentityId, cid: &ContentId, status: ItemStatus, inserted: bool) {
        self.posts.push(PostOutcome {
            owner: owner.clone(),
            cid: cid.clone(),
            status,
            inserted,
        });
    }

    pub fn skipped_identities(&self) -> usize {
        self.identities.iter().filter(|o| o.status.is_skipped()).count()
    }

    pub fn placeholders(&self) -> usize {
        self.identities
            .iter()
            .filter(|o| o.status == ItemStatus::Placeholder)
            .count()
    }

    pub fn skipped_posts(&self) -> usize {
        self.posts.iter().filter(|o| o.status.is_skipped()).count()
    }

    pub fn fetched_posts(&self) -> usize {
        self.posts
            .iter()
            .filter(|o| o.status == ItemStatus::Fetched)
            .count()
    }

    pub fn inserted_posts(&self) -> usize {
        self.posts.iter().filter(|o| o.inserted).count()
    }

    /// `true` if every item was resolved.
    pub fn is_complete(&self) -> bool {
        self.skipped_identities() == 0 && self.skipped_posts() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        let mut report = PassReport::default();
        report.record_identity(&"QmA".into(), ItemStatus::Cached);
        report.record_identity(&"QmB".into(), ItemStatus::Placeholder);
        report.record_post(&"QmA".into(), &"QmP1".into(), ItemStatus::Fetched, true);
        report.record_post(&"QmA".into(), &"QmP2".into(), ItemStatus::Cached, false);
        report.record_post(
            &"QmA".into(),
            &"QmP3".into(),
            ItemStatus::Skipped { reason: "timeout".into() },
            false,
        );

        assert_eq!(report.placeholders(), 1);
        assert_eq!(report.skipped_identities(), 0);
        assert_eq!(report.fetched_posts(), 1);
        assert_eq!(report.inserted_posts(), 1);
        assert_eq!(report.skipped_posts(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn serializes_flat_outcomes() {
        let mut report = PassReport::default();
        report.record_identity(&"QmA".into(), ItemStatus::Skipped { reason: "gone".into() });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["identities"][0]["id"], "QmA");
        assert_eq!(json["identities"][0]["status"], "skipped");
        assert_eq!(json["identities"][0]["reason"], "gone");
    }
}
