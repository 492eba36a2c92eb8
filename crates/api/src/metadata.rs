//! Cross-group metadata index maintenance.
//!
//! The router keeps a flat KV in sync after mutations: a `group:{id}`
//! summary record, `owner-group:` and `participant-group:` presence keys,
//! and per-user bookmark lists. Index writes are best-effort: failures are
//! logged and the request still succeeds, because the actor state is the
//! source of truth and the index can be rebuilt from it.

use std::collections::BTreeSet;
use std::sync::Arc;

use domain::group::{Group, GroupRecord};
use domain::participant::Participant;
use store::MetadataStore;
use tracing::warn;
use uuid::Uuid;

use crate::identity::Identity;

/// Most group ids kept per bookmark list.
const BOOKMARKS_CAP: usize = 100;

pub struct MetadataIndex {
    store: Arc<dyn MetadataStore>,
}

impl MetadataIndex {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    fn group_key(group_id: Uuid) -> String {
        format!("group:{group_id}")
    }

    fn owner_key(owner_user_id: Uuid, group_id: Uuid) -> String {
        format!("owner-group:{owner_user_id}:{group_id}")
    }

    fn email_key(email: &str, group_id: Uuid) -> String {
        format!("participant-group:{email}:{group_id}")
    }

    fn email_index_key(group_id: Uuid) -> String {
        format!("participant-index:{group_id}")
    }

    fn bookmarks_key(user_id: Uuid) -> String {
        format!("bookmarks:{user_id}")
    }

    /// Writes the creation-time records for a new group.
    pub async fn on_group_created(&self, group: &Group, participants: &[Participant]) {
        if let Err(err) = self
            .store
            .put(&Self::owner_key(group.owner_user_id, group.id), "1")
            .await
        {
            warn!(group_id = %group.id, error = %err, "owner index write failed");
        }
        self.sync_group(group, participants).await;
    }

    /// Refreshes the summary record and diffs the email membership index
    /// against the authoritative roster.
    ///
    /// The previous email set is read back from `participant-index:{id}`
    /// rather than the live keys, which keeps the diff deterministic even
    /// after partial failures.
    pub async fn sync_group(&self, group: &Group, participants: &[Participant]) {
        let record = GroupRecord::from(group);
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(err) = self.store.put(&Self::group_key(group.id), &json).await {
                    warn!(group_id = %group.id, error = %err, "group record write failed");
                }
            }
            Err(err) => {
                warn!(group_id = %group.id, error = %err, "group record serialization failed");
            }
        }

        let previous: BTreeSet<String> = match self
            .store
            .get(&Self::email_index_key(group.id))
            .await
        {
            Ok(Some(json)) => serde_json::from_str::<Vec<String>>(&json)
                .map(|emails| emails.into_iter().collect())
                .unwrap_or_default(),
            Ok(None) => BTreeSet::new(),
            Err(err) => {
                warn!(group_id = %group.id, error = %err, "email index read failed");
                return;
            }
        };

        let current: BTreeSet<String> = participants
            .iter()
            .filter_map(|p| p.email_id.clone())
            .collect();

        for removed in previous.difference(&current) {
            if let Err(err) = self.store.delete(&Self::email_key(removed, group.id)).await {
                warn!(group_id = %group.id, error = %err, "email index delete failed");
            }
        }
        for added in current.difference(&previous) {
            if let Err(err) = self.store.put(&Self::email_key(added, group.id), "1").await {
                warn!(group_id = %group.id, error = %err, "email index write failed");
            }
        }

        let sorted: Vec<&String> = current.iter().collect();
        match serde_json::to_string(&sorted) {
            Ok(json) => {
                if let Err(err) = self
                    .store
                    .put(&Self::email_index_key(group.id), &json)
                    .await
                {
                    warn!(group_id = %group.id, error = %err, "email index write failed");
                }
            }
            Err(err) => {
                warn!(group_id = %group.id, error = %err, "email index serialization failed");
            }
        }
    }

    /// All group records the identity owns or belongs to by verified email.
    pub async fn groups_for(&self, identity: &Identity) -> Vec<GroupRecord> {
        let mut group_ids = BTreeSet::new();

        match self
            .store
            .list(&format!("owner-group:{}:", identity.user_id))
            .await
        {
            Ok(entries) => {
                group_ids.extend(entries.iter().filter_map(|(key, _)| id_suffix(key)));
            }
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "owner index scan failed");
            }
        }

        for email in &identity.verified_emails {
            let normalized = email.trim().to_lowercase();
            match self
                .store
                .list(&format!("participant-group:{normalized}:"))
                .await
            {
                Ok(entries) => {
                    group_ids.extend(entries.iter().filter_map(|(key, _)| id_suffix(key)));
                }
                Err(err) => {
                    warn!(user_id = %identity.user_id, error = %err, "email index scan failed");
                }
            }
        }

        let mut records = Vec::new();
        for group_id in group_ids {
            match self.store.get(&Self::group_key(group_id)).await {
                Ok(Some(json)) => match serde_json::from_str::<GroupRecord>(&json) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        warn!(group_id = %group_id, error = %err, "group record is unreadable");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    warn!(group_id = %group_id, error = %err, "group record read failed");
                }
            }
        }
        records
    }

    /// Stored bookmark list, oldest first.
    pub async fn bookmarks(&self, user_id: Uuid) -> Vec<Uuid> {
        match self.store.get(&Self::bookmarks_key(user_id)).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "bookmarks read failed");
                Vec::new()
            }
        }
    }

    /// Replaces the bookmark list, deduplicated in first-seen order and
    /// capped. Returns the normalized list as stored.
    pub async fn put_bookmarks(&self, user_id: Uuid, group_ids: &[Uuid]) -> Vec<Uuid> {
        let mut seen = BTreeSet::new();
        let normalized: Vec<Uuid> = group_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .take(BOOKMARKS_CAP)
            .copied()
            .collect();

        match serde_json::to_string(&normalized) {
            Ok(json) => {
                if let Err(err) = self.store.put(&Self::bookmarks_key(user_id), &json).await {
                    warn!(user_id = %user_id, error = %err, "bookmarks write failed");
                }
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "bookmarks serialization failed");
            }
        }
        normalized
    }
}

/// Extracts the trailing `:{uuid}` segment of an index key.
fn id_suffix(key: &str) -> Option<Uuid> {
    key.rsplit(':').next().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store::MemoryMetadataStore;

    fn index() -> (MetadataIndex, Arc<MemoryMetadataStore>) {
        let store = Arc::new(MemoryMetadataStore::new());
        (MetadataIndex::new(store.clone()), store)
    }

    fn group(owner_user_id: Uuid) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "Squad".to_string(),
            created_at: Utc::now(),
            owner_user_id,
            owner_email: "owner@x".to_string(),
            owner_participant_id: Uuid::new_v4(),
        }
    }

    fn participant(email: Option<&str>) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: format!("p-{}", Uuid::new_v4().simple()),
            active: true,
            email_id: email.map(str::to_string),
            manager: false,
            spins_since_last_won: 0,
        }
    }

    fn identity(user_id: Uuid, emails: &[&str]) -> Identity {
        Identity {
            user_id,
            verified_emails: emails.iter().map(|e| e.to_string()).collect(),
            primary_email: emails.first().unwrap_or(&"").to_string(),
            display_name: "T".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sync_group_diffs_email_keys() {
        let (index, store) = index();
        let group = group(Uuid::new_v4());

        let roster = vec![participant(Some("ada@x")), participant(Some("ben@x"))];
        index.sync_group(&group, &roster).await;
        assert!(store
            .get(&format!("participant-group:ada@x:{}", group.id))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get(&format!("participant-group:ben@x:{}", group.id))
            .await
            .unwrap()
            .is_some());

        // Ben loses his email, Cid appears.
        let roster = vec![participant(Some("ada@x")), participant(Some("cid@x"))];
        index.sync_group(&group, &roster).await;
        assert!(store
            .get(&format!("participant-group:ben@x:{}", group.id))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get(&format!("participant-group:cid@x:{}", group.id))
            .await
            .unwrap()
            .is_some());

        let sorted: Vec<String> = serde_json::from_str(
            &store
                .get(&format!("participant-index:{}", group.id))
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(sorted, vec!["ada@x".to_string(), "cid@x".to_string()]);
    }

    #[tokio::test]
    async fn test_groups_for_unions_owned_and_member() {
        let (index, _) = index();
        let owner_id = Uuid::new_v4();

        let owned = group(owner_id);
        index.on_group_created(&owned, &[]).await;

        let member_of = group(Uuid::new_v4());
        index
            .on_group_created(&member_of, &[participant(Some("me@x"))])
            .await;

        let unrelated = group(Uuid::new_v4());
        index.on_group_created(&unrelated, &[]).await;

        let records = index.groups_for(&identity(owner_id, &["me@x"])).await;
        let mut ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        ids.sort();
        let mut expected = vec![owned.id, member_of.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_bookmarks_dedupe_and_round_trip() {
        let (index, _) = index();
        let user_id = Uuid::new_v4();
        assert!(index.bookmarks(user_id).await.is_empty());

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stored = index.put_bookmarks(user_id, &[a, b, a]).await;
        assert_eq!(stored, vec![a, b]);
        assert_eq!(index.bookmarks(user_id).await, vec![a, b]);
    }
}
