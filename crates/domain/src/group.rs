//! Group model and the cross-group summary record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named container of participants sharing one spin state.
///
/// Everything except `name` is fixed at creation; the name is mutable only
/// through a manager-gated rename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub owner_user_id: Uuid,
    pub owner_email: String,
    pub owner_participant_id: Uuid,
}

/// Flat summary of a group as stored in the metadata index under
/// `group:{id}` and returned by the owned/member group listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub owner_user_id: Uuid,
    pub owner_email: String,
}

impl From<&Group> for GroupRecord {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            created_at: group.created_at,
            owner_user_id: group.owner_user_id,
            owner_email: group.owner_email.clone(),
        }
    }
}
