//! Participant model and roster mutation payloads.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A named member of a group.
///
/// `email_id` optionally links the participant to a verified identity email;
/// `manager` can only be set while an email is present. `spins_since_last_won`
/// drives the weighted draw and is maintained exclusively by spin resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub email_id: Option<String>,
    pub manager: bool,
    pub spins_since_last_won: u32,
}

/// Payload for adding a participant.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewParticipant {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,

    #[serde(default)]
    pub email_id: Option<String>,

    #[serde(default)]
    pub manager: bool,
}

/// Patch for an existing participant. Fields left out of the request stay
/// untouched; `email_id` distinguishes "absent" from an explicit `null`
/// (which clears the email and therefore the manager flag).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPatch {
    #[serde(default)]
    pub active: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    pub email_id: Option<Option<String>>,

    #[serde(default)]
    pub manager: Option<bool>,
}

impl ParticipantPatch {
    /// True when the patch carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.email_id.is_none() && self.manager.is_none()
    }
}

/// One entry of the atomic roster commit's `updates` set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterUpdate {
    pub participant_id: Uuid,

    #[serde(flatten)]
    pub patch: ParticipantPatch,
}

/// Atomic multi-operation roster change: removes, then updates, then adds.
/// Validated as a whole; either every entry applies or none do.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RosterCommit {
    #[serde(default)]
    #[validate(nested)]
    pub adds: Vec<NewParticipant>,

    #[serde(default)]
    pub updates: Vec<RosterUpdate>,

    #[serde(default)]
    pub removes: Vec<Uuid>,
}

impl RosterCommit {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }
}

/// Deserializes a present-but-null field as `Some(None)`, leaving absent
/// fields to the `default` attribute (`None`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
