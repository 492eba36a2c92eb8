//! Versioned realtime event envelope broadcast to group subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::group::Group;
use crate::participant::Participant;
use crate::spin::GroupSpinState;

/// What a dismissed pending result was resolved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissAction {
    Save,
    Discard,
}

/// Envelope shared by every event on a group's stream:
/// `{type, groupId, version, ts, payload}`.
///
/// Events emitted by one state-change transaction share that transaction's
/// version; clients drop any non-snapshot event whose version is below the
/// last one they applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub group_id: Uuid,
    pub version: u64,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

/// Typed payload of an [`Event`]; the variant name is the wire `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum EventBody {
    #[serde(rename = "snapshot")]
    Snapshot {
        group: Group,
        participants: Vec<Participant>,
        spin: GroupSpinState,
    },

    #[serde(rename = "group.updated")]
    GroupUpdated { group: Group },

    #[serde(rename = "participant.added")]
    ParticipantAdded { participant: Participant },

    #[serde(rename = "participant.updated")]
    ParticipantUpdated { participant: Participant },

    #[serde(rename = "participant.removed")]
    ParticipantRemoved {
        #[serde(rename = "participantId")]
        participant_id: Uuid,
    },

    #[serde(rename = "spin.started")]
    SpinStarted { spin: GroupSpinState },

    #[serde(rename = "spin.resolved")]
    SpinResolved { spin: GroupSpinState },

    #[serde(rename = "spin.result.dismissed")]
    SpinResultDismissed {
        #[serde(rename = "spinId")]
        spin_id: Uuid,
        action: DismissAction,
    },
}

impl EventBody {
    /// Wire name of this event type.
    pub fn kind(&self) -> &'static str {
        match self {
            EventBody::Snapshot { .. } => "snapshot",
            EventBody::GroupUpdated { .. } => "group.updated",
            EventBody::ParticipantAdded { .. } => "participant.added",
            EventBody::ParticipantUpdated { .. } => "participant.updated",
            EventBody::ParticipantRemoved { .. } => "participant.removed",
            EventBody::SpinStarted { .. } => "spin.started",
            EventBody::SpinResolved { .. } => "spin.resolved",
            EventBody::SpinResultDismissed { .. } => "spin.result.dismissed",
        }
    }
}
