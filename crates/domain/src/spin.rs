//! Spin state, outcome history, pending-result compensation data, and the
//! weighted winner draw.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::participant::Participant;

/// Minimum number of active participants required to start a spin.
pub const MIN_ACTIVE_FOR_SPIN: usize = 2;

/// Whether a spin is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpinStatus {
    Idle,
    Spinning,
}

/// The group's spin state machine, as broadcast to clients.
///
/// While `spinning`, the winner is already decided; `duration_ms` and
/// `extra_turns` are presentation hints for the wheel animation. An idle
/// state keeps the last spin's fields until the result is saved or
/// discarded, after which only `resolved_at` survives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpinState {
    pub status: SpinStatus,
    pub spin_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub winner_participant_id: Option<Uuid>,
    pub duration_ms: Option<u64>,
    pub extra_turns: Option<u32>,
}

impl GroupSpinState {
    /// Idle state of a group that has never spun.
    pub fn initial() -> Self {
        Self {
            status: SpinStatus::Idle,
            spin_id: None,
            started_at: None,
            resolved_at: None,
            winner_participant_id: None,
            duration_ms: None,
            extra_turns: None,
        }
    }

    /// Idle state after a save/discard: spin-specific fields are cleared,
    /// the last resolution instant is kept.
    pub fn fresh_idle(resolved_at: Option<DateTime<Utc>>) -> Self {
        Self {
            resolved_at,
            ..Self::initial()
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.status == SpinStatus::Spinning
    }
}

/// One resolved spin, as kept in the bounded history ring.
///
/// `participants` snapshots every participant that was active at resolution
/// time, so past outcomes stay readable after roster changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpinHistoryItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub winner_participant_id: Uuid,
    pub participants: Vec<Participant>,
}

/// Reversible outcome of a resolved spin, alive until saved, discarded, or
/// expired. `counters` holds each affected participant's
/// `spins_since_last_won` as of just before resolution, which is exactly
/// what a discard restores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingResult {
    pub spin_id: Uuid,
    pub counters: HashMap<Uuid, u32>,
    pub expires_at: DateTime<Utc>,
}

impl PendingResult {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Draw weight of one participant: `max(1, spins_since_last_won + 1)`.
///
/// This is the sole source of bias: the longer a participant has gone
/// without winning, the heavier its slice of the wheel.
pub fn draw_weight(participant: &Participant) -> u64 {
    u64::from(participant.spins_since_last_won).saturating_add(1).max(1)
}

/// Picks a winner among the active participants by weighted draw.
///
/// Draws `x` uniformly in `[0, W)` and walks the roster in insertion order,
/// returning the first participant whose cumulative weight exceeds `x`;
/// boundary ties therefore resolve to the earlier participant.
pub fn pick_winner<R: Rng>(
    rng: &mut R,
    participants: &[Participant],
) -> Result<Uuid, DomainError> {
    let active: Vec<&Participant> = participants.iter().filter(|p| p.active).collect();
    if active.len() < MIN_ACTIVE_FOR_SPIN {
        return Err(DomainError::conflict(
            "At least 2 active participants are required to spin",
        ));
    }

    let total: u64 = active.iter().map(|p| draw_weight(p)).sum();
    if total == 0 {
        return Err(DomainError::internal("Degenerate spin weights"));
    }

    let x = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for participant in &active {
        cumulative += draw_weight(participant);
        if x < cumulative {
            return Ok(participant.id);
        }
    }

    // Unreachable: x < total and the cumulative sum reaches total.
    Err(DomainError::internal("Weighted draw fell through"))
}
