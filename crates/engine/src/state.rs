//! The group's mutable state and every transition over it.
//!
//! All methods here are synchronous and run exclusively inside the owning
//! actor task, so each one is a complete transaction: it either fails with
//! no change or mutates the state and returns the events to broadcast.
//! Events of one transaction share a single freshly bumped version.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use domain::error::DomainError;
use domain::event::{DismissAction, Event, EventBody};
use domain::group::Group;
use domain::normalize::{fold_name, normalize_email, normalize_name};
use domain::participant::{NewParticipant, Participant, ParticipantPatch, RosterCommit};
use domain::spin::{pick_winner, GroupSpinState, PendingResult, SpinHistoryItem, SpinStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;

/// Resolved spins kept in the history ring.
pub const HISTORY_CAP: usize = 20;

/// Complete state of one group. Serialized as-is for checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupState {
    pub group: Group,
    pub participants: Vec<Participant>,
    pub spin: GroupSpinState,
    /// Insertion order; newest entry last.
    pub history: Vec<SpinHistoryItem>,
    pub pending: Option<PendingResult>,
    pub version: u64,
}

impl GroupState {
    /// Assembles a brand-new group with its owner participant.
    ///
    /// The owner participant's name comes from the identity's display name,
    /// falling back to the email local part when that does not survive
    /// normalization.
    pub fn create(
        name_raw: &str,
        owner_user_id: Uuid,
        owner_email_raw: &str,
        owner_display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = normalize_name(name_raw)?;
        let owner_email = normalize_email(owner_email_raw)?;
        let local_part = owner_email.split('@').next().unwrap_or("");
        let owner_name = normalize_name(owner_display_name)
            .or_else(|_| normalize_name(local_part))
            .unwrap_or_else(|_| "Owner".to_string());

        let owner_participant = Participant {
            id: Uuid::new_v4(),
            name: owner_name,
            active: true,
            email_id: Some(owner_email.clone()),
            manager: true,
            spins_since_last_won: 0,
        };
        let group = Group {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            owner_user_id,
            owner_email,
            owner_participant_id: owner_participant.id,
        };

        Ok(Self {
            group,
            participants: vec![owner_participant],
            spin: GroupSpinState::initial(),
            history: Vec::new(),
            pending: None,
            version: 0,
        })
    }

    /// Snapshot event body for a freshly attached subscriber.
    pub fn snapshot_body(&self) -> EventBody {
        EventBody::Snapshot {
            group: self.group.clone(),
            participants: self.participants.clone(),
            spin: self.spin.clone(),
        }
    }

    /// History newest-first, as served to clients.
    pub fn history_newest_first(&self) -> Vec<SpinHistoryItem> {
        self.history.iter().rev().cloned().collect()
    }

    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn is_owner_participant(&self, id: Uuid) -> bool {
        id == self.group.owner_participant_id
    }

    /// Bumps the version and stamps the envelopes. Transactions that emit
    /// nothing do not advance the version.
    fn emit(&mut self, now: DateTime<Utc>, bodies: Vec<EventBody>) -> Vec<Event> {
        if bodies.is_empty() {
            return Vec::new();
        }
        self.version += 1;
        let version = self.version;
        let group_id = self.group.id;
        bodies
            .into_iter()
            .map(|body| Event {
                group_id,
                version,
                ts: now,
                body,
            })
            .collect()
    }

    // =========================================================================
    // Group
    // =========================================================================

    pub fn rename(
        &mut self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<(Group, Vec<Event>), DomainError> {
        let name = normalize_name(raw)?;
        self.group.name = name;
        let group = self.group.clone();
        let events = self.emit(now, vec![EventBody::GroupUpdated {
            group: group.clone(),
        }]);
        Ok((group, events))
    }

    // =========================================================================
    // Roster
    // =========================================================================

    pub fn add_participant(
        &mut self,
        new: NewParticipant,
        now: DateTime<Utc>,
    ) -> Result<(Participant, Vec<Event>), DomainError> {
        let participant = build_participant(&self.participants, &new)?;
        self.participants.push(participant.clone());
        let events = self.emit(now, vec![EventBody::ParticipantAdded {
            participant: participant.clone(),
        }]);
        Ok((participant, events))
    }

    pub fn update_participant(
        &mut self,
        id: Uuid,
        patch: ParticipantPatch,
        now: DateTime<Utc>,
    ) -> Result<(Participant, Vec<Event>), DomainError> {
        let owner_id = self.group.owner_participant_id;
        let updated = apply_patch(&mut self.participants, id, &patch, owner_id)?;
        let events = self.emit(now, vec![EventBody::ParticipantUpdated {
            participant: updated.clone(),
        }]);
        Ok((updated, events))
    }

    pub fn remove_participant(
        &mut self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, DomainError> {
        if self.is_owner_participant(id) {
            return Err(DomainError::validation(
                "The owner participant cannot be removed",
            ));
        }
        let index = self
            .participants
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| DomainError::not_found("Participant not found"))?;
        self.participants.remove(index);
        Ok(self.emit(now, vec![EventBody::ParticipantRemoved {
            participant_id: id,
        }]))
    }

    /// Atomic roster commit: validates the whole batch, then applies
    /// removes, updates, and adds in that order. Event order matches the
    /// application order, all under one version.
    pub fn commit_roster(
        &mut self,
        commit: RosterCommit,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Participant>, Vec<Event>), DomainError> {
        let owner_id = self.group.owner_participant_id;

        let mut remove_set = HashSet::new();
        for id in &commit.removes {
            if self.is_owner_participant(*id) {
                return Err(DomainError::validation(
                    "The owner participant cannot be removed",
                ));
            }
            if self.participant(*id).is_none() {
                return Err(DomainError::not_found("Participant not found"));
            }
            if !remove_set.insert(*id) {
                return Err(DomainError::validation(
                    "Duplicate participant in removes",
                ));
            }
        }

        let mut update_set = HashSet::new();
        for update in &commit.updates {
            let id = update.participant_id;
            if self.participant(id).is_none() {
                return Err(DomainError::not_found("Participant not found"));
            }
            if remove_set.contains(&id) {
                return Err(DomainError::validation(
                    "Participant appears in both updates and removes",
                ));
            }
            if !update_set.insert(id) {
                return Err(DomainError::validation(
                    "Duplicate participant in updates",
                ));
            }
        }

        // Stage everything on a copy; the live roster changes only if the
        // whole batch is valid.
        let mut staged: Vec<Participant> = self
            .participants
            .iter()
            .filter(|p| !remove_set.contains(&p.id))
            .cloned()
            .collect();

        let mut bodies: Vec<EventBody> = commit
            .removes
            .iter()
            .map(|id| EventBody::ParticipantRemoved { participant_id: *id })
            .collect();

        for update in &commit.updates {
            let updated = apply_patch(&mut staged, update.participant_id, &update.patch, owner_id)?;
            bodies.push(EventBody::ParticipantUpdated {
                participant: updated,
            });
        }

        for new in &commit.adds {
            let participant = build_participant(&staged, new)?;
            staged.push(participant.clone());
            bodies.push(EventBody::ParticipantAdded { participant });
        }

        self.participants = staged.clone();
        let events = self.emit(now, bodies);
        Ok((staged, events))
    }

    // =========================================================================
    // Spin
    // =========================================================================

    /// Starts a spin: the winner is drawn up front, the animation timing is
    /// picked from the actor's RNG, and the spinning state is broadcast.
    pub fn start_spin<R: Rng>(
        &mut self,
        rng: &mut R,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<(GroupSpinState, Vec<Event>), DomainError> {
        if self.spin.is_spinning() {
            return Err(DomainError::conflict("Spin already running"));
        }

        let winner = pick_winner(rng, &self.participants)?;
        let duration_ms = rng.gen_range(config.spin_duration_ms.clone());
        let extra_turns = rng.gen_range(config.extra_turns.clone());

        self.spin = GroupSpinState {
            status: SpinStatus::Spinning,
            spin_id: Some(Uuid::new_v4()),
            started_at: Some(now),
            resolved_at: None,
            winner_participant_id: Some(winner),
            duration_ms: Some(duration_ms),
            extra_turns: Some(extra_turns),
        };

        let spin = self.spin.clone();
        let events = self.emit(now, vec![EventBody::SpinStarted { spin: spin.clone() }]);
        Ok((spin, events))
    }

    /// Resolves the spin identified by `spin_id`. A stale id (the spin was
    /// superseded or already resolved) is a silent no-op.
    ///
    /// Every active non-winner's counter increments and the winner's resets
    /// to zero; a winner that went inactive or left mid-spin keeps its
    /// counter and is absent from the pending compensation map.
    pub fn resolve_spin(
        &mut self,
        spin_id: Uuid,
        pending_ttl: Duration,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        if !self.spin.is_spinning() || self.spin.spin_id != Some(spin_id) {
            return Vec::new();
        }
        let Some(winner_id) = self.spin.winner_participant_id else {
            return Vec::new();
        };

        let mut counters = HashMap::new();
        let mut changed = Vec::new();
        let mut active_snapshot = Vec::new();
        for participant in self.participants.iter_mut().filter(|p| p.active) {
            let previous = participant.spins_since_last_won;
            counters.insert(participant.id, previous);
            if participant.id == winner_id {
                participant.spins_since_last_won = 0;
            } else {
                participant.spins_since_last_won += 1;
            }
            // A winner already at zero stays at zero; no update for it.
            if participant.spins_since_last_won != previous {
                changed.push(participant.clone());
            }
            active_snapshot.push(participant.clone());
        }

        self.history.push(SpinHistoryItem {
            id: spin_id,
            created_at: now,
            winner_participant_id: winner_id,
            participants: active_snapshot,
        });
        if self.history.len() > HISTORY_CAP {
            let overflow = self.history.len() - HISTORY_CAP;
            self.history.drain(..overflow);
        }

        self.pending = Some(PendingResult {
            spin_id,
            counters,
            expires_at: now + pending_ttl,
        });

        self.spin.status = SpinStatus::Idle;
        self.spin.resolved_at = Some(now);

        let mut bodies = vec![EventBody::SpinResolved {
            spin: self.spin.clone(),
        }];
        bodies.extend(changed.into_iter().map(|participant| {
            EventBody::ParticipantUpdated { participant }
        }));
        self.emit(now, bodies)
    }

    /// Confirms a pending result. Saving twice, saving a stale id, or
    /// saving after expiry are all quiet no-ops.
    pub fn save_spin(&mut self, spin_id: Uuid, now: DateTime<Utc>) -> Vec<Event> {
        let Some(pending) = self.pending.as_ref() else {
            return Vec::new();
        };
        if pending.spin_id != spin_id {
            return Vec::new();
        }

        let expired = pending.is_expired(now);
        self.pending = None;
        self.spin = GroupSpinState::fresh_idle(self.spin.resolved_at);
        if expired {
            return Vec::new();
        }
        self.emit(now, vec![EventBody::SpinResultDismissed {
            spin_id,
            action: DismissAction::Save,
        }])
    }

    /// Discards a pending result: restores every captured counter and drops
    /// the history entry. Once the pending has expired only the history
    /// entry is removed, silently.
    pub fn discard_spin(&mut self, spin_id: Uuid, now: DateTime<Utc>) -> Vec<Event> {
        let live_pending = self
            .pending
            .as_ref()
            .filter(|p| p.spin_id == spin_id && !p.is_expired(now))
            .cloned();

        match live_pending {
            Some(pending) => {
                let mut bodies = Vec::new();
                for participant in self.participants.iter_mut() {
                    if let Some(previous) = pending.counters.get(&participant.id) {
                        if participant.spins_since_last_won != *previous {
                            participant.spins_since_last_won = *previous;
                            bodies.push(EventBody::ParticipantUpdated {
                                participant: participant.clone(),
                            });
                        }
                    }
                }
                self.history.retain(|item| item.id != spin_id);
                self.pending = None;
                self.spin = GroupSpinState::fresh_idle(self.spin.resolved_at);
                bodies.push(EventBody::SpinResultDismissed {
                    spin_id,
                    action: DismissAction::Discard,
                });
                self.emit(now, bodies)
            }
            None => {
                self.history.retain(|item| item.id != spin_id);
                if self
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.spin_id == spin_id)
                {
                    self.pending = None;
                    self.spin = GroupSpinState::fresh_idle(self.spin.resolved_at);
                }
                Vec::new()
            }
        }
    }
}

/// Validates and constructs a participant to append to `roster`.
fn build_participant(
    roster: &[Participant],
    new: &NewParticipant,
) -> Result<Participant, DomainError> {
    let name = normalize_name(&new.name)?;
    let folded = fold_name(&name);
    if roster.iter().any(|p| fold_name(&p.name) == folded) {
        return Err(DomainError::conflict(
            "Participant with this name already exists",
        ));
    }

    let email_id = match &new.email_id {
        Some(raw) => Some(normalize_email(raw)?),
        None => None,
    };
    if new.manager && email_id.is_none() {
        return Err(DomainError::validation(
            "A manager requires a verified email",
        ));
    }

    Ok(Participant {
        id: Uuid::new_v4(),
        name,
        active: true,
        email_id,
        manager: new.manager,
        spins_since_last_won: 0,
    })
}

/// Applies a patch to one participant inside `roster`, enforcing the owner
/// protections and the manager-requires-email rule.
fn apply_patch(
    roster: &mut [Participant],
    id: Uuid,
    patch: &ParticipantPatch,
    owner_participant_id: Uuid,
) -> Result<Participant, DomainError> {
    let participant = roster
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| DomainError::not_found("Participant not found"))?;

    if id == owner_participant_id {
        if let Some(requested) = &patch.email_id {
            let changes = match requested {
                None => true,
                Some(raw) => normalize_email(raw)? != participant.email_id.clone().unwrap_or_default(),
            };
            if changes {
                return Err(DomainError::validation(
                    "The owner participant's email cannot be changed",
                ));
            }
        }
        if patch.manager == Some(false) {
            return Err(DomainError::validation(
                "The owner participant must remain a manager",
            ));
        }
        if patch.active == Some(false) {
            return Err(DomainError::validation(
                "The owner participant cannot be deactivated",
            ));
        }
    }

    if let Some(requested) = &patch.email_id {
        match requested {
            Some(raw) => participant.email_id = Some(normalize_email(raw)?),
            None => {
                // Clearing the email strips manager status with it.
                participant.email_id = None;
                participant.manager = false;
            }
        }
    }

    if let Some(manager) = patch.manager {
        if manager && participant.email_id.is_none() {
            return Err(DomainError::validation(
                "A manager requires a verified email",
            ));
        }
        participant.manager = manager;
    }

    if let Some(active) = patch.active {
        participant.active = active;
    }

    Ok(participant.clone())
}
