//! The per-group actor task and its typed handle.
//!
//! One task owns one [`GroupState`]. Commands arrive over an mpsc mailbox
//! and are processed to completion (state change, checkpoint, broadcast)
//! before the next one starts, which is the whole concurrency story for a
//! group. The timed spin resolution re-enters through the same mailbox, so
//! it serializes with client traffic like everything else.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use domain::error::DomainError;
use domain::event::Event;
use domain::group::Group;
use domain::participant::{NewParticipant, Participant, ParticipantPatch, RosterCommit};
use domain::spin::{GroupSpinState, SpinHistoryItem};
use rand::rngs::StdRng;
use rand::SeedableRng;
use store::CheckpointStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::state::GroupState;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    GetGroup(Reply<Group>),
    GetParticipants(Reply<Vec<Participant>>),
    Rename(String, Reply<Result<Group, DomainError>>),
    AddParticipant(NewParticipant, Reply<Result<Participant, DomainError>>),
    UpdateParticipant(
        Uuid,
        ParticipantPatch,
        Reply<Result<Participant, DomainError>>,
    ),
    RemoveParticipant(Uuid, Reply<Result<(), DomainError>>),
    CommitRoster(RosterCommit, Reply<Result<Vec<Participant>, DomainError>>),
    RequestSpin(Reply<Result<GroupSpinState, DomainError>>),
    ListHistory(Reply<Vec<SpinHistoryItem>>),
    SaveSpin(Uuid, Reply<()>),
    DiscardSpin(Uuid, Reply<()>),
    Subscribe(Reply<(Uuid, mpsc::UnboundedReceiver<Event>)>),
    Unsubscribe(Uuid),
    ResolveSpin(Uuid),
}

/// Cloneable handle to one group actor. All methods enqueue a command and
/// await its reply; a dead actor surfaces as an internal error.
#[derive(Clone)]
pub struct GroupHandle {
    tx: mpsc::Sender<Command>,
}

impl GroupHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| DomainError::internal("Group actor is unavailable"))?;
        reply_rx
            .await
            .map_err(|_| DomainError::internal("Group actor dropped the request"))
    }

    pub async fn group(&self) -> Result<Group, DomainError> {
        self.call(Command::GetGroup).await
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, DomainError> {
        self.call(Command::GetParticipants).await
    }

    pub async fn rename(&self, name: String) -> Result<Group, DomainError> {
        self.call(|reply| Command::Rename(name, reply)).await?
    }

    pub async fn add_participant(
        &self,
        new: NewParticipant,
    ) -> Result<Participant, DomainError> {
        self.call(|reply| Command::AddParticipant(new, reply)).await?
    }

    pub async fn update_participant(
        &self,
        id: Uuid,
        patch: ParticipantPatch,
    ) -> Result<Participant, DomainError> {
        self.call(|reply| Command::UpdateParticipant(id, patch, reply))
            .await?
    }

    pub async fn remove_participant(&self, id: Uuid) -> Result<(), DomainError> {
        self.call(|reply| Command::RemoveParticipant(id, reply)).await?
    }

    pub async fn commit_roster(
        &self,
        commit: RosterCommit,
    ) -> Result<Vec<Participant>, DomainError> {
        self.call(|reply| Command::CommitRoster(commit, reply)).await?
    }

    pub async fn request_spin(&self) -> Result<GroupSpinState, DomainError> {
        self.call(Command::RequestSpin).await?
    }

    pub async fn history(&self) -> Result<Vec<SpinHistoryItem>, DomainError> {
        self.call(Command::ListHistory).await
    }

    pub async fn save_spin(&self, spin_id: Uuid) -> Result<(), DomainError> {
        self.call(|reply| Command::SaveSpin(spin_id, reply)).await
    }

    pub async fn discard_spin(&self, spin_id: Uuid) -> Result<(), DomainError> {
        self.call(|reply| Command::DiscardSpin(spin_id, reply)).await
    }

    /// Attaches a subscriber. The returned receiver's first event is always
    /// the snapshot stamped with the actor's current version.
    pub async fn subscribe(
        &self,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<Event>), DomainError> {
        self.call(Command::Subscribe).await
    }

    pub async fn unsubscribe(&self, subscriber_id: Uuid) {
        let _ = self.tx.send(Command::Unsubscribe(subscriber_id)).await;
    }
}

pub(crate) struct GroupActor {
    state: GroupState,
    config: EngineConfig,
    rng: StdRng,
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<Event>>,
    checkpoint: Arc<dyn CheckpointStore>,
    rx: mpsc::Receiver<Command>,
    self_tx: mpsc::Sender<Command>,
}

impl GroupActor {
    /// Spawns the actor task for `state` and returns its handle.
    pub(crate) fn spawn(
        state: GroupState,
        config: EngineConfig,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> GroupHandle {
        let (tx, rx) = mpsc::channel(config.mailbox_capacity);
        let actor = GroupActor {
            state,
            config,
            // Seeded from OS entropy: actors must not share RNG streams.
            rng: StdRng::from_entropy(),
            subscribers: HashMap::new(),
            checkpoint,
            rx,
            self_tx: tx.clone(),
        };
        tokio::spawn(actor.run());
        GroupHandle { tx }
    }

    async fn run(mut self) {
        let group_id = self.state.group.id;
        debug!(group_id = %group_id, "group actor started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
        }
        debug!(group_id = %group_id, "group actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::GetGroup(reply) => {
                let _ = reply.send(self.state.group.clone());
            }
            Command::GetParticipants(reply) => {
                let _ = reply.send(self.state.participants.clone());
            }
            Command::Rename(name, reply) => {
                let result = match self.state.rename(&name, Utc::now()) {
                    Ok((group, events)) => {
                        self.commit(events).await;
                        Ok(group)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::AddParticipant(new, reply) => {
                let result = match self.state.add_participant(new, Utc::now()) {
                    Ok((participant, events)) => {
                        self.commit(events).await;
                        Ok(participant)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::UpdateParticipant(id, patch, reply) => {
                let result = match self.state.update_participant(id, patch, Utc::now()) {
                    Ok((participant, events)) => {
                        self.commit(events).await;
                        Ok(participant)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::RemoveParticipant(id, reply) => {
                let result = match self.state.remove_participant(id, Utc::now()) {
                    Ok(events) => {
                        self.commit(events).await;
                        Ok(())
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::CommitRoster(commit, reply) => {
                let result = match self.state.commit_roster(commit, Utc::now()) {
                    Ok((roster, events)) => {
                        self.commit(events).await;
                        Ok(roster)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::RequestSpin(reply) => {
                let result = match self.state.start_spin(
                    &mut self.rng,
                    &self.config,
                    Utc::now(),
                ) {
                    Ok((spin, events)) => {
                        self.commit(events).await;
                        self.schedule_resolve(&spin);
                        Ok(spin)
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(result);
            }
            Command::ListHistory(reply) => {
                let _ = reply.send(self.state.history_newest_first());
            }
            Command::SaveSpin(spin_id, reply) => {
                let events = self.state.save_spin(spin_id, Utc::now());
                self.commit(events).await;
                let _ = reply.send(());
            }
            Command::DiscardSpin(spin_id, reply) => {
                let events = self.state.discard_spin(spin_id, Utc::now());
                self.commit(events).await;
                let _ = reply.send(());
            }
            Command::Subscribe(reply) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let subscriber_id = Uuid::new_v4();
                let snapshot = Event {
                    group_id: self.state.group.id,
                    version: self.state.version,
                    ts: Utc::now(),
                    body: self.state.snapshot_body(),
                };
                if tx.send(snapshot).is_ok() {
                    self.subscribers.insert(subscriber_id, tx);
                }
                let _ = reply.send((subscriber_id, rx));
            }
            Command::Unsubscribe(subscriber_id) => {
                self.subscribers.remove(&subscriber_id);
            }
            Command::ResolveSpin(spin_id) => {
                let events =
                    self.state
                        .resolve_spin(spin_id, self.config.pending_ttl, Utc::now());
                // Empty when the spin was superseded; nothing to tell anyone.
                self.commit(events).await;
            }
        }
    }

    /// Persists then broadcasts one transaction's events. Subscribers are
    /// never shown an event ahead of the checkpointed state.
    async fn commit(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.checkpoint_state().await;
        self.broadcast(events);
    }

    async fn checkpoint_state(&self) {
        let group_id = self.state.group.id;
        match serde_json::to_string(&self.state) {
            Ok(json) => {
                if let Err(err) = self.checkpoint.save(&group_id.to_string(), &json).await {
                    warn!(group_id = %group_id, error = %err, "checkpoint write failed");
                }
            }
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "checkpoint serialization failed");
            }
        }
    }

    fn broadcast(&mut self, events: Vec<Event>) {
        for event in events {
            let group_id = self.state.group.id;
            self.subscribers.retain(|subscriber_id, tx| {
                if tx.send(event.clone()).is_ok() {
                    true
                } else {
                    debug!(
                        group_id = %group_id,
                        subscriber_id = %subscriber_id,
                        "dropping disconnected subscriber"
                    );
                    false
                }
            });
        }
    }

    fn schedule_resolve(&self, spin: &GroupSpinState) {
        let (Some(spin_id), Some(duration_ms)) = (spin.spin_id, spin.duration_ms) else {
            return;
        };
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(duration_ms)).await;
            let _ = tx.send(Command::ResolveSpin(spin_id)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GroupState;
    use domain::event::EventBody;
    use domain::spin::SpinStatus;
    use std::time::Duration;
    use store::MemoryCheckpointStore;
    use tokio::time::timeout;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            spin_duration_ms: 10..11,
            extra_turns: 6..=8,
            pending_ttl: chrono::Duration::minutes(10),
            mailbox_capacity: 64,
        }
    }

    fn spawn_group() -> GroupHandle {
        let state = GroupState::create(
            "Friday Squad",
            Uuid::new_v4(),
            "u1@x",
            "User One",
            Utc::now(),
        )
        .unwrap();
        GroupActor::spawn(state, fast_config(), Arc::new(MemoryCheckpointStore::new()))
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    fn new_participant(name: &str, email: Option<&str>) -> NewParticipant {
        NewParticipant {
            name: name.to_string(),
            email_id: email.map(str::to_string),
            manager: false,
        }
    }

    #[tokio::test]
    async fn test_spin_lifecycle_over_subscription() {
        let handle = spawn_group();
        handle
            .add_participant(new_participant("Ada", Some("ada@x")))
            .await
            .unwrap();
        handle
            .add_participant(new_participant("Ben", Some("ben@x")))
            .await
            .unwrap();

        let (_, mut rx) = handle.subscribe().await.unwrap();
        let snapshot = next_event(&mut rx).await;
        assert_eq!(snapshot.body.kind(), "snapshot");

        let spin = handle.request_spin().await.unwrap();
        assert!(spin.is_spinning());

        let started = next_event(&mut rx).await;
        assert_eq!(started.body.kind(), "spin.started");
        assert!(started.version > snapshot.version);

        let resolved = next_event(&mut rx).await;
        assert_eq!(resolved.body.kind(), "spin.resolved");

        // first spin: both losers moved, the winner stayed at zero
        for _ in 0..2 {
            let updated = next_event(&mut rx).await;
            assert_eq!(updated.body.kind(), "participant.updated");
            assert_eq!(updated.version, resolved.version);
        }

        let history = handle.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(Some(history[0].id), spin.spin_id);
    }

    #[tokio::test]
    async fn test_mid_spin_subscriber_sees_spinning_snapshot_then_one_resolve() {
        let handle = spawn_group();
        handle
            .add_participant(new_participant("Ada", None))
            .await
            .unwrap();

        let spin = handle.request_spin().await.unwrap();
        let (_, mut rx) = handle.subscribe().await.unwrap();

        let snapshot = next_event(&mut rx).await;
        let EventBody::Snapshot { spin: seen, .. } = &snapshot.body else {
            panic!("expected snapshot, got {}", snapshot.body.kind());
        };
        assert_eq!(seen.status, SpinStatus::Spinning);
        assert_eq!(seen.spin_id, spin.spin_id);

        let mut resolved_count = 0;
        while let Ok(Some(event)) = timeout(Duration::from_millis(300), rx.recv()).await {
            if event.body.kind() == "spin.resolved" {
                resolved_count += 1;
            }
        }
        assert_eq!(resolved_count, 1);
    }

    #[tokio::test]
    async fn test_versions_strictly_increase_per_transaction() {
        let handle = spawn_group();
        let (_, mut rx) = handle.subscribe().await.unwrap();
        let snapshot = next_event(&mut rx).await;

        handle
            .add_participant(new_participant("Ada", None))
            .await
            .unwrap();
        handle
            .add_participant(new_participant("Ben", None))
            .await
            .unwrap();
        handle.rename("Renamed".to_string()).await.unwrap();

        let mut last = snapshot.version;
        for _ in 0..3 {
            let event = next_event(&mut rx).await;
            assert!(event.version > last);
            last = event.version;
        }
    }

    #[tokio::test]
    async fn test_second_spin_request_conflicts() {
        let handle = spawn_group();
        handle
            .add_participant(new_participant("Ada", None))
            .await
            .unwrap();

        handle.request_spin().await.unwrap();
        let err = handle.request_spin().await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_discard_after_resolve_reverts_and_clears_history() {
        let handle = spawn_group();
        handle
            .add_participant(new_participant("Ada", None))
            .await
            .unwrap();

        let spin = handle.request_spin().await.unwrap();
        let spin_id = spin.spin_id.unwrap();

        // wait out the short spin
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.history().await.unwrap().len(), 1);

        handle.discard_spin(spin_id).await.unwrap();
        assert!(handle.history().await.unwrap().is_empty());
        let participants = handle.participants().await.unwrap();
        assert!(participants.iter().all(|p| p.spins_since_last_won == 0));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned_on_next_broadcast() {
        let handle = spawn_group();
        let (_, rx) = handle.subscribe().await.unwrap();
        drop(rx);

        // next mutation broadcasts into the closed channel and prunes it
        handle
            .add_participant(new_participant("Ada", None))
            .await
            .unwrap();

        // a fresh subscriber still works
        let (_, mut rx) = handle.subscribe().await.unwrap();
        let snapshot = next_event(&mut rx).await;
        assert_eq!(snapshot.body.kind(), "snapshot");
    }
}
