//! Domain layer for the unfair-wheel backend.
//!
//! This crate contains:
//! - Domain models (Group, Participant, spin state, history, pending result)
//! - The versioned realtime event envelope
//! - Name/email normalization and the weighted winner draw
//! - Domain error types

pub mod error;
pub mod event;
pub mod group;
pub mod normalize;
pub mod participant;
pub mod spin;

pub use error::DomainError;
pub use event::{Event, EventBody};
pub use group::{Group, GroupRecord};
pub use participant::{NewParticipant, Participant, ParticipantPatch, RosterCommit, RosterUpdate};
pub use spin::{GroupSpinState, PendingResult, SpinHistoryItem, SpinStatus};
