//! Group Actor runtime.
//!
//! Every group is owned by exactly one actor task that serializes all state
//! transitions, stamps each transaction with a monotonically increasing
//! version, fans the resulting events out to its subscribers, and
//! checkpoints its state after every mutation. The [`registry::GroupRegistry`]
//! creates actors and revives them from checkpoints on first access.

pub mod actor;
pub mod config;
pub mod registry;
pub mod state;

pub use actor::GroupHandle;
pub use config::EngineConfig;
pub use registry::{GroupRegistry, OwnerIdentity};
pub use state::GroupState;
