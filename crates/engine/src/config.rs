//! Engine tuning knobs.

use std::ops::{Range, RangeInclusive};

use chrono::Duration;

/// Per-actor tuning. Production values match the wheel animation the
/// frontend renders; tests shrink the spin duration to milliseconds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Spin animation length drawn uniformly from this range, in ms.
    pub spin_duration_ms: Range<u64>,

    /// Full wheel turns added on top of the winning offset.
    pub extra_turns: RangeInclusive<u32>,

    /// How long a resolved spin stays reversible.
    pub pending_ttl: Duration,

    /// Command mailbox depth per actor.
    pub mailbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spin_duration_ms: 4_000..6_000,
            extra_turns: 6..=8,
            pending_ttl: Duration::minutes(10),
            mailbox_capacity: 64,
        }
    }
}
