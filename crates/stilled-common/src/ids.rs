//! ID types for agents.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for agent IDs.
static AGENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an autonomous agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    /// Creates a new unique agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(AGENT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an agent ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}
