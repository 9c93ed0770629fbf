//! Agent events and the channel they travel on.
//!
//! Outbound [`AgentEvent`]s are published by the agent for hosts to drain.
//! Inbound [`WorldEvent`]s reach an agent through a [`Receiver`] handed to
//! `Agent::subscribe`; there is no process-wide bus.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use stilled_common::{AgentId, GridCell};

use crate::behavior::BehaviorState;
use crate::presence::Mood;

/// Why an agent teleported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeleportReason {
    /// No progress for too long
    Stuck,
    /// Wandered within the safe distance of the target
    TooClose,
    /// Direction scoring left nothing to pick
    NoDirection,
    /// No waypoint chain toward the target
    NoPath,
    /// Fled beyond the detection range
    FleeTooFar,
    /// Flee led into a remembered obstacle
    FleeObstacle,
    /// Far outside the room interior
    BoundsViolation,
    /// Followed the target's own teleport
    TargetTeleported,
}

/// Events published by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Agent placed in the world
    Spawned {
        /// Agent ID
        agent: AgentId,
        /// Spawn position
        position: Vec3,
    },
    /// Behavior state changed
    StateChanged {
        /// Agent ID
        agent: AgentId,
        /// Previous state
        from: BehaviorState,
        /// New state
        to: BehaviorState,
    },
    /// Agent relocated by teleport-recovery
    Teleported {
        /// Agent ID
        agent: AgentId,
        /// Position before the jump
        from: Vec3,
        /// Position after the jump
        to: Vec3,
        /// Trigger
        reason: TeleportReason,
    },
    /// Facial mood changed
    MoodChanged {
        /// Agent ID
        agent: AgentId,
        /// New mood
        mood: Mood,
    },
    /// A failed move was remembered
    ObstacleRemembered {
        /// Agent ID
        agent: AgentId,
        /// Cell the move started from
        cell: GridCell,
    },
    /// A new path plan was built
    PathReplanned {
        /// Agent ID
        agent: AgentId,
        /// Number of waypoints, target included
        waypoints: usize,
    },
}

impl AgentEvent {
    /// Agent that published the event.
    #[must_use]
    pub const fn agent(&self) -> AgentId {
        match self {
            Self::Spawned { agent, .. }
            | Self::StateChanged { agent, .. }
            | Self::Teleported { agent, .. }
            | Self::MoodChanged { agent, .. }
            | Self::ObstacleRemembered { agent, .. }
            | Self::PathReplanned { agent, .. } => *agent,
        }
    }
}

/// Notifications from the world an agent lives in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// The target jumped to a new position
    TargetTeleported {
        /// New target position
        position: Vec3,
    },
}

/// Bounded event channel.
#[derive(Debug)]
pub struct EventBus<E> {
    /// Sender for publishing events
    sender: Sender<E>,
    /// Receiver for collecting events
    receiver: Receiver<E>,
    /// Channel capacity
    capacity: usize,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl<E> EventBus<E> {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: E) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<E> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<E> {
        self.sender.clone()
    }

    /// Creates a new receiver handle; each event is delivered to one receiver.
    #[must_use]
    pub fn receiver(&self) -> Receiver<E> {
        self.receiver.clone()
    }
}
