//! # Stilled NPC
//!
//! Behavior core of the spectral entity in The Stilled Hour.
//!
//! This crate provides the decision logic only; rendering, audio and physics
//! stay with the host, which talks to the core through [`AgentWorld`] and
//! [`AgentSink`]:
//! - Behavior state machine (wander, stalk, flee) driven by distance and gaze
//! - Spatial memory (position history, failed cells, containment cache)
//! - Occlusion queries over the host's collision oracle
//! - Wander direction scoring and local path planning
//! - Room containment and teleport-recovery
//! - Spawn point selection
//! - Presence cues (mood, face opacity, whisper volume)
//! - Agent events and configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod agent;
pub mod behavior;
pub mod config;
pub mod containment;
pub mod direction;
pub mod events;
pub mod memory;
pub mod occlusion;
pub mod path;
pub mod presence;
pub mod spawn;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::agent::*;
    pub use crate::behavior::*;
    pub use crate::config::*;
    pub use crate::containment::*;
    pub use crate::direction::*;
    pub use crate::events::*;
    pub use crate::memory::*;
    pub use crate::occlusion::*;
    pub use crate::path::*;
    pub use crate::presence::*;
    pub use crate::spawn::*;
    pub use crate::world::*;
}

pub use prelude::*;
