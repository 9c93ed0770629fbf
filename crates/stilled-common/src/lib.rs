//! # Stilled Common
//!
//! Common types, utilities, and shared abstractions for The Stilled Hour.
//!
//! This crate provides foundational types used by the NPC core and its hosts:
//! - Planar vector helpers over `glam::Vec3` (z is up, x/y is the floor)
//! - Quantized grid cells for spatial memory and query caches
//! - Room bounds and their scaled "safe" interiors
//! - Agent ids
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod bounds;
pub mod coords;
pub mod error;
pub mod ids;
pub mod planar;

pub use glam::Vec3;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bounds::*;
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::planar::*;
    pub use glam::Vec3;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_cell_truncates_toward_zero() {
        assert_eq!(GridCell::from_position(Vec3::new(1.9, -1.9, 0.0)), GridCell::new(1, -1));
        assert_eq!(GridCell::from_position(Vec3::new(-0.4, 0.4, 3.0)), GridCell::new(0, 0));
    }

    #[test]
    fn test_agent_id_generation() {
        let id1 = AgentId::new();
        let id2 = AgentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_safe_bounds_scaling() {
        let room = RoomBounds::new(20.0, 10.0, 4.0).expect("valid room");
        let safe = room.safe(0.6);
        assert!((safe.half_x - 12.0).abs() < 1e-5);
        assert!((safe.half_y - 6.0).abs() < 1e-5);
    }
}
