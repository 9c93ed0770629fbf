//! Collaborator interfaces implemented by the host engine.
//!
//! The core never touches scene state directly. It reads the target and the
//! static obstacles through [`AgentWorld`] and publishes its own transform
//! through [`AgentSink`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned floor footprint of a static obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleFootprint {
    /// Center on the floor plane
    pub center: (f32, f32),
    /// Half extent along x
    pub half_extent_x: f32,
    /// Half extent along y
    pub half_extent_y: f32,
}

impl ObstacleFootprint {
    /// Creates a new footprint.
    #[must_use]
    pub const fn new(center: (f32, f32), half_extent_x: f32, half_extent_y: f32) -> Self {
        Self {
            center,
            half_extent_x,
            half_extent_y,
        }
    }

    /// Whether a floor point lies inside the footprint grown by `inflate` on every side.
    #[must_use]
    pub fn contains_inflated(&self, x: f32, y: f32, inflate: f32) -> bool {
        let hx = self.half_extent_x + inflate;
        let hy = self.half_extent_y + inflate;
        (self.center.0 - hx..=self.center.0 + hx).contains(&x)
            && (self.center.1 - hy..=self.center.1 + hy).contains(&y)
    }
}

/// Read-only view of the world an agent reacts to.
pub trait AgentWorld {
    /// Current target position.
    fn target_position(&self) -> Vec3;

    /// Direction the target is looking in.
    fn target_forward(&self) -> Vec3;

    /// Whether any solid intersects the segment between two points.
    fn segment_obstructed(&self, from: Vec3, to: Vec3) -> bool;

    /// Footprints of every static obstacle.
    fn obstacle_footprints(&self) -> &[ObstacleFootprint];

    /// Where a body moving from `from` toward `to` actually ends up.
    ///
    /// Hosts with a physics layer return the resolved position; a result short
    /// of `to` is reported back to the agent as a collision.
    fn resolve_motion(&self, _from: Vec3, to: Vec3) -> Vec3 {
        to
    }
}

/// Outward mutation surface consumed by the movement layer.
pub trait AgentSink {
    /// Commit the agent's position.
    fn apply_position(&mut self, position: Vec3);

    /// Commit the agent's intended velocity.
    fn apply_velocity_intent(&mut self, velocity: Vec3);

    /// Commit the agent's visual heading.
    fn apply_facing(&mut self, _facing: Vec3) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AgentSink for NullSink {
    fn apply_position(&mut self, _position: Vec3) {}

    fn apply_velocity_intent(&mut self, _velocity: Vec3) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_inflation() {
        let footprint = ObstacleFootprint::new((2.0, 2.0), 1.0, 0.5);
        assert!(footprint.contains_inflated(2.9, 2.0, 0.0));
        assert!(!footprint.contains_inflated(3.5, 2.0, 0.0));
        assert!(footprint.contains_inflated(3.5, 2.0, 0.9));
        assert!(!footprint.contains_inflated(2.0, 3.5, 0.9));
    }
}
