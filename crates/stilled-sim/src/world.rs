//! Box-obstacle room standing in for the engine's scene.
//!
//! Obstacles are floor-to-ceiling boxes. Line of sight uses the bare
//! footprints; bodies are kept out of footprints grown by the agent radius.

use glam::Vec3;
use stilled_npc::{AgentSink, AgentWorld, ObstacleFootprint};

/// Fraction of the segment kept when a move is cut short, so the body stops
/// just before the surface instead of on it.
const CONTACT_BACKOFF: f32 = 1e-3;

/// Room with a scripted target and static box obstacles.
#[derive(Debug, Clone)]
pub struct BoxRoom {
    footprints: Vec<ObstacleFootprint>,
    body_radius: f32,
    target: Vec3,
    forward: Vec3,
}

impl BoxRoom {
    /// Creates a room; `body_radius` grows footprints for motion resolution.
    #[must_use]
    pub fn new(footprints: Vec<ObstacleFootprint>, body_radius: f32) -> Self {
        Self {
            footprints,
            body_radius,
            target: Vec3::ZERO,
            forward: Vec3::X,
        }
    }

    /// Moves the target.
    pub fn set_target(&mut self, position: Vec3, forward: Vec3) {
        self.target = position;
        self.forward = forward;
    }

    fn first_entry(&self, from: Vec3, to: Vec3, inflate: f32) -> Option<f32> {
        self.footprints
            .iter()
            .filter(|f| !f.contains_inflated(from.x, from.y, inflate))
            .filter_map(|f| segment_entry(f, inflate, from, to))
            .min_by(f32::total_cmp)
    }
}

/// Parameter in `[0, 1]` at which the floor projection of `from -> to` enters
/// the footprint grown by `inflate`, if it does.
fn segment_entry(footprint: &ObstacleFootprint, inflate: f32, from: Vec3, to: Vec3) -> Option<f32> {
    let mut t_enter = 0.0f32;
    let mut t_exit = 1.0f32;

    let slabs = [
        (from.x, to.x - from.x, footprint.center.0, footprint.half_extent_x + inflate),
        (from.y, to.y - from.y, footprint.center.1, footprint.half_extent_y + inflate),
    ];

    for (start, delta, center, half) in slabs {
        let (lo, hi) = (center - half, center + half);
        if delta.abs() < f32::EPSILON {
            if start < lo || start > hi {
                return None;
            }
            continue;
        }

        let (mut t0, mut t1) = ((lo - start) / delta, (hi - start) / delta);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    Some(t_enter)
}

impl AgentWorld for BoxRoom {
    fn target_position(&self) -> Vec3 {
        self.target
    }

    fn target_forward(&self) -> Vec3 {
        self.forward
    }

    fn segment_obstructed(&self, from: Vec3, to: Vec3) -> bool {
        self.footprints
            .iter()
            .any(|f| segment_entry(f, 0.0, from, to).is_some())
    }

    fn obstacle_footprints(&self) -> &[ObstacleFootprint] {
        &self.footprints
    }

    fn resolve_motion(&self, from: Vec3, to: Vec3) -> Vec3 {
        match self.first_entry(from, to, self.body_radius) {
            Some(t) => from.lerp(to, (t - CONTACT_BACKOFF).max(0.0)),
            None => to,
        }
    }
}

/// Last values the agent committed.
#[derive(Debug, Default, Clone, Copy)]
pub struct Puppet {
    /// Committed position
    pub position: Vec3,
    /// Committed velocity intent
    pub velocity: Vec3,
    /// Committed facing
    pub facing: Vec3,
}

impl AgentSink for Puppet {
    fn apply_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn apply_velocity_intent(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn apply_facing(&mut self, facing: Vec3) {
        self.facing = facing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pillar_room() -> BoxRoom {
        BoxRoom::new(vec![ObstacleFootprint::new((0.0, 0.0), 1.0, 1.0)], 0.5)
    }

    #[test]
    fn test_segment_through_box_is_obstructed() {
        let room = pillar_room();
        assert!(room.segment_obstructed(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(5.0, 0.0, 1.0)));
        assert!(room.segment_obstructed(Vec3::new(-3.0, -3.0, 1.0), Vec3::new(3.0, 3.0, 1.0)));
    }

    #[test]
    fn test_segment_past_box_is_clear() {
        let room = pillar_room();
        assert!(!room.segment_obstructed(Vec3::new(-5.0, 1.5, 1.0), Vec3::new(5.0, 1.5, 1.0)));
        assert!(!room.segment_obstructed(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(-2.0, 0.0, 1.0)));
        // Would hit only if extended.
        assert!(!room.segment_obstructed(Vec3::new(3.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 1.0)));
    }

    #[test]
    fn test_vertical_segment_uses_slab_bounds() {
        let room = pillar_room();
        assert!(room.segment_obstructed(Vec3::new(0.5, -4.0, 1.0), Vec3::new(0.5, 4.0, 1.0)));
        assert!(!room.segment_obstructed(Vec3::new(1.5, -4.0, 1.0), Vec3::new(1.5, 4.0, 1.0)));
    }

    #[test]
    fn test_motion_stops_at_inflated_surface() {
        let room = pillar_room();
        let from = Vec3::new(-3.0, 0.0, 0.9);
        let resolved = room.resolve_motion(from, Vec3::new(0.0, 0.0, 0.9));
        // Surface of the inflated box is at x = -1.5.
        assert!(resolved.x < -1.5 && resolved.x > -1.51);
        assert_eq!(resolved.y, 0.0);
    }

    #[test]
    fn test_free_motion_is_untouched() {
        let room = pillar_room();
        let to = Vec3::new(-2.0, 3.0, 0.9);
        assert_eq!(room.resolve_motion(Vec3::new(-3.0, 3.0, 0.9), to), to);
    }

    #[test]
    fn test_body_inside_inflation_can_leave() {
        let room = pillar_room();
        let from = Vec3::new(-1.2, 0.0, 0.9);
        let to = Vec3::new(-1.4, 0.0, 0.9);
        assert_eq!(room.resolve_motion(from, to), to);
    }

    #[test]
    fn test_puppet_records_commits() {
        let mut puppet = Puppet::default();
        puppet.apply_position(Vec3::ONE);
        puppet.apply_velocity_intent(Vec3::X);
        puppet.apply_facing(Vec3::Y);
        assert_eq!(puppet.position, Vec3::ONE);
        assert_eq!(puppet.velocity, Vec3::X);
        assert_eq!(puppet.facing, Vec3::Y);
    }
}
