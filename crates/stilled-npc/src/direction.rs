//! Wander direction scoring.
//!
//! Each of the eight compass headings is tested at a point a short distance
//! ahead. A heading survives when that point stays inside the scoring bounds,
//! outside every obstacle and outside every remembered failure cell. Survivors
//! are ranked by how close the point comes to recently visited positions.

use fastrand::Rng;
use glam::Vec3;
use std::f32::consts::{FRAC_PI_4, TAU};
use stilled_common::{GridCell, PlanarExt, SafeBounds};

use crate::config::NpcConfig;
use crate::memory::SpatialMemory;
use crate::occlusion::OcclusionQuery;
use crate::world::AgentWorld;

/// Number of tested headings.
pub const HEADING_COUNT: usize = 8;

/// A heading that survived rejection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDirection {
    /// Unit heading on the floor plane
    pub direction: Vec3,
    /// Repulsion cost of the look-ahead point
    pub cost: f32,
}

/// Result of a direction choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionChoice {
    /// Move along this unit heading
    Heading(Vec3),
    /// Every heading was rejected
    Blocked,
}

/// Tests the eight headings from `position` and returns the survivors.
#[allow(clippy::too_many_arguments)]
pub fn score_directions<W: AgentWorld + ?Sized>(
    world: &W,
    occlusion: &OcclusionQuery,
    memory: &mut SpatialMemory,
    now: f64,
    position: Vec3,
    bounds: SafeBounds,
    config: &NpcConfig,
) -> Vec<ScoredDirection> {
    let lookahead = config.radius * 2.0;
    let mut survivors = Vec::with_capacity(HEADING_COUNT);

    for i in 0..HEADING_COUNT {
        let direction = Vec3::from_heading(i as f32 * FRAC_PI_4);
        let ahead = position + direction * lookahead;

        // Edge counts as outside.
        if !bounds.contains_strict(ahead) {
            continue;
        }
        if occlusion.is_inside_any_obstacle(world, memory.box_cache_mut(), now, ahead.x, ahead.y) {
            continue;
        }
        if memory.is_obstacle_remembered(GridCell::from_position(ahead)) {
            continue;
        }

        survivors.push(ScoredDirection {
            direction,
            cost: memory.repulsion_cost(ahead, config.repulsion_radius),
        });
    }

    survivors
}

/// Picks the cheapest survivor, or with `exploration_chance` a uniformly random one.
pub fn pick_direction(
    survivors: &[ScoredDirection],
    exploration_chance: f32,
    rng: &mut Rng,
) -> DirectionChoice {
    if survivors.is_empty() {
        return DirectionChoice::Blocked;
    }

    if rng.f32() < exploration_chance {
        return DirectionChoice::Heading(survivors[rng.usize(..survivors.len())].direction);
    }

    // First minimum wins on ties.
    let best = survivors
        .iter()
        .fold(survivors[0], |best, s| if s.cost < best.cost { *s } else { best });
    DirectionChoice::Heading(best.direction)
}

/// Heading toward the room center, or a random one when already there.
pub fn center_heading(position: Vec3, rng: &mut Rng) -> Vec3 {
    let to_center = -position.planar();
    if to_center.length_squared() > 0.001 {
        to_center.normalize()
    } else {
        Vec3::from_heading(rng.f32() * TAU)
    }
}
