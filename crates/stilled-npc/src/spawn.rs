//! Spawn point selection.

use fastrand::Rng;
use glam::Vec3;
use stilled_common::PlanarExt;
use tracing::{debug, warn};

use crate::config::NpcConfig;
use crate::containment::ContainmentPolicy;
use crate::occlusion::OcclusionQuery;
use crate::world::AgentWorld;

/// Fraction of the half extents used by the last-resort spawn.
const LAST_RESORT_FRACTION: f32 = 0.3;

/// Where a spawn point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnSource {
    /// Position requested by the host, accepted as is
    Requested,
    /// Random sample within the teleport bound
    Sampled,
    /// One of the four inset room corners
    Corner,
    /// Random point near the center
    LastResort,
}

/// Picks a spawn point away from the target and outside every obstacle.
///
/// Tries random samples within the teleport bound first, then the four corners
/// inset by two radii, and finally any point near the room center.
pub fn find_spawn_point<W: AgentWorld + ?Sized>(
    world: &W,
    occlusion: &OcclusionQuery,
    containment: &ContainmentPolicy,
    config: &NpcConfig,
    rng: &mut Rng,
) -> (Vec3, SpawnSource) {
    let z = config.height * 0.5;
    let target = world.target_position();
    let min_distance = config.safe_distance * 2.0;
    let bounds = containment.teleport_bounds();

    for _ in 0..config.spawn_attempts {
        let candidate = bounds.sample(rng, z);
        if candidate.planar_distance(target) > min_distance
            && !occlusion.is_inside_uncached(world, candidate.x, candidate.y)
        {
            return (candidate, SpawnSource::Sampled);
        }
    }

    let inset_x = bounds.half_x - config.radius * 2.0;
    let inset_y = bounds.half_y - config.radius * 2.0;
    let corners = [
        (-inset_x, -inset_y),
        (-inset_x, inset_y),
        (inset_x, -inset_y),
        (inset_x, inset_y),
    ];
    for (x, y) in corners {
        if !occlusion.is_inside_uncached(world, x, y) {
            debug!(x, y, "spawn fell back to a corner");
            return (Vec3::new(x, y, z), SpawnSource::Corner);
        }
    }

    warn!("no free spawn point found, spawning near the center");
    let center = containment.room().safe(LAST_RESORT_FRACTION);
    (center.sample(rng, z), SpawnSource::LastResort)
}

/// Accepts `requested` when it lies within the teleport bound and outside
/// every obstacle; otherwise selects a spawn point as [`find_spawn_point`] does.
pub fn resolve_requested_spawn<W: AgentWorld + ?Sized>(
    world: &W,
    occlusion: &OcclusionQuery,
    containment: &ContainmentPolicy,
    config: &NpcConfig,
    requested: Vec3,
    rng: &mut Rng,
) -> (Vec3, SpawnSource) {
    if containment.teleport_bounds().contains(requested)
        && !occlusion.is_inside_uncached(world, requested.x, requested.y)
    {
        return (requested, SpawnSource::Requested);
    }
    debug!(?requested, "requested spawn rejected");
    find_spawn_point(world, occlusion, containment, config, rng)
}
