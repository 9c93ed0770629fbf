//! Room containment and teleport-recovery.
//!
//! Four nested rectangles keep the agent off the walls:
//! - the hard bound (tightest) is enforced at the start of every tick,
//! - the movement bound is enforced while stepping and after teleports,
//! - the scoring bound limits direction look-ahead points, flee prediction and path samples,
//! - the teleport bound is where recovery and spawn candidates are drawn.
//!
//! The movement bound is the loosest one the agent can ever end a tick outside
//! of, so every tick ends with the agent inside it.

use fastrand::Rng;
use glam::Vec3;
use stilled_common::{PlanarExt, RoomBounds, SafeBounds};
use tracing::trace;

use crate::config::NpcConfig;
use crate::memory::BoxCheckCache;
use crate::occlusion::OcclusionQuery;
use crate::world::AgentWorld;

/// Velocity scale applied to an axis bounced by the hard clamp.
const HARD_CLAMP_BOUNCE: f32 = -0.5;
/// Velocity scale applied to an axis bounced while stepping.
const STEP_BOUNCE: f32 = -0.7;
/// A move shorter than this fraction of the intended one counts as a collision.
const HIT_PROGRESS_FRACTION: f32 = 0.2;
/// Fraction of the teleport bound used by the no-candidate fallback.
const TELEPORT_FALLBACK_FRACTION: f32 = 0.5;

/// Result of the per-tick hard clamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HardClamp {
    /// Position already inside the hard bound
    Inside,
    /// Position snapped back; offending velocity axes bounced
    Clamped {
        /// Corrected position
        position: Vec3,
        /// Corrected velocity
        velocity: Vec3,
    },
    /// Position far outside the hard bound; teleport required
    Extreme {
        /// Corrected position
        position: Vec3,
        /// Corrected velocity
        velocity: Vec3,
    },
}

/// Result of one movement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Position after the step
    pub position: Vec3,
    /// Velocity after any bounces
    pub velocity: Vec3,
    /// Whether the body made almost no progress
    pub hit_obstacle: bool,
}

/// Bound checks and recovery sampling for one room.
#[derive(Debug, Clone, Copy)]
pub struct ContainmentPolicy {
    room: RoomBounds,
    hard: SafeBounds,
    extreme_factor: f32,
    movement: SafeBounds,
    scoring: SafeBounds,
    teleport: SafeBounds,
}

impl ContainmentPolicy {
    /// Creates a policy for `room` using the configured margins.
    #[must_use]
    pub fn new(room: RoomBounds, config: &NpcConfig) -> Self {
        Self {
            room,
            hard: room.safe(config.hard_clamp_margin),
            extreme_factor: config.extreme_violation_factor,
            movement: room.safe(config.movement_margin),
            scoring: room.safe(config.scoring_margin),
            teleport: room.safe(config.teleport_margin),
        }
    }

    /// Room extents.
    #[must_use]
    pub const fn room(&self) -> RoomBounds {
        self.room
    }

    /// Bound enforced while stepping.
    #[must_use]
    pub const fn movement_bounds(&self) -> SafeBounds {
        self.movement
    }

    /// Bound used for scoring and path sampling.
    #[must_use]
    pub const fn scoring_bounds(&self) -> SafeBounds {
        self.scoring
    }

    /// Bound used for teleport and spawn candidates.
    #[must_use]
    pub const fn teleport_bounds(&self) -> SafeBounds {
        self.teleport
    }

    /// Snaps a position outside the hard bound back in and bounces the offending axes.
    #[must_use]
    pub fn hard_clamp(&self, position: Vec3, velocity: Vec3) -> HardClamp {
        if self.hard.contains(position) {
            return HardClamp::Inside;
        }

        let mut velocity = velocity;
        if position.x.abs() > self.hard.half_x {
            velocity.x *= HARD_CLAMP_BOUNCE;
        }
        if position.y.abs() > self.hard.half_y {
            velocity.y *= HARD_CLAMP_BOUNCE;
        }
        let clamped = self.hard.clamp(position);

        if self.hard.scaled(self.extreme_factor).contains(position) {
            HardClamp::Clamped {
                position: clamped,
                velocity,
            }
        } else {
            HardClamp::Extreme {
                position: clamped,
                velocity,
            }
        }
    }

    /// Integrates `velocity` over `dt`, bouncing axes that would leave the
    /// movement bound and asking the world where the body actually lands.
    pub fn step<W: AgentWorld + ?Sized>(
        &self,
        world: &W,
        position: Vec3,
        velocity: Vec3,
        dt: f32,
    ) -> StepOutcome {
        let mut velocity = velocity;
        let proposed = position + velocity * dt;

        if proposed.x.abs() > self.movement.half_x && proposed.x * velocity.x > 0.0 {
            velocity.x *= STEP_BOUNCE;
        }
        if proposed.y.abs() > self.movement.half_y && proposed.y * velocity.y > 0.0 {
            velocity.y *= STEP_BOUNCE;
        }

        let intended = position + velocity * dt;
        let resolved = world.resolve_motion(position, intended);
        let landed = self.movement.clamp(resolved);

        let moved = landed.distance(position);
        let hit_obstacle = moved < HIT_PROGRESS_FRACTION * velocity.length() * dt;
        if hit_obstacle {
            trace!(?position, ?intended, ?landed, "step blocked");
        }

        StepOutcome {
            position: landed,
            velocity,
            hit_obstacle,
        }
    }

    /// Final clamp applied to any committed position.
    #[must_use]
    pub fn clamp_to_movement(&self, position: Vec3) -> Vec3 {
        self.movement.clamp(position)
    }

    /// Searches the teleport bound for the free point farthest from `target`.
    ///
    /// Candidates inside an obstacle or within `safe_distance` of the target are
    /// rejected. The search stops early once a candidate lies beyond three times
    /// the safe distance. Returns `None` when no candidate survived.
    #[allow(clippy::too_many_arguments)]
    pub fn find_teleport_target<W: AgentWorld + ?Sized>(
        &self,
        world: &W,
        occlusion: &OcclusionQuery,
        cache: &mut BoxCheckCache,
        now: f64,
        target: Vec3,
        z: f32,
        config: &NpcConfig,
        rng: &mut Rng,
    ) -> Option<Vec3> {
        let safe_sq = config.safe_distance * config.safe_distance;
        let far_enough_sq = safe_sq * 9.0;
        let mut best: Option<(Vec3, f32)> = None;

        for _ in 0..config.teleport_attempts {
            let candidate = self.teleport.sample(rng, z);
            if occlusion.is_inside_any_obstacle(world, cache, now, candidate.x, candidate.y) {
                continue;
            }

            let d_sq = candidate.planar_distance_squared(target);
            if d_sq < safe_sq {
                continue;
            }

            if best.map_or(true, |(_, best_sq)| d_sq > best_sq) {
                best = Some((candidate, d_sq));
            }
            if d_sq > far_enough_sq {
                break;
            }
        }

        best.map(|(position, _)| position)
    }

    /// Random point near the room center, used when the search found nothing.
    pub fn teleport_fallback(&self, z: f32, rng: &mut Rng) -> Vec3 {
        self.teleport.scaled(TELEPORT_FALLBACK_FRACTION).sample(rng, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleFootprint;
    use proptest::prelude::*;

    struct Open {
        footprints: Vec<ObstacleFootprint>,
        blocked: bool,
    }

    impl Open {
        fn new() -> Self {
            Self {
                footprints: Vec::new(),
                blocked: false,
            }
        }
    }

    impl AgentWorld for Open {
        fn target_position(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn target_forward(&self) -> Vec3 {
            Vec3::X
        }

        fn segment_obstructed(&self, _from: Vec3, _to: Vec3) -> bool {
            false
        }

        fn obstacle_footprints(&self) -> &[ObstacleFootprint] {
            &self.footprints
        }

        fn resolve_motion(&self, from: Vec3, to: Vec3) -> Vec3 {
            if self.blocked {
                from
            } else {
                to
            }
        }
    }

    fn policy() -> (NpcConfig, ContainmentPolicy) {
        let config = NpcConfig::default();
        let policy = ContainmentPolicy::new(RoomBounds::default(), &config);
        (config, policy)
    }

    #[test]
    fn test_hard_clamp_bounces_offending_axis() {
        let (_, policy) = policy();
        // Hard bound is 9 x 4.5.
        let result = policy.hard_clamp(Vec3::new(9.5, 1.0, 0.9), Vec3::new(2.0, 1.0, 0.0));
        let HardClamp::Clamped { position, velocity } = result else {
            panic!("expected a plain clamp, got {result:?}");
        };
        assert!((position - Vec3::new(9.0, 1.0, 0.9)).length() < 1e-4);
        assert!((velocity - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-5);
        assert_eq!(policy.hard_clamp(Vec3::new(8.0, 4.0, 0.9), Vec3::X), HardClamp::Inside);
    }

    #[test]
    fn test_hard_clamp_extreme_violation() {
        let (_, policy) = policy();
        let result = policy.hard_clamp(Vec3::new(0.0, 5.5, 0.9), Vec3::ZERO);
        assert!(matches!(result, HardClamp::Extreme { position, .. } if (position.y - 4.5).abs() < 1e-5));
    }

    #[test]
    fn test_step_bounces_at_movement_bound() {
        let (_, policy) = policy();
        let world = Open::new();
        // Movement bound is 12 x 6.
        let outcome = policy.step(&world, Vec3::new(11.9, 0.0, 0.9), Vec3::new(2.0, 0.0, 0.0), 0.1);
        assert!((outcome.velocity.x + 1.4).abs() < 1e-5);
        assert!(outcome.position.x < 11.9);
        assert!(!outcome.hit_obstacle);
    }

    #[test]
    fn test_step_reports_blocked_motion() {
        let (_, policy) = policy();
        let world = Open {
            blocked: true,
            ..Open::new()
        };
        let outcome = policy.step(&world, Vec3::new(1.0, 1.0, 0.9), Vec3::new(1.5, 0.0, 0.0), 0.1);
        assert!(outcome.hit_obstacle);
        assert_eq!(outcome.position, Vec3::new(1.0, 1.0, 0.9));
    }

    #[test]
    fn test_teleport_prefers_far_free_points() {
        let (config, policy) = policy();
        let world = Open::new();
        let occlusion = OcclusionQuery::new(&config);
        let mut cache = BoxCheckCache::new(config.box_cache_lifetime);
        let mut rng = Rng::with_seed(21);
        let target = Vec3::new(2.0, 1.0, 0.9);

        let found = policy
            .find_teleport_target(&world, &occlusion, &mut cache, 0.0, target, 0.9, &config, &mut rng)
            .expect("open room has candidates");
        assert!(found.planar_distance(target) >= config.safe_distance);
        assert!(policy.teleport_bounds().contains(found));
    }

    #[test]
    fn test_teleport_none_when_room_is_solid() {
        let (config, policy) = policy();
        let world = Open {
            footprints: vec![ObstacleFootprint::new((0.0, 0.0), 50.0, 50.0)],
            blocked: false,
        };
        let occlusion = OcclusionQuery::new(&config);
        let mut cache = BoxCheckCache::new(config.box_cache_lifetime);
        let mut rng = Rng::with_seed(4);
        assert!(policy
            .find_teleport_target(&world, &occlusion, &mut cache, 0.0, Vec3::ZERO, 0.9, &config, &mut rng)
            .is_none());

        let fallback = policy.teleport_fallback(0.9, &mut rng);
        assert!(policy.teleport_bounds().scaled(0.5).contains(fallback));
    }

    proptest! {
        #[test]
        fn prop_teleport_keeps_distance_and_bounds(
            seed in any::<u64>(),
            tx in -20.0f32..20.0,
            ty in -10.0f32..10.0,
        ) {
            let (config, policy) = policy();
            let world = Open::new();
            let occlusion = OcclusionQuery::new(&config);
            let mut cache = BoxCheckCache::new(config.box_cache_lifetime);
            let mut rng = Rng::with_seed(seed);
            let target = Vec3::new(tx, ty, 0.9);

            if let Some(found) = policy.find_teleport_target(
                &world, &occlusion, &mut cache, 0.0, target, 0.9, &config, &mut rng,
            ) {
                prop_assert!(found.planar_distance(target) >= config.safe_distance);
                prop_assert!(policy.movement_bounds().contains(found));
            }
        }

        #[test]
        fn prop_step_stays_inside_movement_bound(
            x in -12.0f32..12.0,
            y in -6.0f32..6.0,
            vx in -500.0f32..500.0,
            vy in -500.0f32..500.0,
            dt in 0.0f32..1.0,
        ) {
            let (_, policy) = policy();
            let world = Open::new();
            let outcome = policy.step(&world, Vec3::new(x, y, 0.9), Vec3::new(vx, vy, 0.0), dt);
            prop_assert!(policy.movement_bounds().contains(outcome.position));
        }
    }
}
