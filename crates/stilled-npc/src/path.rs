//! Local path planning around obstacles.
//!
//! When the straight line to the target is blocked, the planner samples
//! candidate points biased toward the target, sorts them by distance to the
//! target and greedily chains the ones it can see from the end of the chain.
//! It is reactive, not optimal: a failed chain falls back to heading straight
//! for the target and lets stuck detection deal with the consequences.

use fastrand::Rng;
use glam::Vec3;
use stilled_common::{uniform, PlanarExt, SafeBounds};

use crate::config::NpcConfig;
use crate::memory::BoxCheckCache;
use crate::occlusion::OcclusionQuery;
use crate::world::AgentWorld;

/// Shortest reach of the target-directed candidate component.
const BIAS_REACH_MIN: f32 = 3.0;
/// Longest reach of the target-directed candidate component.
const BIAS_REACH_MAX: f32 = 10.0;

/// Ordered waypoints and the index of the next one to seek.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathPlan {
    waypoints: Vec<Vec3>,
    current_index: usize,
}

/// What following a plan produced this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Seek {
    /// Head along this unit direction
    Toward(Vec3),
    /// Reached a waypoint; more remain
    Advanced,
    /// Reached the last waypoint, or the plan is empty
    Exhausted,
}

impl PathPlan {
    /// Plan that goes straight for `target`.
    #[must_use]
    pub fn direct(target: Vec3) -> Self {
        Self {
            waypoints: vec![target],
            current_index: 0,
        }
    }

    /// Plan from explicit waypoints.
    #[must_use]
    pub fn from_waypoints(waypoints: Vec<Vec3>) -> Self {
        Self {
            waypoints,
            current_index: 0,
        }
    }

    /// All waypoints in order.
    #[must_use]
    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    /// Index of the next waypoint.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Waypoint currently sought.
    #[must_use]
    pub fn current(&self) -> Option<Vec3> {
        self.waypoints.get(self.current_index).copied()
    }

    /// Whether every waypoint has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.waypoints.len()
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Whether the plan has no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Discards the plan.
    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.current_index = 0;
    }

    /// Steers from `position` toward the current waypoint, consuming it once
    /// closer than `arrival_radius` on the floor plane.
    pub fn seek(&mut self, position: Vec3, arrival_radius: f32) -> Seek {
        let Some(waypoint) = self.current() else {
            return Seek::Exhausted;
        };

        let to_waypoint = (waypoint - position).planar();
        if to_waypoint.length() < arrival_radius {
            self.current_index += 1;
            if self.is_exhausted() {
                Seek::Exhausted
            } else {
                Seek::Advanced
            }
        } else {
            Seek::Toward(to_waypoint.normalize_or_zero())
        }
    }

    /// Skips every waypoint already within `arrival_radius` and returns the
    /// heading toward the first one that is not, or `None` once exhausted.
    pub fn steer(&mut self, position: Vec3, arrival_radius: f32) -> Option<Vec3> {
        loop {
            match self.seek(position, arrival_radius) {
                Seek::Toward(direction) => return Some(direction),
                Seek::Advanced => {},
                Seek::Exhausted => return None,
            }
        }
    }
}

/// How a plan was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// The straight segment was clear
    Direct,
    /// Chained through sampled waypoints
    Chained,
    /// Nothing could be chained; heading straight regardless
    Fallback,
}

/// Sampling planner; holds only tuning.
#[derive(Debug, Clone, Copy)]
pub struct LocalPathPlanner {
    candidates: usize,
    considered: usize,
    max_waypoints: usize,
    target_bias: f32,
}

impl LocalPathPlanner {
    /// Creates a planner from the config.
    #[must_use]
    pub fn new(config: &NpcConfig) -> Self {
        Self {
            candidates: config.path_candidates,
            considered: config.path_candidates_considered,
            max_waypoints: config.max_waypoints.max(1),
            target_bias: config.target_bias,
        }
    }

    /// Builds a plan from `start` to `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn plan<W: AgentWorld + ?Sized>(
        &self,
        world: &W,
        occlusion: &OcclusionQuery,
        cache: &mut BoxCheckCache,
        now: f64,
        start: Vec3,
        target: Vec3,
        bounds: SafeBounds,
        rng: &mut Rng,
    ) -> (PathPlan, PlanKind) {
        if !occlusion.is_path_obstructed(world, start, target) {
            return (PathPlan::direct(target), PlanKind::Direct);
        }

        let mut candidates: Vec<(Vec3, f32)> = (0..self.candidates)
            .map(|_| self.sample_candidate(start, target, bounds, rng))
            .filter(|point| !occlusion.is_inside_any_obstacle(world, cache, now, point.x, point.y))
            .map(|point| (point, point.distance(target)))
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        // The target itself takes the last slot.
        let max_intermediate = self.max_waypoints - 1;
        let mut chain = Vec::with_capacity(self.max_waypoints);
        let mut chain_end = start;

        for (point, _) in candidates.into_iter().take(self.considered) {
            if chain.len() >= max_intermediate {
                break;
            }
            if occlusion.is_path_obstructed(world, chain_end, point) {
                continue;
            }
            chain.push(point);
            chain_end = point;

            if !occlusion.is_path_obstructed(world, chain_end, target) {
                chain.push(target);
                break;
            }
        }

        if chain.is_empty() {
            (PathPlan::direct(target), PlanKind::Fallback)
        } else {
            (PathPlan::from_waypoints(chain), PlanKind::Chained)
        }
    }

    /// Convex blend of a target-directed point and a uniform room point.
    fn sample_candidate(&self, start: Vec3, target: Vec3, bounds: SafeBounds, rng: &mut Rng) -> Vec3 {
        let random = bounds.sample(rng, start.z);

        let reach = uniform(rng, BIAS_REACH_MIN, BIAS_REACH_MAX);
        let directed = bounds.clamp(start + (target - start).normalize_or_zero() * reach);

        let mut point = directed * self.target_bias + random * (1.0 - self.target_bias);
        point.z = start.z;
        bounds.clamp(point)
    }
}
