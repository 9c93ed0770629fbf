//! Obstruction queries against the host's collision oracle.

use glam::Vec3;
use stilled_common::QuantizedCell;

use crate::config::NpcConfig;
use crate::memory::BoxCheckCache;
use crate::world::AgentWorld;

/// Height above the floor at which segment tests are cast.
pub const FLOOR_OFFSET: f32 = 0.1;

/// Segments shorter than this are never obstructed.
const MIN_SEGMENT: f32 = 0.001;

/// Thin query layer over [`AgentWorld`].
///
/// Segment tests always go to the oracle. Containment tests are cached per
/// quantized cell because direction scoring issues many of them per tick.
#[derive(Debug, Clone, Copy)]
pub struct OcclusionQuery {
    /// Agent radius added to every footprint
    inflate: f32,
    /// Cache bucket size
    bucket: f32,
}

impl OcclusionQuery {
    /// Creates a query layer from the config.
    #[must_use]
    pub fn new(config: &NpcConfig) -> Self {
        Self {
            inflate: config.radius,
            bucket: config.box_cache_bucket,
        }
    }

    /// Whether a solid blocks the straight segment between two points.
    pub fn is_path_obstructed<W: AgentWorld + ?Sized>(&self, world: &W, from: Vec3, to: Vec3) -> bool {
        if from.distance(to) < MIN_SEGMENT {
            return false;
        }
        let lift = Vec3::new(0.0, 0.0, FLOOR_OFFSET);
        world.segment_obstructed(from + lift, to + lift)
    }

    /// Whether a floor point lies inside any obstacle footprint grown by the agent radius.
    pub fn is_inside_any_obstacle<W: AgentWorld + ?Sized>(
        &self,
        world: &W,
        cache: &mut BoxCheckCache,
        now: f64,
        x: f32,
        y: f32,
    ) -> bool {
        let key = QuantizedCell::from_xy(x, y, self.bucket);
        if let Some(result) = cache.get(key, now) {
            return result;
        }

        let inside = world
            .obstacle_footprints()
            .iter()
            .any(|footprint| footprint.contains_inflated(x, y, self.inflate));
        cache.insert(key, inside, now);
        inside
    }

    /// Uncached containment test, for one-off checks outside the tick.
    pub fn is_inside_uncached<W: AgentWorld + ?Sized>(&self, world: &W, x: f32, y: f32) -> bool {
        world
            .obstacle_footprints()
            .iter()
            .any(|footprint| footprint.contains_inflated(x, y, self.inflate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleFootprint;
    use std::cell::Cell;

    struct CountingWorld {
        footprints: Vec<ObstacleFootprint>,
        segment_calls: Cell<u32>,
        last_segment: Cell<(Vec3, Vec3)>,
    }

    impl AgentWorld for CountingWorld {
        fn target_position(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn target_forward(&self) -> Vec3 {
            Vec3::Y
        }

        fn segment_obstructed(&self, from: Vec3, to: Vec3) -> bool {
            self.segment_calls.set(self.segment_calls.get() + 1);
            self.last_segment.set((from, to));
            true
        }

        fn obstacle_footprints(&self) -> &[ObstacleFootprint] {
            &self.footprints
        }
    }

    fn world() -> CountingWorld {
        CountingWorld {
            footprints: vec![ObstacleFootprint::new((0.0, 0.0), 1.0, 1.0)],
            segment_calls: Cell::new(0),
            last_segment: Cell::new((Vec3::ZERO, Vec3::ZERO)),
        }
    }

    #[test]
    fn test_segment_lifted_above_floor() {
        let world = world();
        let query = OcclusionQuery::new(&NpcConfig::default());
        assert!(query.is_path_obstructed(&world, Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)));
        let (from, to) = world.last_segment.get();
        assert!((from.z - FLOOR_OFFSET).abs() < 1e-6);
        assert!((to.z - FLOOR_OFFSET).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_segment_is_clear() {
        let world = world();
        let query = OcclusionQuery::new(&NpcConfig::default());
        assert!(!query.is_path_obstructed(&world, Vec3::ONE, Vec3::ONE));
        assert_eq!(world.segment_calls.get(), 0);
    }

    #[test]
    fn test_containment_inflated_by_radius() {
        let world = world();
        let query = OcclusionQuery::new(&NpcConfig::default());
        let mut cache = BoxCheckCache::new(1.0);
        assert!(query.is_inside_any_obstacle(&world, &mut cache, 0.0, 1.8, 0.0));
        assert!(!query.is_inside_any_obstacle(&world, &mut cache, 0.0, 2.1, 0.0));
    }

    #[test]
    fn test_containment_cached_within_bucket() {
        let mut world = world();
        let query = OcclusionQuery::new(&NpcConfig::default());
        let mut cache = BoxCheckCache::new(1.0);
        assert!(query.is_inside_any_obstacle(&world, &mut cache, 0.0, 0.1, 0.1));

        // Obstacle removed, but the cached answer stands until it expires.
        world.footprints.clear();
        assert!(query.is_inside_any_obstacle(&world, &mut cache, 0.5, 0.2, 0.2));
        assert!(!query.is_inside_any_obstacle(&world, &mut cache, 1.5, 0.2, 0.2));
    }
}
