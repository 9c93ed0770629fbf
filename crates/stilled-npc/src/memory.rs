//! Spatial memory: recent positions, failed cells, and the containment cache.
//!
//! All lifetimes are measured in simulation seconds fed through [`SpatialMemory::tick`],
//! never wall-clock reads, so replays with the same `dt` sequence are identical.

use ahash::AHashMap;
use glam::Vec3;
use std::collections::VecDeque;
use stilled_common::{GridCell, PlanarExt, QuantizedCell};

use crate::config::NpcConfig;

/// Number of recent samples used by stuck detection.
const STUCK_WINDOW: usize = 3;

/// Short-lived cache of "is this point inside an obstacle" answers.
#[derive(Debug, Clone, Default)]
pub struct BoxCheckCache {
    entries: AHashMap<QuantizedCell, (bool, f64)>,
    lifetime: f64,
}

impl BoxCheckCache {
    /// Creates an empty cache whose entries live for `lifetime` seconds.
    #[must_use]
    pub fn new(lifetime: f32) -> Self {
        Self {
            entries: AHashMap::new(),
            lifetime: f64::from(lifetime),
        }
    }

    /// Cached answer for `key`, if it is still fresh at `now`.
    #[must_use]
    pub fn get(&self, key: QuantizedCell, now: f64) -> Option<bool> {
        self.entries
            .get(&key)
            .filter(|(_, stamp)| now - stamp <= self.lifetime)
            .map(|(result, _)| *result)
    }

    /// Stores an answer computed at `now`.
    pub fn insert(&mut self, key: QuantizedCell, result: bool, now: f64) {
        self.entries.insert(key, (result, now));
    }

    /// Drops every entry older than the lifetime.
    pub fn purge(&mut self, now: f64) {
        let lifetime = self.lifetime;
        self.entries.retain(|_, (_, stamp)| now - *stamp <= lifetime);
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Memory owned by an agent.
#[derive(Debug, Clone)]
pub struct SpatialMemory {
    /// Recent positions, oldest first
    history: VecDeque<Vec3>,
    /// Maximum history length
    capacity: usize,
    /// Minimum travel between two samples
    sample_spacing: f32,
    /// Time between samples while blocked
    sample_interval: f64,
    /// Simulation time of the latest sample
    last_sample_at: f64,
    /// Cells where a move recently failed, with remaining lifetime
    obstacles: AHashMap<GridCell, f32>,
    /// Lifetime given to newly remembered cells
    obstacle_lifetime: f32,
    /// Obstacle containment cache
    box_cache: BoxCheckCache,
}

impl SpatialMemory {
    /// Creates an empty memory sized from the config.
    #[must_use]
    pub fn new(config: &NpcConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            capacity: config.history_capacity.max(1),
            sample_spacing: config.history_sample_spacing,
            sample_interval: f64::from(config.history_sample_interval),
            last_sample_at: 0.0,
            obstacles: AHashMap::new(),
            obstacle_lifetime: config.obstacle_memory_lifetime,
            box_cache: BoxCheckCache::new(config.box_cache_lifetime),
        }
    }

    // ------------------------------------------------------------------
    // Position history
    // ------------------------------------------------------------------

    /// Appends a sample, evicting the oldest when full.
    pub fn record_position(&mut self, position: Vec3) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(position);
    }

    /// Appends a sample once the agent has travelled far enough from the
    /// latest one. While `blocked`, a sample is also taken every sample
    /// interval so a pinned body fills its history. Returns whether a sample was taken.
    pub fn observe_position(&mut self, position: Vec3, now: f64, blocked: bool) -> bool {
        let due = match self.history.back() {
            None => true,
            Some(last) => {
                last.planar_distance(position) > self.sample_spacing
                    || (blocked && now - self.last_sample_at >= self.sample_interval)
            },
        };
        if due {
            self.record_position(position);
            self.last_sample_at = now;
        }
        due
    }

    /// Recent positions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Vec3> + '_ {
        self.history.iter()
    }

    /// Number of stored samples.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forgets every position sample.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Cost of standing at `point` given where the agent has recently been.
    ///
    /// Each sample within `radius` adds `10 / (d + 0.1)`.
    #[must_use]
    pub fn repulsion_cost(&self, point: Vec3, radius: f32) -> f32 {
        self.history
            .iter()
            .map(|sample| sample.planar_distance(point))
            .filter(|d| *d < radius)
            .map(|d| 10.0 / (d + 0.1))
            .sum()
    }

    /// Whether the last few samples all sit within `threshold` (summed) of `current`.
    #[must_use]
    pub fn is_stuck(&self, current: Vec3, threshold: f32) -> bool {
        if self.history.len() < STUCK_WINDOW {
            return false;
        }
        let total: f32 = self
            .history
            .iter()
            .rev()
            .take(STUCK_WINDOW)
            .map(|sample| sample.planar_distance(current))
            .sum();
        total < threshold
    }

    // ------------------------------------------------------------------
    // Obstacle memory
    // ------------------------------------------------------------------

    /// Remembers a failed cell with the configured lifetime.
    pub fn remember_obstacle(&mut self, cell: GridCell) {
        self.obstacles.insert(cell, self.obstacle_lifetime);
    }

    /// Remembers a failed cell with an explicit lifetime.
    pub fn remember_obstacle_for(&mut self, cell: GridCell, lifetime: f32) {
        self.obstacles.insert(cell, lifetime);
    }

    /// Whether a move recently failed in `cell`.
    #[must_use]
    pub fn is_obstacle_remembered(&self, cell: GridCell) -> bool {
        self.obstacles.contains_key(&cell)
    }

    /// Number of remembered cells.
    #[must_use]
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    // ------------------------------------------------------------------
    // Cache access and aging
    // ------------------------------------------------------------------

    /// Obstacle containment cache.
    pub fn box_cache_mut(&mut self) -> &mut BoxCheckCache {
        &mut self.box_cache
    }

    /// Obstacle containment cache (read-only).
    #[must_use]
    pub fn box_cache(&self) -> &BoxCheckCache {
        &self.box_cache
    }

    /// Ages remembered cells by `dt` and purges stale cache entries.
    pub fn tick(&mut self, dt: f32, now: f64) {
        self.obstacles.retain(|_, lifetime| {
            *lifetime -= dt;
            *lifetime > 0.0
        });
        self.box_cache.purge(now);
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.history.clear();
        self.obstacles.clear();
        self.box_cache.clear();
    }
}
