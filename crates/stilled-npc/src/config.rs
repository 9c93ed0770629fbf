//! Tuning parameters for the spectral entity.
//!
//! Every numeric policy of the behavior core lives here: body size, perception
//! thresholds, timer ranges, the room-bound safety fractions, memory lifetimes,
//! path sampling, and the probabilities of each randomized recovery. The values
//! can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use stilled_common::ConfigError;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "spectre.toml";

/// Behavior and navigation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    // === Body ===
    /// Base movement speed (units per second)
    pub speed: f32,
    /// Collision radius used to inflate obstacle footprints
    pub radius: f32,
    /// Body height; the agent rests at half of it
    pub height: f32,

    // === Perception ===
    /// Minimum comfortable distance to the target
    pub safe_distance: f32,
    /// Distance at which the target is noticed
    pub detection_radius: f32,
    /// Flee only when watched closer than this
    pub flee_threshold: f32,
    /// Seconds of being watched to reach full observed level
    pub awareness_time: f32,
    /// Cosine of the half-angle of the target's gaze cone
    pub watch_cos: f32,
    /// Observed level above which stalking turns into fleeing
    pub flee_observed_level: f32,

    // === Movement ===
    /// Lower bound of the stalk approach speed, as a fraction of `speed`
    pub stalk_min_speed_factor: f32,
    /// Flee speed as a multiple of `speed`
    pub flee_speed_factor: f32,
    /// Maximum random deviation of the flee heading (degrees)
    pub flee_jitter_degrees: f32,
    /// Seconds of look-ahead for the flee bound prediction
    pub flee_lookahead: f32,
    /// Seconds after which a flee always gives up
    pub flee_max_time: f32,

    // === Timers ===
    /// Shortest interval between direction choices
    pub walk_interval_min: f32,
    /// Longest interval between direction choices
    pub walk_interval_max: f32,
    /// Direction-choice interval factor while stalking
    pub stalk_interval_factor: f32,
    /// Direction-choice interval factor while fleeing
    pub flee_interval_factor: f32,
    /// Shortest interval between path re-plans
    pub replan_interval_min: f32,
    /// Longest interval between path re-plans
    pub replan_interval_max: f32,
    /// Seconds without progress before a stuck teleport
    pub blocked_timeout: f32,

    // === Room margins (fractions of the half extents) ===
    /// Tight bound enforced at the start of every tick
    pub hard_clamp_margin: f32,
    /// Violation beyond `hard_clamp_margin * extreme_violation_factor` teleports
    pub extreme_violation_factor: f32,
    /// Bound enforced while stepping and after teleports
    pub movement_margin: f32,
    /// Bound used for direction scoring, flee prediction and path sampling
    pub scoring_margin: f32,
    /// Bound used to sample teleport and spawn candidates
    pub teleport_margin: f32,

    // === Spatial memory ===
    /// Position history capacity
    pub history_capacity: usize,
    /// Minimum travel between two history samples
    pub history_sample_spacing: f32,
    /// Seconds between samples of a body whose steps are blocked
    pub history_sample_interval: f32,
    /// Lifetime of a remembered obstacle cell (seconds)
    pub obstacle_memory_lifetime: f32,
    /// Lifetime of a cached obstacle containment result (seconds)
    pub box_cache_lifetime: f32,
    /// Bucket size of the obstacle containment cache
    pub box_cache_bucket: f32,
    /// History points closer than this repel direction candidates
    pub repulsion_radius: f32,

    // === Local pathing ===
    /// Candidate waypoints sampled per plan
    pub path_candidates: usize,
    /// Best candidates considered when chaining
    pub path_candidates_considered: usize,
    /// Maximum waypoints in a plan
    pub max_waypoints: usize,
    /// Weight of the target-directed component of a candidate
    pub target_bias: f32,
    /// Distance at which a waypoint counts as reached
    pub waypoint_arrival_radius: f32,

    // === Recovery ===
    /// Candidates sampled per teleport
    pub teleport_attempts: usize,
    /// Candidates sampled when choosing a spawn point
    pub spawn_attempts: usize,

    // === Chances (0.0 - 1.0) ===
    /// Pick a random surviving direction instead of the cheapest
    pub exploration_chance: f32,
    /// Teleport when no direction survives scoring
    pub no_direction_teleport_chance: f32,
    /// Teleport when no path chain can be built
    pub no_path_teleport_chance: f32,
    /// Teleport when the target teleports
    pub target_teleport_follow_chance: f32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            // Body
            speed: 1.5,
            radius: 0.9,
            height: 1.8,

            // Perception
            safe_distance: 2.5,
            detection_radius: 20.0,
            flee_threshold: 8.0,
            awareness_time: 3.0,
            watch_cos: 0.866,
            flee_observed_level: 0.8,

            // Movement
            stalk_min_speed_factor: 0.7,
            flee_speed_factor: 1.5,
            flee_jitter_degrees: 30.0,
            flee_lookahead: 0.5,
            flee_max_time: 5.0,

            // Timers
            walk_interval_min: 1.5,
            walk_interval_max: 3.0,
            stalk_interval_factor: 0.7,
            flee_interval_factor: 0.4,
            replan_interval_min: 1.0,
            replan_interval_max: 2.0,
            blocked_timeout: 2.0,

            // Margins
            hard_clamp_margin: 0.45,
            extreme_violation_factor: 1.1,
            movement_margin: 0.6,
            scoring_margin: 0.7,
            teleport_margin: 0.6,

            // Spatial memory
            history_capacity: 15,
            history_sample_spacing: 0.5,
            history_sample_interval: 0.5,
            obstacle_memory_lifetime: 5.0,
            box_cache_lifetime: 1.0,
            box_cache_bucket: 0.5,
            repulsion_radius: 2.0,

            // Local pathing
            path_candidates: 20,
            path_candidates_considered: 10,
            max_waypoints: 5,
            target_bias: 0.7,
            waypoint_arrival_radius: 1.0,

            // Recovery
            teleport_attempts: 30,
            spawn_attempts: 200,

            // Chances
            exploration_chance: 0.2,
            no_direction_teleport_chance: 0.3,
            no_path_teleport_chance: 0.3,
            target_teleport_follow_chance: 0.2,
        }
    }
}

impl NpcConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("NPC config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load NPC config: {e}");
                Self::default()
            },
        }
    }

    /// Load and validate configuration, reporting any failure.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate();
        info!("Loaded NPC config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, contents)?;

        info!("Saved NPC config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Body
        self.speed = self.speed.clamp(0.01, 100.0);
        self.radius = self.radius.clamp(0.01, 10.0);
        self.height = self.height.clamp(0.01, 10.0);

        // Perception
        self.safe_distance = self.safe_distance.max(0.0);
        self.detection_radius = self.detection_radius.max(self.safe_distance);
        self.awareness_time = self.awareness_time.max(0.01);
        self.watch_cos = self.watch_cos.clamp(-1.0, 1.0);
        self.flee_observed_level = self.flee_observed_level.clamp(0.0, 1.0);

        // Movement
        self.stalk_min_speed_factor = self.stalk_min_speed_factor.clamp(0.0, 1.0);
        self.flee_jitter_degrees = self.flee_jitter_degrees.clamp(0.0, 180.0);

        // Timers
        self.walk_interval_min = self.walk_interval_min.max(0.0);
        self.walk_interval_max = self.walk_interval_max.max(self.walk_interval_min);
        self.replan_interval_min = self.replan_interval_min.max(0.0);
        self.replan_interval_max = self.replan_interval_max.max(self.replan_interval_min);

        // Margins
        self.hard_clamp_margin = self.hard_clamp_margin.clamp(0.01, 1.0);
        self.extreme_violation_factor = self.extreme_violation_factor.max(1.0);
        self.movement_margin = self.movement_margin.clamp(0.01, 1.0);
        self.scoring_margin = self.scoring_margin.clamp(0.01, 1.0);
        self.teleport_margin = self.teleport_margin.clamp(0.01, 1.0);

        // Memory
        self.history_capacity = self.history_capacity.max(1);
        self.history_sample_interval = self.history_sample_interval.max(0.01);
        self.obstacle_memory_lifetime = self.obstacle_memory_lifetime.max(0.0);
        self.box_cache_lifetime = self.box_cache_lifetime.max(0.0);
        self.box_cache_bucket = self.box_cache_bucket.max(0.01);

        // Pathing
        self.max_waypoints = self.max_waypoints.max(1);
        self.target_bias = self.target_bias.clamp(0.0, 1.0);

        // Chances
        self.exploration_chance = self.exploration_chance.clamp(0.0, 1.0);
        self.no_direction_teleport_chance = self.no_direction_teleport_chance.clamp(0.0, 1.0);
        self.no_path_teleport_chance = self.no_path_teleport_chance.clamp(0.0, 1.0);
        self.target_teleport_follow_chance = self.target_teleport_follow_chance.clamp(0.0, 1.0);
    }

    /// Speed while fleeing.
    #[must_use]
    pub fn flee_speed(&self) -> f32 {
        self.speed * self.flee_speed_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = NpcConfig::default();
        assert_eq!(config.safe_distance, 2.5);
        assert_eq!(config.detection_radius, 20.0);
        assert_eq!(config.flee_threshold, 8.0);
        assert_eq!(config.history_capacity, 15);
        assert!((config.flee_speed() - 2.25).abs() < 1e-5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = NpcConfig::default();

        config.exploration_chance = 3.0;
        config.movement_margin = 0.0;
        config.walk_interval_max = 0.5;
        config.history_capacity = 0;

        config.validate();

        assert_eq!(config.exploration_chance, 1.0);
        assert!((config.movement_margin - 0.01).abs() < 1e-6);
        assert_eq!(config.walk_interval_max, config.walk_interval_min);
        assert_eq!(config.history_capacity, 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("npc").join(CONFIG_FILE);

        let mut config = NpcConfig::default();
        config.speed = 2.0;
        config.teleport_attempts = 12;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = NpcConfig::try_load_from(&config_path).expect("Failed to load config");
        assert_eq!(loaded.speed, 2.0);
        assert_eq!(loaded.teleport_attempts, 12);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "speed = 3.0\n").expect("Failed to write config");

        let loaded = NpcConfig::load_from(&config_path);
        assert_eq!(loaded.speed, 3.0);
        assert_eq!(loaded.safe_distance, 2.5);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = NpcConfig::load_from("/nonexistent/path/spectre.toml");
        assert_eq!(config, NpcConfig::default());
    }

    #[test]
    fn test_config_load_garbage_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "speed = \"fast\"").expect("Failed to write config");

        assert!(NpcConfig::try_load_from(&config_path).is_err());
        assert_eq!(NpcConfig::load_from(&config_path), NpcConfig::default());
    }
}
