//! Scenario configuration.
//!
//! A scenario is the room, its obstacles, how the target moves and the NPC
//! tuning. It is read from a TOML file; anything missing takes its default.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fs;
use std::path::Path;
use stilled_common::{ConfigError, RoomBounds};
use stilled_npc::{NpcConfig, ObstacleFootprint};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "stilled.toml";

/// Eye height of a scripted target.
const TARGET_EYE_HEIGHT: f32 = 1.7;

/// How the target moves during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetScript {
    /// Stands still, looking along `facing`
    Fixed {
        /// Position
        position: Vec3,
        /// Look direction
        facing: Vec3,
    },
    /// Circles the room center, looking along the orbit
    Orbit {
        /// Orbit radius
        radius: f32,
        /// Seconds per revolution
        period: f32,
    },
}

impl Default for TargetScript {
    fn default() -> Self {
        Self::Orbit {
            radius: 6.0,
            period: 40.0,
        }
    }
}

impl TargetScript {
    /// Position and forward vector at `time` seconds.
    #[must_use]
    pub fn pose(&self, time: f32) -> (Vec3, Vec3) {
        match *self {
            Self::Fixed { position, facing } => (position, facing.normalize_or_zero()),
            Self::Orbit { radius, period } => {
                let angle = TAU * time / period;
                let (sin, cos) = angle.sin_cos();
                (
                    Vec3::new(radius * cos, radius * sin, TARGET_EYE_HEIGHT),
                    Vec3::new(-sin, cos, 0.0),
                )
            },
        }
    }
}

/// Scenario parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Run ===
    /// Number of ticks to simulate
    pub ticks: u64,
    /// Seconds per tick
    pub dt: f32,
    /// Seed for the agent and the scenario
    pub seed: u64,
    /// Teleport the target every this many seconds (None = never)
    pub teleport_target_every: Option<f32>,
    /// Requested spawn point (None = let the agent choose)
    pub spawn: Option<Vec3>,

    // === Scene ===
    /// Room extents
    pub room: RoomBounds,
    /// Static obstacles
    pub obstacles: Vec<ObstacleFootprint>,
    /// Target movement
    pub target: TargetScript,

    // === Agent ===
    /// NPC tuning
    pub npc: NpcConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 3600,
            dt: 1.0 / 60.0,
            seed: 1,
            teleport_target_every: None,
            spawn: None,
            room: RoomBounds::default(),
            obstacles: vec![
                ObstacleFootprint::new((-8.0, 3.0), 1.0, 1.0),
                ObstacleFootprint::new((5.0, -4.0), 1.5, 0.5),
                ObstacleFootprint::new((9.0, 4.0), 0.5, 2.0),
            ],
            target: TargetScript::default(),
            npc: NpcConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Scenario not found at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load scenario: {e}");
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
        info!("Loaded scenario from {}", path.display());
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

        info!("Saved scenario to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.ticks = self.ticks.max(1);
        self.dt = self.dt.clamp(0.001, 0.25);
        self.teleport_target_every = self.teleport_target_every.map(|every| every.max(0.1));

        if let Err(e) = self.room.check() {
            warn!("{e}, using the default room");
            self.room = RoomBounds::default();
        }

        self.obstacles.retain(|o| {
            o.half_extent_x > 0.0 && o.half_extent_y > 0.0 && o.center.0.is_finite() && o.center.1.is_finite()
        });

        if let TargetScript::Orbit { radius, period } = &mut self.target {
            *radius = radius.max(0.0);
            *period = period.max(0.1);
        }

        self.npc.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_scenario() {
        let config = SimConfig::default();
        assert_eq!(config.ticks, 3600);
        assert_eq!(config.obstacles.len(), 3);
        assert!(config.teleport_target_every.is_none());
        assert_eq!(config.npc, NpcConfig::default());
    }

    #[test]
    fn test_orbit_pose() {
        let script = TargetScript::Orbit {
            radius: 5.0,
            period: 20.0,
        };
        let (position, forward) = script.pose(5.0);
        assert!((position - Vec3::new(0.0, 5.0, TARGET_EYE_HEIGHT)).length() < 1e-4);
        assert!((forward - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_fixed_pose_normalizes_facing() {
        let script = TargetScript::Fixed {
            position: Vec3::new(1.0, 2.0, 1.7),
            facing: Vec3::new(0.0, 3.0, 0.0),
        };
        let (position, forward) = script.pose(12.0);
        assert_eq!(position, Vec3::new(1.0, 2.0, 1.7));
        assert!((forward - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_validation() {
        let mut config = SimConfig {
            ticks: 0,
            dt: 5.0,
            teleport_target_every: Some(0.0),
            room: RoomBounds {
                half_width: -1.0,
                half_length: 10.0,
                height: 4.0,
            },
            obstacles: vec![
                ObstacleFootprint::new((0.0, 0.0), 0.0, 1.0),
                ObstacleFootprint::new((2.0, 2.0), 1.0, 1.0),
            ],
            target: TargetScript::Orbit {
                radius: -3.0,
                period: 0.0,
            },
            ..SimConfig::default()
        };

        config.validate();

        assert_eq!(config.ticks, 1);
        assert_eq!(config.dt, 0.25);
        assert_eq!(config.teleport_target_every, Some(0.1));
        assert_eq!(config.room, RoomBounds::default());
        assert_eq!(config.obstacles.len(), 1);
        assert_eq!(
            config.target,
            TargetScript::Orbit {
                radius: 0.0,
                period: 0.1
            }
        );
    }

    #[test]
    fn test_scenario_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);

        let config = SimConfig {
            seed: 99,
            teleport_target_every: Some(4.0),
            target: TargetScript::Fixed {
                position: Vec3::new(-3.0, 1.0, 1.7),
                facing: Vec3::X,
            },
            ..SimConfig::default()
        };
        config.save_to(&config_path).expect("Failed to save scenario");

        let loaded = SimConfig::try_load_from(&config_path).expect("Failed to load scenario");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_scenario() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            "ticks = 10\n\n[target]\nkind = \"fixed\"\nposition = [0.0, 0.0, 1.7]\nfacing = [1.0, 0.0, 0.0]\n\n[npc]\nspeed = 2.0\n",
        )
        .expect("Failed to write scenario");

        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded.ticks, 10);
        assert_eq!(loaded.npc.speed, 2.0);
        assert_eq!(loaded.npc.safe_distance, 2.5);
        assert!(matches!(loaded.target, TargetScript::Fixed { .. }));
    }

    #[test]
    fn test_missing_scenario_uses_defaults() {
        let config = SimConfig::load_from("/nonexistent/path/stilled.toml");
        assert_eq!(config, SimConfig::default());
    }
}
