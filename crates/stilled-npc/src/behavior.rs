//! Finite-state behavior controller.
//!
//! Three states: wander (initial), stalk and flee. Transitions are driven by the
//! distance to the target and a time-integrated "observed" signal that rises
//! while the target looks at the agent and decays twice as fast otherwise.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::NpcConfig;
use crate::occlusion::OcclusionQuery;
use crate::world::AgentWorld;

/// Behavior state of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Roam the room, avoiding recent spots
    #[default]
    Wander,
    /// Follow the target while keeping a distance
    Stalk,
    /// Run from a target that keeps watching
    Flee,
}

impl BehaviorState {
    /// Get display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Wander => "wander",
            Self::Stalk => "stalk",
            Self::Flee => "flee",
        }
    }

    /// Scale applied to the base direction-choice interval.
    #[must_use]
    pub fn interval_factor(self, config: &NpcConfig) -> f32 {
        match self {
            Self::Wander => 1.0,
            Self::Stalk => config.stalk_interval_factor,
            Self::Flee => config.flee_interval_factor,
        }
    }

    /// Get all states.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Wander, Self::Stalk, Self::Flee]
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Whether the target is currently looking at the agent.
///
/// Requires the agent within detection range, an unobstructed line of sight,
/// and the agent inside the target's gaze cone.
pub fn is_target_watching<W: AgentWorld + ?Sized>(
    world: &W,
    occlusion: &OcclusionQuery,
    agent_position: Vec3,
    config: &NpcConfig,
) -> bool {
    let target = world.target_position();
    if target.distance(agent_position) > config.detection_radius {
        return false;
    }
    if occlusion.is_path_obstructed(world, target, agent_position) {
        return false;
    }

    let to_agent = (agent_position - target).normalize_or_zero();
    let forward = world.target_forward().normalize_or_zero();
    forward.dot(to_agent) > config.watch_cos
}

/// State, timers and the observed signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorController {
    state: BehaviorState,
    state_timer: f32,
    observed_level: f32,
}

impl BehaviorController {
    /// Creates a controller in the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.state
    }

    /// Seconds since the last transition.
    #[must_use]
    pub const fn state_timer(&self) -> f32 {
        self.state_timer
    }

    /// Smoothed "being watched" signal in `[0, 1]`.
    #[must_use]
    pub const fn observed_level(&self) -> f32 {
        self.observed_level
    }

    /// Integrates the observed signal over `dt`.
    pub fn observe(&mut self, watched: bool, dt: f32, awareness_time: f32) -> f32 {
        let rate = if watched {
            dt / awareness_time
        } else {
            -dt / (awareness_time * 0.5)
        };
        self.observed_level = (self.observed_level + rate).clamp(0.0, 1.0);
        self.observed_level
    }

    /// Advances the time spent in the current state.
    pub fn advance(&mut self, dt: f32) {
        self.state_timer += dt;
    }

    /// State the transition table selects at `distance`, if different from the current one.
    #[must_use]
    pub fn next_state(&self, distance: f32, config: &NpcConfig) -> Option<BehaviorState> {
        let safe = config.safe_distance;
        let detect = config.detection_radius;

        match self.state {
            BehaviorState::Wander if distance > safe && distance < detect => {
                Some(BehaviorState::Stalk)
            },
            BehaviorState::Stalk if distance < safe || distance > detect * 1.5 => {
                Some(BehaviorState::Wander)
            },
            BehaviorState::Stalk
                if self.observed_level > config.flee_observed_level
                    && distance < config.flee_threshold =>
            {
                Some(BehaviorState::Flee)
            },
            BehaviorState::Flee if self.state_timer > config.flee_max_time || distance > detect => {
                Some(BehaviorState::Wander)
            },
            _ => None,
        }
    }

    /// Switches state and resets the timer. Returns the previous state, or
    /// `None` when already in `to`.
    pub fn transition_to(&mut self, to: BehaviorState) -> Option<BehaviorState> {
        if self.state == to {
            return None;
        }
        let from = self.state;
        self.state = to;
        self.state_timer = 0.0;
        Some(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleFootprint;
    use proptest::prelude::*;

    struct Gaze {
        target: Vec3,
        forward: Vec3,
        blocked: bool,
    }

    impl AgentWorld for Gaze {
        fn target_position(&self) -> Vec3 {
            self.target
        }

        fn target_forward(&self) -> Vec3 {
            self.forward
        }

        fn segment_obstructed(&self, _from: Vec3, _to: Vec3) -> bool {
            self.blocked
        }

        fn obstacle_footprints(&self) -> &[ObstacleFootprint] {
            &[]
        }
    }

    fn controller_in(state: BehaviorState, observed: f32) -> BehaviorController {
        BehaviorController {
            state,
            state_timer: 0.0,
            observed_level: observed,
        }
    }

    #[test]
    fn test_wander_to_stalk_inside_ring() {
        let config = NpcConfig::default();
        let wander = controller_in(BehaviorState::Wander, 0.0);
        assert_eq!(wander.next_state(10.0, &config), Some(BehaviorState::Stalk));
        assert_eq!(wander.next_state(2.0, &config), None);
        assert_eq!(wander.next_state(25.0, &config), None);
    }

    #[test]
    fn test_stalk_too_close_always_wanders() {
        let config = NpcConfig::default();
        for observed in [0.0, 0.5, 0.81, 1.0] {
            let stalk = controller_in(BehaviorState::Stalk, observed);
            assert_eq!(stalk.next_state(1.0, &config), Some(BehaviorState::Wander));
        }
    }

    #[test]
    fn test_stalk_to_flee_when_watched() {
        let config = NpcConfig::default();
        assert_eq!(
            controller_in(BehaviorState::Stalk, 0.9).next_state(6.0, &config),
            Some(BehaviorState::Flee)
        );
        assert_eq!(controller_in(BehaviorState::Stalk, 0.9).next_state(9.0, &config), None);
        assert_eq!(controller_in(BehaviorState::Stalk, 0.5).next_state(6.0, &config), None);
        assert_eq!(
            controller_in(BehaviorState::Stalk, 0.0).next_state(31.0, &config),
            Some(BehaviorState::Wander)
        );
    }

    #[test]
    fn test_flee_gives_up() {
        let config = NpcConfig::default();
        let mut flee = controller_in(BehaviorState::Flee, 1.0);
        assert_eq!(flee.next_state(5.0, &config), None);
        assert_eq!(flee.next_state(21.0, &config), Some(BehaviorState::Wander));
        flee.advance(5.1);
        assert_eq!(flee.next_state(5.0, &config), Some(BehaviorState::Wander));
    }

    #[test]
    fn test_transition_resets_timer() {
        let mut controller = BehaviorController::new();
        controller.advance(3.0);
        assert_eq!(controller.transition_to(BehaviorState::Wander), None);
        assert_eq!(controller.state_timer(), 3.0);
        assert_eq!(controller.transition_to(BehaviorState::Stalk), Some(BehaviorState::Wander));
        assert_eq!(controller.state_timer(), 0.0);
    }

    #[test]
    fn test_observed_rise_and_decay_rates() {
        let mut controller = BehaviorController::new();
        controller.observe(true, 1.5, 3.0);
        assert!((controller.observed_level() - 0.5).abs() < 1e-6);
        controller.observe(false, 0.75, 3.0);
        assert!(controller.observed_level().abs() < 1e-6);
    }

    #[test]
    fn test_watching_requires_gaze_cone_and_sight() {
        let config = NpcConfig::default();
        let occlusion = OcclusionQuery::new(&config);
        let agent = Vec3::new(0.0, 5.0, 0.9);
        let mut world = Gaze {
            target: Vec3::new(0.0, 0.0, 0.9),
            forward: Vec3::Y,
            blocked: false,
        };
        assert!(is_target_watching(&world, &occlusion, agent, &config));

        world.forward = Vec3::new(1.0, 1.0, 0.0);
        assert!(!is_target_watching(&world, &occlusion, agent, &config));

        world.forward = Vec3::Y;
        world.blocked = true;
        assert!(!is_target_watching(&world, &occlusion, agent, &config));

        world.blocked = false;
        assert!(!is_target_watching(&world, &occlusion, Vec3::new(0.0, 25.0, 0.9), &config));
    }

    proptest! {
        #[test]
        fn prop_observed_level_stays_in_unit_range(
            steps in prop::collection::vec((any::<bool>(), 0.0f32..5.0), 0..200)
        ) {
            let mut controller = BehaviorController::new();
            for (watched, dt) in steps {
                let level = controller.observe(watched, dt, 3.0);
                prop_assert!((0.0..=1.0).contains(&level));
            }
        }
    }
}
