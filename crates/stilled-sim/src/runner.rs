//! Fixed-timestep run of one agent in a scripted scenario.

use anyhow::{Context, Result};
use fastrand::Rng;
use glam::Vec3;
use serde::Serialize;
use std::collections::BTreeMap;
use stilled_common::{PlanarExt, SafeBounds};
use stilled_npc::{Agent, AgentEvent, AgentWorld, BehaviorState, EventBus, TickReport, WorldEvent};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::world::{BoxRoom, Puppet};

/// Agent event channel capacity; drained every tick.
const EVENT_CAPACITY: usize = 256;

/// Fraction of the room the target may be teleported into.
const TARGET_TELEPORT_FRACTION: f32 = 0.8;

/// Fraction of the room the target is kept inside.
const TARGET_ROAM_FRACTION: f32 = 0.9;

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Ticks simulated
    pub ticks: u64,
    /// Simulated seconds
    pub seconds: f64,
    /// Total teleports of the agent
    pub teleports: u64,
    /// Teleports per trigger
    pub teleports_by_reason: BTreeMap<String, u64>,
    /// Behavior state transitions
    pub transitions: u64,
    /// Seconds spent in each state
    pub seconds_per_state: BTreeMap<String, f64>,
    /// Mood changes
    pub mood_changes: u64,
    /// Target teleports sent to the agent
    pub target_teleports: u64,
    /// State at the end of the run
    pub final_state: BehaviorState,
    /// Position at the end of the run
    pub final_position: Vec3,
}

/// Scenario being driven.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: BoxRoom,
    agent: Agent,
    puppet: Puppet,
    agent_events: EventBus<AgentEvent>,
    world_events: EventBus<WorldEvent>,
    rng: Rng,
    clock: f64,
    target_shift: Vec3,
    next_target_teleport: Option<f64>,
    summary: RunSummary,
}

impl Simulation {
    /// Builds the room, places the target and spawns the agent.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.room.check().context("invalid room")?;

        let mut world = BoxRoom::new(config.obstacles.clone(), config.npc.radius);
        let (position, forward) = config.target.pose(0.0);
        world.set_target(config.room.safe(TARGET_ROAM_FRACTION).clamp(position), forward);

        let agent_events = EventBus::new(EVENT_CAPACITY);
        let world_events = EventBus::new(EVENT_CAPACITY);

        let agent = match config.spawn {
            Some(requested) => {
                Agent::spawn_at(config.npc.clone(), config.room, &world, requested, config.seed)
            },
            None => Agent::spawn(config.npc.clone(), config.room, &world, config.seed),
        };
        let mut agent = agent.with_events(agent_events.sender());
        agent.subscribe(world_events.receiver());

        let summary = RunSummary {
            ticks: 0,
            seconds: 0.0,
            teleports: 0,
            teleports_by_reason: BTreeMap::new(),
            transitions: 0,
            seconds_per_state: BehaviorState::all()
                .iter()
                .map(|state| (state.display_name().to_string(), 0.0))
                .collect(),
            mood_changes: 0,
            target_teleports: 0,
            final_state: agent.state(),
            final_position: agent.position(),
        };

        Ok(Self {
            next_target_teleport: config.teleport_target_every.map(f64::from),
            rng: Rng::with_seed(config.seed.wrapping_add(1)),
            config,
            world,
            agent,
            puppet: Puppet::default(),
            agent_events,
            world_events,
            clock: 0.0,
            target_shift: Vec3::ZERO,
            summary,
        })
    }

    /// Runs every configured tick and returns the summary.
    pub fn run(mut self) -> RunSummary {
        info!(
            ticks = self.config.ticks,
            dt = self.config.dt,
            seed = self.config.seed,
            "simulation starting"
        );

        for _ in 0..self.config.ticks {
            self.tick();
        }

        info!(
            teleports = self.summary.teleports,
            transitions = self.summary.transitions,
            position = ?self.puppet.position,
            velocity = ?self.puppet.velocity,
            facing = ?self.puppet.facing,
            "simulation finished"
        );
        self.summary
    }

    /// Advances the scenario by one tick.
    pub fn tick(&mut self) -> TickReport {
        let dt = self.config.dt;
        self.clock += f64::from(dt);

        self.move_target();
        let report = self.agent.update(dt, &self.world, &mut self.puppet);
        self.drain_events();

        self.summary.ticks += 1;
        self.summary.seconds = self.clock;
        if let Some(seconds) = self.summary.seconds_per_state.get_mut(report.state.display_name()) {
            *seconds += f64::from(dt);
        }
        self.summary.final_state = report.state;
        self.summary.final_position = report.position;

        report
    }

    fn target_bounds(&self) -> SafeBounds {
        self.config.room.safe(TARGET_ROAM_FRACTION)
    }

    fn move_target(&mut self) {
        let (scripted, forward) = self.config.target.pose(self.clock as f32);

        if let (Some(at), Some(every)) = (self.next_target_teleport, self.config.teleport_target_every) {
            if self.clock >= at {
                let destination = self
                    .config
                    .room
                    .safe(TARGET_TELEPORT_FRACTION)
                    .sample(&mut self.rng, scripted.z);
                self.target_shift = (destination - scripted).planar();
                self.next_target_teleport = Some(at + f64::from(every));
                self.summary.target_teleports += 1;

                let position = self.target_bounds().clamp(scripted + self.target_shift);
                debug!(?position, "target teleported");
                self.world.set_target(position, forward);
                self.world_events.publish(WorldEvent::TargetTeleported { position });
                return;
            }
        }

        let position = self.target_bounds().clamp(scripted + self.target_shift);
        self.world.set_target(position, forward);
    }

    fn drain_events(&mut self) {
        for event in self.agent_events.drain() {
            match event {
                AgentEvent::Teleported { from, to, reason, .. } => {
                    self.summary.teleports += 1;
                    *self
                        .summary
                        .teleports_by_reason
                        .entry(format!("{reason:?}"))
                        .or_insert(0) += 1;
                    debug!(?from, ?to, ?reason, "agent teleported");
                },
                AgentEvent::StateChanged { from, to, .. } => {
                    self.summary.transitions += 1;
                    debug!(%from, %to, t = self.clock, "agent changed state");
                },
                AgentEvent::MoodChanged { mood, .. } => {
                    self.summary.mood_changes += 1;
                    debug!(?mood, "agent mood changed");
                },
                other => debug!(?other, "agent event"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetScript;
    use stilled_npc::ObstacleFootprint;

    fn short_run(ticks: u64) -> SimConfig {
        SimConfig {
            ticks,
            seed: 5,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_run_accounts_every_tick() {
        let config = short_run(600);
        let dt = f64::from(config.dt);
        let summary = Simulation::new(config).expect("valid scenario").run();

        assert_eq!(summary.ticks, 600);
        let total: f64 = summary.seconds_per_state.values().sum();
        assert!((total - 600.0 * dt).abs() < 1e-6);
        assert!((summary.seconds - 600.0 * dt).abs() < 1e-6);
        assert_eq!(summary.teleports, summary.teleports_by_reason.values().sum::<u64>());
    }

    #[test]
    fn test_same_seed_same_summary() {
        let a = Simulation::new(short_run(400)).expect("valid scenario").run();
        let b = Simulation::new(short_run(400)).expect("valid scenario").run();
        assert_eq!(a, b);
    }

    #[test]
    fn test_agent_stays_in_room() {
        let mut sim = Simulation::new(short_run(1200)).expect("valid scenario");
        let bounds = sim.agent.containment().movement_bounds();
        for _ in 0..1200 {
            let report = sim.tick();
            assert!(bounds.contains(report.position));
        }
    }

    #[test]
    fn test_target_teleports_are_sent() {
        let config = SimConfig {
            teleport_target_every: Some(1.0),
            target: TargetScript::Fixed {
                position: Vec3::new(0.0, 0.0, 1.7),
                facing: Vec3::X,
            },
            ..short_run(300)
        };
        let mut sim = Simulation::new(config).expect("valid scenario");
        let bounds = sim.config.room.safe(TARGET_TELEPORT_FRACTION);
        for _ in 0..300 {
            sim.tick();
            assert!(bounds.contains(sim.world.target_position()));
        }
        // Five seconds of run time at one jump per second.
        assert!((4..=5).contains(&sim.summary.target_teleports));
    }

    #[test]
    fn test_requested_spawn_is_used() {
        let config = SimConfig {
            spawn: Some(Vec3::new(-10.0, -4.0, 0.9)),
            obstacles: vec![ObstacleFootprint::new((6.0, 0.0), 1.0, 1.0)],
            ..short_run(1)
        };
        let sim = Simulation::new(config).expect("valid scenario");
        assert_eq!(sim.agent.position(), Vec3::new(-10.0, -4.0, 0.9));
    }
}
