//! The spectral entity.
//!
//! An [`Agent`] owns its whole simulation state: transform, behavior state,
//! spatial memory, path plan, presence cues and a seeded RNG. The host drives
//! it with one [`Agent::update`] call per tick and reads the world back to it
//! through [`AgentWorld`]; the agent never mutates anything but itself and the
//! [`AgentSink`] it is handed.

use crossbeam_channel::{Receiver, Sender};
use fastrand::Rng;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use stilled_common::{uniform, AgentId, GridCell, PlanarExt, RoomBounds};
use tracing::{debug, info, trace, warn};

use crate::behavior::{is_target_watching, BehaviorController, BehaviorState};
use crate::config::NpcConfig;
use crate::containment::{ContainmentPolicy, HardClamp};
use crate::direction::{center_heading, pick_direction, score_directions, DirectionChoice};
use crate::events::{AgentEvent, TeleportReason, WorldEvent};
use crate::memory::SpatialMemory;
use crate::occlusion::OcclusionQuery;
use crate::path::{LocalPathPlanner, PathPlan, PlanKind};
use crate::presence::{whisper_volume, Mood, PresenceCues};
use crate::spawn::{find_spawn_point, resolve_requested_spawn, SpawnSource};
use crate::world::{AgentSink, AgentWorld};

/// Facing blend rate per second.
const FACING_RATE: f32 = 5.0;
/// Facing only follows velocity above this squared speed.
const FACING_MIN_SPEED_SQ: f32 = 0.01;
/// Direction re-choice delay after a blocked step.
const HIT_RECHOICE_DELAY: f32 = 0.1;
/// Upper bound of the direction re-choice delay after a hard clamp.
const CLAMP_RECHOICE_DELAY: f32 = 0.2;
/// Stuck threshold as a fraction of the radius.
const STUCK_RADIUS_FRACTION: f32 = 0.8;
/// Stalking backs off inside this multiple of the safe distance.
const STALK_BACKOFF_FACTOR: f32 = 1.5;
/// Fleeing gives up beyond this multiple of the detection radius.
const FLEE_GIVE_UP_FACTOR: f32 = 1.2;

/// Snapshot returned by every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// State after the tick
    pub state: BehaviorState,
    /// Position after the tick
    pub position: Vec3,
    /// Velocity after the tick
    pub velocity: Vec3,
    /// Observed level after the tick
    pub observed_level: f32,
    /// Mood after the tick
    pub mood: Mood,
    /// Whether the agent teleported during the tick
    pub teleported: bool,
}

/// Autonomous agent with its own memory and behavior state.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    config: NpcConfig,
    containment: ContainmentPolicy,
    occlusion: OcclusionQuery,
    planner: LocalPathPlanner,

    position: Vec3,
    velocity: Vec3,
    facing: Vec3,

    behavior: BehaviorController,
    memory: SpatialMemory,
    presence: PresenceCues,
    path: PathPlan,

    /// Countdown to the next direction choice or re-plan
    walk_timer: f32,
    /// Seconds of no progress
    blocked_timer: f32,
    /// Simulation clock fed by `dt`
    clock: f64,

    rng: Rng,
    events: Option<Sender<AgentEvent>>,
    subscription: Option<Receiver<WorldEvent>>,

    announced: bool,
    teleports: u64,
    teleported_this_tick: bool,
}

impl Agent {
    /// Creates an agent at a spawn point chosen away from the target.
    pub fn spawn<W: AgentWorld + ?Sized>(
        config: NpcConfig,
        room: RoomBounds,
        world: &W,
        seed: u64,
    ) -> Self {
        let mut agent = Self::unplaced(config, room, seed);
        let (position, source) = find_spawn_point(
            world,
            &agent.occlusion,
            &agent.containment,
            &agent.config,
            &mut agent.rng,
        );
        agent.place(position, source);
        agent
    }

    /// Creates an agent at `requested` if that point is valid, otherwise
    /// at a spawn point chosen as [`Agent::spawn`] does.
    pub fn spawn_at<W: AgentWorld + ?Sized>(
        config: NpcConfig,
        room: RoomBounds,
        world: &W,
        requested: Vec3,
        seed: u64,
    ) -> Self {
        let mut agent = Self::unplaced(config, room, seed);
        let (position, source) = resolve_requested_spawn(
            world,
            &agent.occlusion,
            &agent.containment,
            &agent.config,
            requested,
            &mut agent.rng,
        );
        agent.place(position, source);
        agent
    }

    fn unplaced(mut config: NpcConfig, room: RoomBounds, seed: u64) -> Self {
        config.validate();
        Self {
            id: AgentId::new(),
            containment: ContainmentPolicy::new(room, &config),
            occlusion: OcclusionQuery::new(&config),
            planner: LocalPathPlanner::new(&config),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            facing: Vec3::Y,
            behavior: BehaviorController::new(),
            memory: SpatialMemory::new(&config),
            presence: PresenceCues::new(),
            path: PathPlan::default(),
            walk_timer: 0.0,
            blocked_timer: 0.0,
            clock: 0.0,
            rng: Rng::with_seed(seed),
            events: None,
            subscription: None,
            announced: false,
            teleports: 0,
            teleported_this_tick: false,
            config,
        }
    }

    fn place(&mut self, position: Vec3, source: SpawnSource) {
        self.position = position;
        info!(agent = %self.id, ?position, ?source, "agent spawned");
    }

    /// Publishes events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: Sender<AgentEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Receives world notifications from `receiver`; they are handled at the
    /// start of every tick.
    pub fn subscribe(&mut self, receiver: Receiver<WorldEvent>) {
        self.subscription = Some(receiver);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Agent ID.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &NpcConfig {
        &self.config
    }

    /// Containment policy for this agent's room.
    #[must_use]
    pub const fn containment(&self) -> &ContainmentPolicy {
        &self.containment
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Current velocity.
    #[must_use]
    pub const fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Smoothed visual heading.
    #[must_use]
    pub const fn facing(&self) -> Vec3 {
        self.facing
    }

    /// Current behavior state.
    #[must_use]
    pub const fn state(&self) -> BehaviorState {
        self.behavior.state()
    }

    /// Seconds since the last transition.
    #[must_use]
    pub const fn state_timer(&self) -> f32 {
        self.behavior.state_timer()
    }

    /// Smoothed "being watched" signal.
    #[must_use]
    pub const fn observed_level(&self) -> f32 {
        self.behavior.observed_level()
    }

    /// Seconds without progress.
    #[must_use]
    pub const fn blocked_timer(&self) -> f32 {
        self.blocked_timer
    }

    /// Countdown to the next direction choice.
    #[must_use]
    pub const fn walk_timer(&self) -> f32 {
        self.walk_timer
    }

    /// Current mood.
    #[must_use]
    pub const fn mood(&self) -> Mood {
        self.presence.mood()
    }

    /// Current face opacity.
    #[must_use]
    pub const fn face_opacity(&self) -> f32 {
        self.presence.face_opacity()
    }

    /// Whisper volume for the current state.
    #[must_use]
    pub const fn whisper_volume(&self) -> f32 {
        whisper_volume(self.behavior.state())
    }

    /// Current path plan.
    #[must_use]
    pub const fn path(&self) -> &PathPlan {
        &self.path
    }

    /// Spatial memory.
    #[must_use]
    pub const fn memory(&self) -> &SpatialMemory {
        &self.memory
    }

    /// Spatial memory (mutable), for hosts seeding or inspecting it.
    pub fn memory_mut(&mut self) -> &mut SpatialMemory {
        &mut self.memory
    }

    /// Number of teleports so far.
    #[must_use]
    pub const fn teleport_count(&self) -> u64 {
        self.teleports
    }

    /// Overrides the velocity; containment still applies on the next tick.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Moves the agent without any check, as an external push would.
    /// The next tick's hard clamp corrects it.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advances the agent by `dt` seconds and commits the result to `sink`.
    pub fn update<W, S>(&mut self, dt: f32, world: &W, sink: &mut S) -> TickReport
    where
        W: AgentWorld + ?Sized,
        S: AgentSink + ?Sized,
    {
        self.teleported_this_tick = false;
        self.clock += f64::from(dt);

        if !self.announced {
            self.announced = true;
            self.publish(AgentEvent::Spawned {
                agent: self.id,
                position: self.position,
            });
        }

        self.poll_subscription(world);
        self.enforce_hard_bounds(world);
        self.memory.tick(dt, self.clock);

        let distance = self.position.planar_distance(world.target_position());
        let watched = is_target_watching(world, &self.occlusion, self.position, &self.config);
        let observed = self.behavior.observe(watched, dt, self.config.awareness_time);

        if let Some(mood) = self.presence.update(
            self.behavior.state(),
            distance,
            observed,
            watched,
            dt,
            &self.config,
            &mut self.rng,
        ) {
            self.publish(AgentEvent::MoodChanged {
                agent: self.id,
                mood,
            });
        }

        match self.behavior.state() {
            BehaviorState::Wander => self.update_wander(dt, world),
            BehaviorState::Stalk => self.update_stalk(dt, world),
            BehaviorState::Flee => self.update_flee(dt, world),
        }

        self.check_stuck(dt, world);

        self.behavior.advance(dt);
        let distance = self.position.planar_distance(world.target_position());
        if let Some(next) = self.behavior.next_state(distance, &self.config) {
            self.change_state(next);
        }

        self.update_facing(dt);

        sink.apply_position(self.position);
        sink.apply_velocity_intent(self.velocity);
        sink.apply_facing(self.facing);

        trace!(
            agent = %self.id,
            state = %self.behavior.state(),
            position = ?self.position,
            observed,
            "tick"
        );

        TickReport {
            state: self.behavior.state(),
            position: self.position,
            velocity: self.velocity,
            observed_level: self.behavior.observed_level(),
            mood: self.presence.mood(),
            teleported: self.teleported_this_tick,
        }
    }

    /// Reacts to the target teleporting: drops the plan, then either follows
    /// with a teleport of its own or falls back to wandering.
    pub fn on_target_teleported<W: AgentWorld + ?Sized>(&mut self, world: &W) {
        self.path.clear();
        if self.rng.f32() < self.config.target_teleport_follow_chance {
            self.teleport_away(world, TeleportReason::TargetTeleported);
            return;
        }
        self.change_state(BehaviorState::Wander);
    }

    fn poll_subscription<W: AgentWorld + ?Sized>(&mut self, world: &W) {
        let Some(receiver) = &self.subscription else {
            return;
        };
        let pending: Vec<WorldEvent> = receiver.try_iter().collect();
        for event in pending {
            match event {
                WorldEvent::TargetTeleported { position } => {
                    debug!(agent = %self.id, ?position, "target teleported");
                    self.on_target_teleported(world);
                },
            }
        }
    }

    fn enforce_hard_bounds<W: AgentWorld + ?Sized>(&mut self, world: &W) {
        match self.containment.hard_clamp(self.position, self.velocity) {
            HardClamp::Inside => {},
            HardClamp::Clamped { position, velocity } => {
                trace!(agent = %self.id, from = ?self.position, to = ?position, "hard clamp");
                self.position = position;
                self.velocity = velocity;
                self.walk_timer = self.walk_timer.min(CLAMP_RECHOICE_DELAY);
            },
            HardClamp::Extreme { position, velocity } => {
                warn!(agent = %self.id, position = ?self.position, "extreme bound violation");
                self.position = position;
                self.velocity = velocity;
                self.walk_timer = self.walk_timer.min(CLAMP_RECHOICE_DELAY);
                self.teleport_away(world, TeleportReason::BoundsViolation);
            },
        }
    }

    // ------------------------------------------------------------------
    // States
    // ------------------------------------------------------------------

    fn update_wander<W: AgentWorld + ?Sized>(&mut self, dt: f32, world: &W) {
        self.walk_timer -= dt;
        if self.walk_timer <= 0.0 {
            self.choose_new_direction(world);
        }

        if self.velocity.length_squared() > 0.0 {
            self.step(dt, world);
        }

        if self.position.planar_distance(world.target_position()) < self.config.safe_distance {
            self.teleport_away(world, TeleportReason::TooClose);
        }
    }

    fn update_stalk<W: AgentWorld + ?Sized>(&mut self, dt: f32, world: &W) {
        self.walk_timer -= dt;

        let target = world.target_position();
        let to_target = (target - self.position).planar();
        let distance = to_target.length();
        let heading = to_target.normalize_or_zero();
        let speed = self.config.speed;

        if self.occlusion.is_path_obstructed(world, self.position, target) {
            if self.path.is_empty() || self.walk_timer <= 0.0 {
                if self.replan(world, target) {
                    return;
                }
                self.walk_timer =
                    uniform(&mut self.rng, self.config.replan_interval_min, self.config.replan_interval_max);
            }

            let arrival = self.config.waypoint_arrival_radius;
            let mut heading = self.path.steer(self.position, arrival);
            if heading.is_none() {
                if self.replan(world, target) {
                    return;
                }
                heading = self.path.steer(self.position, arrival);
            }
            if let Some(direction) = heading {
                self.velocity = direction * speed;
            }
        } else if distance < self.config.safe_distance * STALK_BACKOFF_FACTOR {
            self.velocity = -heading * speed;
        } else {
            let min_factor = self.config.stalk_min_speed_factor;
            let approach = (speed * min_factor
                + distance / self.config.detection_radius * speed * (1.0 - min_factor))
                .min(speed);
            self.velocity = heading * approach;
        }

        self.step(dt, world);
    }

    fn update_flee<W: AgentWorld + ?Sized>(&mut self, dt: f32, world: &W) {
        let target = world.target_position();
        let away = (self.position - target).planar();
        let distance = away.length();

        let jitter = self.config.flee_jitter_degrees;
        let angle = uniform(&mut self.rng, -jitter, jitter).to_radians();
        let mut direction = away.normalize_or_zero().rotate_about_z(angle);

        let flee_speed = self.config.flee_speed();
        let bounds = self.containment.scoring_bounds();
        let predicted = self.position + direction * flee_speed * self.config.flee_lookahead;
        if !bounds.contains(predicted) {
            if predicted.x.abs() > bounds.half_x {
                direction.x = -direction.x;
            }
            if predicted.y.abs() > bounds.half_y {
                direction.y = -direction.y;
            }
        }
        direction = if direction.length_squared() > 0.001 {
            direction.normalize()
        } else {
            center_heading(self.position, &mut self.rng)
        };
        self.velocity = direction * flee_speed;

        if distance > self.config.detection_radius * FLEE_GIVE_UP_FACTOR {
            self.teleport_away(world, TeleportReason::FleeTooFar);
            return;
        }
        if self.memory.is_obstacle_remembered(GridCell::from_position(self.position)) {
            self.teleport_away(world, TeleportReason::FleeObstacle);
            return;
        }

        self.step(dt, world);
    }

    /// Scores the eight headings and sets a new wander velocity.
    ///
    /// When every heading is rejected the agent either teleports or heads for
    /// the room center.
    pub fn choose_new_direction<W: AgentWorld + ?Sized>(&mut self, world: &W) {
        let survivors = score_directions(
            world,
            &self.occlusion,
            &mut self.memory,
            self.clock,
            self.position,
            self.containment.scoring_bounds(),
            &self.config,
        );

        match pick_direction(&survivors, self.config.exploration_chance, &mut self.rng) {
            DirectionChoice::Heading(direction) => {
                self.velocity = direction * self.config.speed;
            },
            DirectionChoice::Blocked => {
                if self.rng.f32() < self.config.no_direction_teleport_chance {
                    self.teleport_away(world, TeleportReason::NoDirection);
                    return;
                }
                debug!(agent = %self.id, "no free heading, steering to the center");
                self.velocity = center_heading(self.position, &mut self.rng) * self.config.speed;
            },
        }

        self.walk_timer = self.walk_interval(self.behavior.state());
    }

    /// Builds a new plan toward `target`. Returns whether the agent teleported instead.
    fn replan<W: AgentWorld + ?Sized>(&mut self, world: &W, target: Vec3) -> bool {
        let (plan, kind) = self.planner.plan(
            world,
            &self.occlusion,
            self.memory.box_cache_mut(),
            self.clock,
            self.position,
            target,
            self.containment.scoring_bounds(),
            &mut self.rng,
        );

        debug!(agent = %self.id, waypoints = plan.len(), ?kind, "path re-planned");
        self.publish(AgentEvent::PathReplanned {
            agent: self.id,
            waypoints: plan.len(),
        });
        self.path = plan;

        if kind == PlanKind::Fallback && self.rng.f32() < self.config.no_path_teleport_chance {
            self.teleport_away(world, TeleportReason::NoPath);
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Movement and recovery
    // ------------------------------------------------------------------

    fn step<W: AgentWorld + ?Sized>(&mut self, dt: f32, world: &W) {
        let start = self.position;
        let outcome = self.containment.step(world, start, self.velocity, dt);
        self.position = outcome.position;
        self.velocity = outcome.velocity;

        if outcome.hit_obstacle {
            let cell = GridCell::from_position(start);
            self.memory.remember_obstacle(cell);
            self.publish(AgentEvent::ObstacleRemembered {
                agent: self.id,
                cell,
            });
            self.velocity = -self.velocity;
            self.walk_timer = HIT_RECHOICE_DELAY;
        }

        self.memory.observe_position(self.position, self.clock, outcome.hit_obstacle);
    }

    fn check_stuck<W: AgentWorld + ?Sized>(&mut self, dt: f32, world: &W) {
        let threshold = self.config.radius * STUCK_RADIUS_FRACTION;
        if self.velocity.length_squared() > 0.0 && self.memory.is_stuck(self.position, threshold) {
            self.blocked_timer += dt;
            if self.blocked_timer > self.config.blocked_timeout {
                self.teleport_away(world, TeleportReason::Stuck);
                self.blocked_timer = 0.0;
            }
        } else {
            self.blocked_timer = 0.0;
        }
    }

    /// Relocates the agent to the free point farthest from the target, or
    /// near the room center when none was found. Returns the new position.
    pub fn teleport_away<W: AgentWorld + ?Sized>(&mut self, world: &W, reason: TeleportReason) -> Vec3 {
        let z = self.config.height * 0.5;
        let found = self.containment.find_teleport_target(
            world,
            &self.occlusion,
            self.memory.box_cache_mut(),
            self.clock,
            world.target_position(),
            z,
            &self.config,
            &mut self.rng,
        );
        let destination = found.unwrap_or_else(|| {
            debug!(agent = %self.id, "no teleport candidate, using the center fallback");
            self.containment.teleport_fallback(z, &mut self.rng)
        });

        let from = self.position;
        self.position = self.containment.clamp_to_movement(destination);
        self.velocity = Vec3::ZERO;
        self.walk_timer = 0.0;
        self.blocked_timer = 0.0;
        self.memory.clear_history();
        self.path.clear();
        self.teleports += 1;
        self.teleported_this_tick = true;

        debug!(agent = %self.id, ?reason, ?from, to = ?self.position, "teleported");
        self.publish(AgentEvent::Teleported {
            agent: self.id,
            from,
            to: self.position,
            reason,
        });
        if let Some(mood) = self.presence.set_mood(Mood::Scared) {
            self.publish(AgentEvent::MoodChanged {
                agent: self.id,
                mood,
            });
        }

        self.position
    }

    fn change_state(&mut self, next: BehaviorState) {
        let Some(from) = self.behavior.transition_to(next) else {
            return;
        };

        self.walk_timer = self.walk_interval(next);
        self.path.clear();

        debug!(agent = %self.id, %from, to = %next, "state changed");
        self.publish(AgentEvent::StateChanged {
            agent: self.id,
            from,
            to: next,
        });
        if let Some(mood) = self.presence.set_mood(Mood::on_enter(next)) {
            self.publish(AgentEvent::MoodChanged {
                agent: self.id,
                mood,
            });
        }
    }

    fn walk_interval(&mut self, state: BehaviorState) -> f32 {
        let base = uniform(
            &mut self.rng,
            self.config.walk_interval_min,
            self.config.walk_interval_max,
        );
        base * state.interval_factor(&self.config)
    }

    fn update_facing(&mut self, dt: f32) {
        if self.velocity.length_squared() <= FACING_MIN_SPEED_SQ {
            return;
        }
        let rate = (dt * FACING_RATE).min(1.0);
        let blended = self.facing * (1.0 - rate) + self.velocity.normalize() * rate;
        if blended.length_squared() > 0.001 {
            self.facing = blended.normalize();
        }
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(sender) = &self.events {
            // Non-blocking send - if full, event is dropped
            let _ = sender.try_send(event);
        }
    }
}
