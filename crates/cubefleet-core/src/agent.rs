//! Per-agent task and movement state machine.
//!
//! Decisions from the brain are advisory: entering a seek is gated by a
//! successful claim, and every movement failure degrades to exploration
//! rather than surfacing an error. Losing a race for a cube is a normal
//! outcome, not a fault.

use crate::claims::ClaimRegistry;
use crate::nav::{MoveHandle, MoveOutcome, Navigator};
use crate::resource::Resource;
use crate::types::{AgentId, ResourceId, Vec3};
use std::time::{Duration, Instant};
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

/// High-level directive for one agent for one coordination cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directive {
    Explore,
    Seek(ResourceId),
    Deliver,
    Drop,
}

/// Result of applying a seek directive to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Claim granted; the agent is en route to the cube.
    Started,
    /// The cube is gone or claimed by another agent. The caller degrades
    /// the agent to exploration.
    ClaimLost,
    /// The agent is carrying a cube or mid pickup/drop; the stale directive
    /// is ignored and the current activity continues.
    Ignored,
}

/// Task state of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Exploring,
    MovingToResource,
    PickingUp,
    Carrying,
    MovingToDelivery,
    Dropping,
    ObstacleRecovery,
}

/// Bounded recovery maneuver in progress; resumes the interrupted state.
#[derive(Debug, Clone, Copy)]
struct Recovery {
    until: Instant,
    resume: AgentState,
}

/// Fixed backoff before retrying an unroutable destination once.
#[derive(Debug, Clone, Copy)]
struct PathRetry {
    until: Instant,
}

/// One robot of the fleet.
///
/// Position is owned by the navigation collaborator; the agent tracks only
/// task state, its claim target, and its in-flight move handle.
#[derive(Debug)]
pub struct RobotAgent {
    id: AgentId,
    state: AgentState,
    carried_resource: Option<ResourceId>,
    target_resource: Option<ResourceId>,
    destination: Option<Vec3>,
    pending_move: Option<MoveHandle>,
    recovery: Option<Recovery>,
    path_retry: Option<PathRetry>,
    path_retried: bool,
    cubes_delivered: u32,
    distance_traveled: f32,
    last_position: Option<Vec3>,
}

/// Per-tick context handed to the agent by the world.
pub(crate) struct TickCtx<'a> {
    pub resources: &'a mut [Resource],
    pub claims: &'a ClaimRegistry,
    pub navigator: &'a dyn Navigator,
    pub tuning: &'a Tuning,
    pub delivery_zone: Vec3,
    pub now: Instant,
    /// Fresh exploration destination, sampled by the world.
    pub explore_dest: Vec3,
}

/// Movement-policy knobs shared by all agents.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub pickup_radius: f32,
    pub delivery_radius: f32,
    pub path_retry_backoff: Duration,
    pub recovery_duration: Duration,
}

impl RobotAgent {
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            state: AgentState::Idle,
            carried_resource: None,
            target_resource: None,
            destination: None,
            pending_move: None,
            recovery: None,
            path_retry: None,
            path_retried: false,
            cubes_delivered: 0,
            distance_traveled: 0.0,
            last_position: None,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn carried_resource(&self) -> Option<ResourceId> {
        self.carried_resource
    }

    pub fn target_resource(&self) -> Option<ResourceId> {
        self.target_resource
    }

    pub fn has_cube(&self) -> bool {
        self.carried_resource.is_some()
    }

    pub fn cubes_delivered(&self) -> u32 {
        self.cubes_delivered
    }

    pub fn distance_traveled(&self) -> f32 {
        self.distance_traveled
    }

    // ------------------------------------------------------------------
    // Directive entry points (called by the world in decision order)
    // ------------------------------------------------------------------

    /// Start pursuing `resource`, gated by a claim attempt.
    ///
    /// A stale seek reaching an agent that already carries a cube (or is mid
    /// pickup/drop) is ignored so the haul in progress survives. A lost
    /// claim degrades to exploration at the caller. A previously held claim
    /// on a different resource is released first so an agent never holds
    /// two.
    pub fn begin_seek(
        &mut self,
        resource: &Resource,
        claims: &ClaimRegistry,
        navigator: &dyn Navigator,
    ) -> SeekOutcome {
        if self.has_cube() || self.in_transient_state() {
            return SeekOutcome::Ignored;
        }

        if let Some(previous) = self.target_resource
            && previous != resource.id
        {
            claims.release(previous, self.id);
            self.target_resource = None;
        }

        if !resource.available() || !claims.try_claim(resource.id, self.id) {
            return SeekOutcome::ClaimLost;
        }

        debug!(agent = %self.id, cube = %resource.id, "moving to pick up cube");
        self.target_resource = Some(resource.id);
        self.issue_move(navigator, resource.position);
        self.state = AgentState::MovingToResource;
        SeekOutcome::Started
    }

    /// Head to the delivery zone with the carried cube.
    pub fn begin_deliver(&mut self, dropoff: Vec3, navigator: &dyn Navigator) {
        if !self.has_cube() || self.in_transient_state() {
            return;
        }
        debug!(agent = %self.id, "moving to delivery zone with cube");
        self.issue_move(navigator, dropoff);
        self.state = AgentState::MovingToDelivery;
    }

    /// Force an immediate drop, regardless of position (mid-route abandon).
    pub fn begin_drop(&mut self) {
        if !self.has_cube() || self.state == AgentState::Dropping {
            return;
        }
        self.pending_move = None;
        self.path_retry = None;
        self.recovery = None;
        self.state = AgentState::Dropping;
    }

    /// Wander to a new destination.
    ///
    /// Abandoning a seek in progress releases its claim so the cube goes
    /// back into circulation for the rest of the fleet.
    pub fn begin_explore(
        &mut self,
        destination: Vec3,
        claims: &ClaimRegistry,
        navigator: &dyn Navigator,
    ) {
        if self.in_transient_state() {
            return;
        }
        self.abandon_target(claims);
        self.issue_move(navigator, destination);
        self.state = AgentState::Exploring;
    }

    // ------------------------------------------------------------------
    // Tick evaluation
    // ------------------------------------------------------------------

    /// Evaluate one simulation tick for this agent.
    pub(crate) fn tick(&mut self, ctx: &mut TickCtx<'_>) {
        self.track_distance(ctx.navigator);

        match self.state {
            AgentState::Idle | AgentState::Carrying => {}
            AgentState::ObstacleRecovery => self.tick_recovery(ctx),
            AgentState::PickingUp => self.tick_pickup(ctx),
            AgentState::Dropping => self.tick_drop(ctx),
            AgentState::Exploring
            | AgentState::MovingToResource
            | AgentState::MovingToDelivery => self.tick_moving(ctx),
        }
    }

    fn tick_moving(&mut self, ctx: &mut TickCtx<'_>) {
        // A scheduled path retry takes precedence over polling: there is no
        // in-flight move while the backoff runs.
        if let Some(retry) = self.path_retry {
            if ctx.now >= retry.until {
                self.path_retry = None;
                if let Some(destination) = self.destination {
                    debug!(agent = %self.id, %destination, "retrying unroutable destination");
                    self.pending_move = Some(ctx.navigator.request_move(self.id, destination));
                }
            }
            return;
        }

        let Some(outcome) = self.poll_move() else {
            return;
        };

        match outcome {
            MoveOutcome::Arrived => match self.state {
                AgentState::MovingToResource => self.arrive_at_resource(ctx),
                AgentState::MovingToDelivery => {
                    self.state = AgentState::Dropping;
                }
                _ => {
                    // Explore leg finished; wait for the next decision.
                    self.state = AgentState::Idle;
                    self.destination = None;
                }
            },
            MoveOutcome::Blocked { height } => {
                debug!(agent = %self.id, height, "high obstacle ahead, starting recovery");
                self.recovery = Some(Recovery {
                    until: ctx.now + ctx.tuning.recovery_duration,
                    resume: self.state,
                });
                self.state = AgentState::ObstacleRecovery;
            }
            MoveOutcome::InvalidPath => {
                if !self.path_retried {
                    self.path_retried = true;
                    self.path_retry = Some(PathRetry {
                        until: ctx.now + ctx.tuning.path_retry_backoff,
                    });
                } else {
                    warn!(agent = %self.id, "no path after retry, falling back to exploring");
                    self.abandon_target(ctx.claims);
                    self.fall_back_to_explore(ctx.explore_dest, ctx.navigator);
                }
            }
        }
    }

    fn arrive_at_resource(&mut self, ctx: &mut TickCtx<'_>) {
        let position = ctx.navigator.position(self.id);
        let reachable = self.target_resource.and_then(|id| {
            ctx.resources
                .iter()
                .find(|r| r.id == id && r.available())
                .filter(|r| position.distance(&r.position) <= ctx.tuning.pickup_radius)
                .map(|r| r.id)
        });

        match reachable {
            Some(_) => {
                self.state = AgentState::PickingUp;
            }
            None => {
                // Race lost or the cube moved out of reach. Normal outcome.
                debug!(agent = %self.id, "cube gone or out of pickup range, exploring");
                self.abandon_target(ctx.claims);
                self.fall_back_to_explore(ctx.explore_dest, ctx.navigator);
            }
        }
    }

    fn tick_pickup(&mut self, ctx: &mut TickCtx<'_>) {
        let Some(id) = self.target_resource else {
            self.state = AgentState::Idle;
            return;
        };

        match ctx.resources.iter_mut().find(|r| r.id == id && r.available()) {
            Some(cube) => {
                cube.carried = true;
                self.carried_resource = Some(id);
                // Possession is exclusive by attachment now; the claim has
                // done its job.
                ctx.claims.release(id, self.id);
                self.target_resource = None;
                self.destination = None;
                self.state = AgentState::Carrying;
                info!(agent = %self.id, cube = %id, "picked up cube");
            }
            None => {
                self.abandon_target(ctx.claims);
                self.fall_back_to_explore(ctx.explore_dest, ctx.navigator);
            }
        }
    }

    fn tick_drop(&mut self, ctx: &mut TickCtx<'_>) {
        let Some(id) = self.carried_resource.take() else {
            self.state = AgentState::Idle;
            return;
        };

        let position = ctx.navigator.position(self.id);
        if let Some(cube) = ctx.resources.iter_mut().find(|r| r.id == id) {
            cube.carried = false;
            cube.position = Vec3::new(position.x, 0.0, position.z);
            if position.distance(&ctx.delivery_zone) <= ctx.tuning.delivery_radius {
                cube.retired = true;
                self.cubes_delivered += 1;
                info!(agent = %self.id, cube = %id, delivered = self.cubes_delivered,
                    "delivered cube");
            } else {
                // Mid-route abandon: the cube returns to play where it fell.
                debug!(agent = %self.id, cube = %id, "dropped cube outside delivery zone");
            }
        }

        self.destination = None;
        self.state = AgentState::Idle;
    }

    fn tick_recovery(&mut self, ctx: &mut TickCtx<'_>) {
        let Some(recovery) = self.recovery else {
            self.state = AgentState::Idle;
            return;
        };

        if ctx.now < recovery.until {
            return;
        }

        self.recovery = None;
        self.state = recovery.resume;
        if let Some(destination) = self.destination {
            self.pending_move = Some(ctx.navigator.request_move(self.id, destination));
        } else {
            self.state = AgentState::Idle;
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn fall_back_to_explore(&mut self, destination: Vec3, navigator: &dyn Navigator) {
        self.issue_move(navigator, destination);
        self.state = AgentState::Exploring;
    }

    fn issue_move(&mut self, navigator: &dyn Navigator, destination: Vec3) {
        self.destination = Some(destination);
        self.path_retry = None;
        self.path_retried = false;
        self.recovery = None;
        self.pending_move = Some(navigator.request_move(self.id, destination));
    }

    fn poll_move(&mut self) -> Option<MoveOutcome> {
        let handle = self.pending_move.as_mut()?;
        match handle.try_recv() {
            Ok(outcome) => {
                self.pending_move = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                // Navigator abandoned the move; treat it like a dead path.
                self.pending_move = None;
                Some(MoveOutcome::InvalidPath)
            }
        }
    }

    fn abandon_target(&mut self, claims: &ClaimRegistry) {
        if let Some(id) = self.target_resource.take() {
            claims.release(id, self.id);
        }
        self.destination = None;
        self.pending_move = None;
    }

    /// States that must complete before a new directive can take over.
    pub(crate) fn in_transient_state(&self) -> bool {
        matches!(self.state, AgentState::PickingUp | AgentState::Dropping)
    }

    fn track_distance(&mut self, navigator: &dyn Navigator) {
        let position = navigator.position(self.id);
        if let Some(last) = self.last_position {
            self.distance_traveled += last.distance(&position);
        }
        self.last_position = Some(position);
    }
}
