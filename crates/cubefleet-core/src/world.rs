//! World state and the cooperative simulation tick.
//!
//! One tick fully evaluates every agent's state transitions in index order
//! before the next tick begins, so within a tick there is no agent-vs-agent
//! race on agent state. Cross-agent contention is confined to the claim
//! registry.

use crate::agent::{Directive, RobotAgent, SeekOutcome, TickCtx, Tuning};
use crate::claims::ClaimRegistry;
use crate::nav::Navigator;
use crate::resource::Resource;
use crate::types::{AgentId, ResourceId, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Rectangular region agents sample exploration destinations from.
#[derive(Debug, Clone, Copy)]
pub struct ExploreBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for ExploreBounds {
    fn default() -> Self {
        // Default playfield: x in [-20, 20], z in [-10, 10].
        Self {
            min: Vec3::new(-20.0, 0.0, -10.0),
            max: Vec3::new(20.0, 0.0, 10.0),
        }
    }
}

/// Per-agent delivery accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMetrics {
    pub agent: AgentId,
    pub cubes_delivered: u32,
    pub distance_traveled: f32,
}

/// Shared world: the fleet, the cubes, and the claim registry.
pub struct World {
    agents: Vec<RobotAgent>,
    resources: Vec<Resource>,
    claims: Arc<ClaimRegistry>,
    navigator: Arc<dyn Navigator>,
    delivery_zone: Vec3,
    tuning: Tuning,
    explore_bounds: ExploreBounds,
    rng: StdRng,
    next_agent_id: u32,
    next_resource_id: u32,
}

impl World {
    pub fn new(navigator: Arc<dyn Navigator>, tuning: Tuning, delivery_zone: Vec3) -> Self {
        Self::with_seed(navigator, tuning, delivery_zone, None)
    }

    /// Build a world with a fixed RNG seed for reproducible runs.
    pub fn with_seed(
        navigator: Arc<dyn Navigator>,
        tuning: Tuning,
        delivery_zone: Vec3,
        seed: Option<u64>,
    ) -> Self {
        Self {
            agents: Vec::new(),
            resources: Vec::new(),
            claims: Arc::new(ClaimRegistry::new()),
            navigator,
            delivery_zone,
            tuning,
            explore_bounds: ExploreBounds::default(),
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            },
            next_agent_id: 0,
            next_resource_id: 0,
        }
    }

    pub fn set_explore_bounds(&mut self, bounds: ExploreBounds) {
        self.explore_bounds = bounds;
    }

    /// Create a new agent with the next monotonic id. Ids are never reused.
    pub fn spawn_agent(&mut self) -> AgentId {
        let id = AgentId::new(self.next_agent_id);
        self.next_agent_id += 1;
        self.agents.push(RobotAgent::new(id));
        debug!(agent = %id, "created agent");
        id
    }

    /// Place a new resource at `position`.
    pub fn spawn_resource(&mut self, position: Vec3) -> ResourceId {
        let id = ResourceId::new(self.next_resource_id);
        self.next_resource_id += 1;
        self.resources.push(Resource::new(id, position));
        id
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> &[RobotAgent] {
        &self.agents
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn claims(&self) -> &ClaimRegistry {
        &self.claims
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub fn delivery_zone(&self) -> Vec3 {
        self.delivery_zone
    }

    /// Current position of an agent, as owned by the navigation collaborator.
    pub fn agent_position(&self, agent: AgentId) -> Vec3 {
        self.navigator.position(agent)
    }

    /// Resources `agent` may target: in play and not claimed by another.
    pub fn available_resources_for(&self, agent: AgentId) -> Vec<&Resource> {
        self.resources
            .iter()
            .filter(|r| r.available() && !self.claims.claimed_by_other(r.id, agent))
            .collect()
    }

    /// Resources still in play (delivered cubes excluded).
    pub fn resources_in_play(&self) -> usize {
        self.resources.iter().filter(|r| !r.retired).count()
    }

    pub fn metrics(&self) -> Vec<AgentMetrics> {
        self.agents
            .iter()
            .map(|a| AgentMetrics {
                agent: a.id(),
                cubes_delivered: a.cubes_delivered(),
                distance_traveled: a.distance_traveled(),
            })
            .collect()
    }

    pub fn total_delivered(&self) -> u32 {
        self.agents.iter().map(|a| a.cubes_delivered()).sum()
    }

    // ------------------------------------------------------------------
    // Decision application
    // ------------------------------------------------------------------

    /// Apply one directive to the agent at `index`.
    ///
    /// Directives beyond the current fleet size are ignored with a warning;
    /// a failed seek claim degrades to exploration on the spot.
    pub fn apply_directive(&mut self, index: usize, directive: Directive) {
        if index >= self.agents.len() {
            warn!(index, "directive for unknown agent index, ignoring");
            return;
        }

        match directive {
            Directive::Explore => {
                let dest = self.sample_explore();
                self.agents[index].begin_explore(dest, &self.claims, self.navigator.as_ref());
            }
            Directive::Seek(resource_id) => self.apply_seek(index, resource_id),
            Directive::Deliver => {
                let dropoff = self.sample_dropoff();
                self.agents[index].begin_deliver(dropoff, self.navigator.as_ref());
            }
            Directive::Drop => self.agents[index].begin_drop(),
        }
    }

    fn apply_seek(&mut self, index: usize, resource_id: ResourceId) {
        let outcome = match self.resources.iter().find(|r| r.id == resource_id) {
            Some(resource) => {
                self.agents[index].begin_seek(resource, &self.claims, self.navigator.as_ref())
            }
            None => {
                warn!(agent = %self.agents[index].id(), cube = %resource_id,
                    "seek directive names unknown resource");
                if self.agents[index].has_cube() || self.agents[index].in_transient_state() {
                    SeekOutcome::Ignored
                } else {
                    SeekOutcome::ClaimLost
                }
            }
        };

        match outcome {
            SeekOutcome::Started => {}
            SeekOutcome::ClaimLost => {
                // Lost the race (or the cube left play). Expected; explore instead.
                let dest = self.sample_explore();
                self.agents[index].begin_explore(dest, &self.claims, self.navigator.as_ref());
            }
            SeekOutcome::Ignored => {
                debug!(agent = %self.agents[index].id(), cube = %resource_id,
                    "stale seek ignored, agent is busy with a cube");
            }
        }
    }

    // ------------------------------------------------------------------
    // Simulation tick
    // ------------------------------------------------------------------

    /// Evaluate one cooperative tick across all agents in index order.
    pub fn tick(&mut self) {
        let now = Instant::now();
        for index in 0..self.agents.len() {
            let explore_dest = sample_point(&mut self.rng, &self.explore_bounds);
            let mut ctx = TickCtx {
                resources: &mut self.resources,
                claims: &self.claims,
                navigator: self.navigator.as_ref(),
                tuning: &self.tuning,
                delivery_zone: self.delivery_zone,
                now,
                explore_dest,
            };
            self.agents[index].tick(&mut ctx);
        }
    }

    fn sample_explore(&mut self) -> Vec3 {
        sample_point(&mut self.rng, &self.explore_bounds)
    }

    /// A drop-off point scattered around the delivery zone center.
    fn sample_dropoff(&mut self) -> Vec3 {
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let radius = self.rng.random_range(0.0..self.tuning.delivery_radius);
        Vec3::new(
            self.delivery_zone.x + radius * angle.cos(),
            self.delivery_zone.y,
            self.delivery_zone.z + radius * angle.sin(),
        )
    }
}

fn sample_point(rng: &mut StdRng, bounds: &ExploreBounds) -> Vec3 {
    Vec3::new(
        rng.random_range(bounds.min.x..=bounds.max.x),
        0.0,
        rng.random_range(bounds.min.z..=bounds.max.z),
    )
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("agents", &self.agents.len())
            .field("resources", &self.resources.len())
            .field("claims", &self.claims.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::nav::MoveOutcome;
    use crate::testing::ScriptedNavigator;
    use std::time::Duration;

    fn test_tuning() -> Tuning {
        Tuning {
            pickup_radius: 1.8,
            delivery_radius: 2.0,
            // Zero delays keep ticks deterministic in tests.
            path_retry_backoff: Duration::ZERO,
            recovery_duration: Duration::ZERO,
        }
    }

    fn test_world(agents: usize) -> (World, Arc<ScriptedNavigator>) {
        let navigator = Arc::new(ScriptedNavigator::new());
        let mut world = World::with_seed(
            navigator.clone(),
            test_tuning(),
            Vec3::new(30.0, 0.0, 0.0),
            Some(7),
        );
        for _ in 0..agents {
            world.spawn_agent();
        }
        (world, navigator)
    }

    // seek -> claim -> arrive -> pickup -> carry -> deliver -> drop
    #[test]
    fn full_haul_cycle_walks_the_documented_states() {
        let (mut world, nav) = test_world(1);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        assert_eq!(world.agents()[0].state(), AgentState::MovingToResource);
        assert_eq!(world.claims().claimant(cube), Some(robot));

        nav.set_position(robot, Vec3::new(4.5, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::PickingUp);

        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Carrying);
        assert_eq!(world.agents()[0].carried_resource(), Some(cube));
        assert!(world.resources()[0].carried);
        assert_eq!(world.claims().claimant(cube), None);

        world.apply_directive(0, Directive::Deliver);
        assert_eq!(world.agents()[0].state(), AgentState::MovingToDelivery);

        nav.set_position(robot, Vec3::new(30.5, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Dropping);

        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Idle);
        assert_eq!(world.agents()[0].carried_resource(), None);
        assert!(world.resources()[0].retired);
        assert!(!world.resources()[0].carried);
        assert_eq!(world.total_delivered(), 1);
    }

    #[test]
    fn racing_seeks_admit_one_claimant_and_one_explorer() {
        let (mut world, _nav) = test_world(2);
        let cube = world.spawn_resource(Vec3::new(2.0, 0.0, 0.0));

        // Same cycle, index order: agent 0 first.
        world.apply_directive(0, Directive::Seek(cube));
        world.apply_directive(1, Directive::Seek(cube));

        assert_eq!(world.agents()[0].state(), AgentState::MovingToResource);
        assert_eq!(world.agents()[1].state(), AgentState::Exploring);
        assert_eq!(world.claims().claimant(cube), Some(world.agents()[0].id()));
        assert_eq!(world.agents()[1].target_resource(), None);
    }

    #[test]
    fn explore_directive_abandoning_a_seek_releases_the_claim() {
        let (mut world, nav) = test_world(2);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        assert_eq!(world.claims().claimant(cube), Some(robot));

        // Next cycle redirects the claimant before it ever arrives.
        world.apply_directive(0, Directive::Explore);
        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert_eq!(world.agents()[0].target_resource(), None);
        assert_eq!(world.claims().claimant(cube), None);

        // The cube is back in circulation for the rest of the fleet.
        world.apply_directive(1, Directive::Seek(cube));
        assert_eq!(world.claims().claimant(cube), Some(world.agents()[1].id()));

        // Finishing the explore leg leaves no residue either.
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Idle);
    }

    #[test]
    fn stale_seek_while_carrying_keeps_the_delivery_going() {
        let (mut world, nav) = test_world(1);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));
        let other = world.spawn_resource(Vec3::new(8.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        nav.set_position(robot, Vec3::new(4.5, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Carrying);

        // A seek that was decided before the pickup landed is stale now.
        world.apply_directive(0, Directive::Seek(other));
        assert_eq!(world.agents()[0].state(), AgentState::Carrying);
        assert_eq!(world.agents()[0].carried_resource(), Some(cube));
        assert_eq!(world.claims().claimant(other), None);

        world.apply_directive(0, Directive::Deliver);
        assert_eq!(world.agents()[0].state(), AgentState::MovingToDelivery);

        // Same staleness mid-route: the haul continues uninterrupted.
        world.apply_directive(0, Directive::Seek(other));
        assert_eq!(world.agents()[0].state(), AgentState::MovingToDelivery);
        assert_eq!(world.agents()[0].carried_resource(), Some(cube));
        assert_eq!(world.claims().claimant(other), None);

        nav.set_position(robot, Vec3::new(30.5, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();
        world.tick();
        assert_eq!(world.total_delivered(), 1);
    }

    #[test]
    fn arrival_out_of_pickup_range_releases_claim_and_explores() {
        let (mut world, nav) = test_world(1);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        nav.set_position(robot, Vec3::new(10.0, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();

        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert_eq!(world.claims().claimant(cube), None);
        assert_eq!(world.agents()[0].target_resource(), None);
    }

    #[test]
    fn resource_taken_by_another_agent_is_a_normal_miss() {
        let (mut world, nav) = test_world(1);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        // Cube leaves play while the move is in flight.
        world.resources[0].retired = true;

        nav.set_position(robot, Vec3::new(5.0, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();

        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert!(world.claims().is_empty());
    }

    #[test]
    fn blocked_move_recovers_and_resumes_with_target_preserved() {
        let (mut world, nav) = test_world(1);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        nav.resolve_for(robot, MoveOutcome::Blocked { height: 0.6 });
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::ObstacleRecovery);
        assert_eq!(world.agents()[0].target_resource(), Some(cube));

        // Recovery duration is zero in tests, so the next tick resumes.
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::MovingToResource);
        assert_eq!(world.agents()[0].target_resource(), Some(cube));
        let requests = nav.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].destination, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn invalid_path_retries_once_then_falls_back_to_exploring() {
        let (mut world, nav) = test_world(1);
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        for request in nav.take_requests() {
            request.resolve(MoveOutcome::InvalidPath);
        }
        world.tick(); // schedules the backoff
        world.tick(); // backoff elapsed (zero), reissues the same destination
        let retry = nav.take_requests();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].destination, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(world.agents()[0].state(), AgentState::MovingToResource);

        // Second failure gives up on the destination for good.
        for request in retry {
            request.resolve(MoveOutcome::InvalidPath);
        }
        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert_eq!(world.claims().claimant(cube), None);
    }

    #[test]
    fn drop_directive_mid_route_abandons_without_retiring() {
        let (mut world, nav) = test_world(1);
        let robot = world.agents()[0].id();
        let cube = world.spawn_resource(Vec3::new(5.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(cube));
        nav.set_position(robot, Vec3::new(5.0, 0.0, 0.0));
        nav.resolve_for(robot, MoveOutcome::Arrived);
        world.tick();
        world.tick();
        world.apply_directive(0, Directive::Deliver);
        assert_eq!(world.agents()[0].state(), AgentState::MovingToDelivery);

        // Abandon far from the delivery zone.
        nav.set_position(robot, Vec3::new(12.0, 0.0, 3.0));
        world.apply_directive(0, Directive::Drop);
        assert_eq!(world.agents()[0].state(), AgentState::Dropping);

        world.tick();
        assert_eq!(world.agents()[0].state(), AgentState::Idle);
        let dropped = &world.resources()[0];
        assert!(!dropped.retired);
        assert!(!dropped.carried);
        assert_eq!(dropped.position, Vec3::new(12.0, 0.0, 3.0));
        assert_eq!(world.total_delivered(), 0);
    }

    #[test]
    fn available_resources_exclude_claimed_and_retired() {
        let (mut world, _nav) = test_world(2);
        let a = world.spawn_resource(Vec3::new(1.0, 0.0, 0.0));
        let b = world.spawn_resource(Vec3::new(2.0, 0.0, 0.0));
        let c = world.spawn_resource(Vec3::new(3.0, 0.0, 0.0));

        world.apply_directive(0, Directive::Seek(a));
        world.resources[1].retired = true;

        let first = world.agents()[0].id();
        let second = world.agents()[1].id();

        let for_second: Vec<_> = world
            .available_resources_for(second)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(for_second, vec![c]);

        // The claim holder still sees its own target.
        let for_first: Vec<_> = world
            .available_resources_for(first)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(for_first, vec![a, c]);
        let _ = b;
    }

    #[test]
    fn seek_for_unknown_resource_degrades_to_exploring() {
        let (mut world, _nav) = test_world(1);
        world.apply_directive(0, Directive::Seek(ResourceId::new(99)));
        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert!(world.claims().is_empty());
    }
}
