//! Periodic coordination loop.
//!
//! Each cycle snapshots the world, asks the [`DecisionService`] for one
//! decision per agent, and applies whatever comes back positionally. At most
//! one request is ever outstanding; a cycle that overruns the period delays
//! the next one rather than stacking requests.

use crate::client::DecisionService;
use crate::error::BrainError;
use crate::protocol::{build_snapshot, decode_directive};
use cubefleet_core::{Directive, World};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct CoordinationLoop<S: DecisionService> {
    service: S,
    period: Duration,
    halted: bool,
}

impl<S: DecisionService> CoordinationLoop<S> {
    pub fn new(service: S, period: Duration) -> Self {
        Self {
            service,
            period,
            halted: false,
        }
    }

    /// True once the service has terminated the run or failed to respond.
    /// A halted loop never issues another request.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Run one coordination cycle. No-op once halted.
    pub async fn step(&mut self, world: &Mutex<World>) {
        if self.halted {
            return;
        }

        let snapshot = {
            let world = world.lock().await;
            build_snapshot(&world)
        };

        let decisions = match self.service.decide(&snapshot).await {
            Ok(decisions) => decisions,
            Err(BrainError::Terminated) => {
                info!("decision service ended the run, halting coordination");
                self.halted = true;
                return;
            }
            Err(err) => {
                warn!(error = %err, "decision request failed, halting coordination");
                self.halted = true;
                return;
            }
        };

        let mut world = world.lock().await;
        if decisions.len() < snapshot.agent_count() {
            warn!(
                got = decisions.len(),
                want = snapshot.agent_count(),
                "short decision response, trailing agents keep their activity"
            );
        }
        if decisions.len() > snapshot.agent_count() {
            warn!(
                got = decisions.len(),
                want = snapshot.agent_count(),
                "decision response longer than the agent roster, ignoring extras"
            );
        }

        for (index, decision) in decisions.iter().take(snapshot.agent_count()).enumerate() {
            let directive = match decode_directive(&world, decision) {
                Ok(directive) => directive,
                Err(err) => {
                    warn!(index, error = %err, "undecodable decision, agent falls back to exploring");
                    Directive::Explore
                }
            };
            debug!(index, ?directive, "applying directive");
            world.apply_directive(index, directive);
        }
    }

    /// Drive cycles every `period` until halt or shutdown.
    ///
    /// Shutdown is honored between cycles and also aborts a request that is
    /// still in flight.
    pub async fn run(mut self, world: Arc<Mutex<World>>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    debug!("coordination loop shutting down");
                    return;
                }
            }

            tokio::select! {
                () = self.step(&world) => {}
                _ = shutdown.changed() => {
                    debug!("coordination loop shutting down mid-cycle");
                    return;
                }
            }

            if self.halted {
                info!("coordination loop halted");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrainResult;
    use crate::protocol::{CubeInfo, Decision, DecisionKind, WorldSnapshot};
    use async_trait::async_trait;
    use cubefleet_core::testing::ScriptedNavigator;
    use cubefleet_core::{AgentState, FleetConfig, Vec3};
    use std::sync::Mutex as StdMutex;

    /// Replays a script of responses, one per call.
    struct ScriptedService {
        script: StdMutex<Vec<BrainResult<Vec<Decision>>>>,
        calls: StdMutex<u32>,
    }

    impl ScriptedService {
        fn new(script: Vec<BrainResult<Vec<Decision>>>) -> Self {
            Self {
                script: StdMutex::new(script),
                calls: StdMutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DecisionService for ScriptedService {
        async fn decide(&self, _snapshot: &WorldSnapshot) -> BrainResult<Vec<Decision>> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(BrainError::Terminated);
            }
            script.remove(0)
        }
    }

    fn explore() -> Decision {
        Decision {
            decision: DecisionKind::Explore,
            target_cube: None,
        }
    }

    fn get_cube(id: u32) -> Decision {
        Decision {
            decision: DecisionKind::GetCube,
            target_cube: Some(CubeInfo {
                id,
                position: Vec3::ZERO,
                is_carried: false,
            }),
        }
    }

    fn world_with(agents: u32, cubes: u32) -> Mutex<World> {
        let config = FleetConfig::default();
        let mut world = World::with_seed(
            Arc::new(ScriptedNavigator::new()),
            config.tuning(),
            Vec3::new(30.0, 0.0, 0.0),
            Some(7),
        );
        for _ in 0..agents {
            world.spawn_agent();
        }
        for i in 0..cubes {
            world.spawn_resource(Vec3::new(-15.0, 0.0, i as f32));
        }
        Mutex::new(world)
    }

    #[tokio::test]
    async fn applies_decisions_positionally() {
        let world = world_with(2, 2);
        let service = ScriptedService::new(vec![Ok(vec![get_cube(1), explore()])]);
        let mut coordinator = CoordinationLoop::new(service, Duration::from_secs(1));

        coordinator.step(&world).await;

        let world = world.lock().await;
        assert_eq!(world.agents()[0].state(), AgentState::MovingToResource);
        assert_eq!(world.agents()[1].state(), AgentState::Exploring);
    }

    #[tokio::test]
    async fn short_response_leaves_trailing_agents_untouched() {
        let world = world_with(3, 1);
        let service = ScriptedService::new(vec![Ok(vec![explore()])]);
        let mut coordinator = CoordinationLoop::new(service, Duration::from_secs(1));

        coordinator.step(&world).await;

        let world = world.lock().await;
        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert_eq!(world.agents()[1].state(), AgentState::Idle);
        assert_eq!(world.agents()[2].state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn undecodable_decision_degrades_that_agent_to_exploring() {
        let world = world_with(2, 1);
        let bad_get = Decision {
            decision: DecisionKind::GetCube,
            target_cube: None,
        };
        let service = ScriptedService::new(vec![Ok(vec![bad_get, get_cube(0)])]);
        let mut coordinator = CoordinationLoop::new(service, Duration::from_secs(1));

        coordinator.step(&world).await;
        assert!(!coordinator.is_halted());

        let world = world.lock().await;
        assert_eq!(world.agents()[0].state(), AgentState::Exploring);
        assert_eq!(world.agents()[1].state(), AgentState::MovingToResource);
    }

    #[tokio::test]
    async fn termination_halts_and_later_steps_are_noops() {
        let world = world_with(1, 0);
        let service = ScriptedService::new(vec![Err(BrainError::Terminated)]);
        let mut coordinator = CoordinationLoop::new(service, Duration::from_secs(1));

        coordinator.step(&world).await;
        assert!(coordinator.is_halted());
        assert_eq!(coordinator.service.calls(), 1);

        coordinator.step(&world).await;
        assert_eq!(coordinator.service.calls(), 1, "halted loop must not call out");

        let world = world.lock().await;
        assert_eq!(world.agents()[0].state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn transport_failure_halts_the_loop() {
        let world = world_with(1, 0);
        let service = ScriptedService::new(vec![Err(BrainError::Transport(
            "connection refused".to_string(),
        ))]);
        let mut coordinator = CoordinationLoop::new(service, Duration::from_secs(1));

        coordinator.step(&world).await;
        assert!(coordinator.is_halted());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let world = Arc::new(world_with(1, 0));
        let service = ScriptedService::new((0..100).map(|_| Ok(vec![explore()])).collect());
        let coordinator = CoordinationLoop::new(service, Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(coordinator.run(world, rx));
        tokio::time::sleep(Duration::from_millis(35)).await;
        tx.send(true).expect("receiver alive");

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run exits promptly")
            .expect("task joins");
    }

    #[tokio::test]
    async fn run_exits_once_the_service_terminates() {
        let world = Arc::new(world_with(1, 0));
        let service = ScriptedService::new(vec![Ok(vec![explore()]), Err(BrainError::Terminated)]);
        let coordinator = CoordinationLoop::new(service, Duration::from_millis(5));
        let (_tx, rx) = watch::channel(false);

        tokio::time::timeout(Duration::from_secs(1), coordinator.run(world, rx))
            .await
            .expect("run exits after termination");
    }
}
