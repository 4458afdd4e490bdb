//! Wires the world, the coordination loop, and the frame pipelines together
//! for one fleet run.

use crate::sim::{ObstacleBand, SimNavigator, SyntheticCapture};
use cubefleet::stream::{FrameTransport, PipelineConfig, StreamingPipeline, UdpFrameTransport};
use cubefleet::{
    AgentId, CoordinationLoop, FleetConfig, HttpDecisionService, Navigator, Vec3, World,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

/// World tick cadence. Fast enough that move outcomes are observed promptly
/// between decision cycles.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

const DELIVERY_ZONE: Vec3 = Vec3::new(30.0, 0.0, 0.0);

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Brain(#[from] cubefleet::BrainError),

    #[error(transparent)]
    Stream(#[from] cubefleet::StreamError),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub agents: u32,
    pub cubes: u32,
    pub seed: Option<u64>,
    pub streaming: bool,
}

/// Run the fleet until the decision service terminates the run or Ctrl-C.
pub async fn run_fleet(config: FleetConfig, options: RunOptions) -> Result<(), RunError> {
    let navigator = Arc::new(
        SimNavigator::new(
            3.0,
            (Vec3::new(-20.0, 0.0, -10.0), Vec3::new(20.0, 0.0, 10.0)),
        )
        .with_obstacle(ObstacleBand {
            x_min: -2.0,
            x_max: 0.0,
            height: 1.5,
        }),
    );

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut world = World::with_seed(
        Arc::clone(&navigator) as Arc<dyn Navigator>,
        config.tuning(),
        DELIVERY_ZONE,
        options.seed,
    );

    let mut agent_ids = Vec::with_capacity(options.agents as usize);
    for _ in 0..options.agents {
        let id = world.spawn_agent();
        navigator.place(
            id,
            Vec3::new(
                rng.random_range(-5.0..5.0),
                0.0,
                rng.random_range(-5.0..5.0),
            ),
        );
        agent_ids.push(id);
    }
    for _ in 0..options.cubes {
        world.spawn_resource(Vec3::new(
            rng.random_range(-20.0..-10.0),
            0.0,
            rng.random_range(-10.0..10.0),
        ));
    }
    info!(
        agents = options.agents,
        cubes = options.cubes,
        brain_url = %config.brain_url,
        "fleet ready"
    );

    let world = Arc::new(Mutex::new(world));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // World tick task.
    let tick_task = {
        let world = Arc::clone(&world);
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => world.lock().await.tick(),
                    _ = shutdown.changed() => return,
                }
            }
        })
    };

    // Per-agent camera feeds plus the untagged observer feed.
    let mut pipelines = Vec::new();
    if options.streaming {
        for &id in &agent_ids {
            let transport = UdpFrameTransport::per_agent(config.stream_base_port).await?;
            pipelines.push(StreamingPipeline::spawn(
                id,
                Arc::new(SyntheticCapture::new(id)),
                Arc::new(transport) as Arc<dyn FrameTransport>,
                PipelineConfig {
                    capture_interval: config.capture_interval,
                    queue_depth: config.frame_queue_depth,
                    tagged: true,
                },
            ));
        }

        let observer_transport = UdpFrameTransport::fixed(config.observer_port).await?;
        let observer_id = AgentId::new(u32::MAX);
        pipelines.push(StreamingPipeline::spawn(
            observer_id,
            Arc::new(SyntheticCapture::new(observer_id)),
            Arc::new(observer_transport) as Arc<dyn FrameTransport>,
            PipelineConfig {
                capture_interval: config.capture_interval,
                queue_depth: config.frame_queue_depth,
                tagged: false,
            },
        ));
    }

    // Coordination loop against the decision service.
    let service = HttpDecisionService::new(&config.brain_url, config.request_timeout)?;
    let coordinator = CoordinationLoop::new(service, config.decision_period);
    let coordination_task = {
        let world = Arc::clone(&world);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(coordinator.run(world, shutdown))
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
        _ = coordination_task => {
            info!("coordination finished, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tick_task.await;

    for pipeline in pipelines {
        let agent = pipeline.agent();
        let dropped = pipeline.frames_dropped();
        if dropped > 0 {
            warn!(agent = %agent, dropped, "pipeline shed frames under load");
        }
        if let Err(e) = pipeline.shutdown(config.shutdown_timeout).await {
            warn!(agent = %agent, error = %e, "pipeline shutdown incomplete");
        }
    }

    let world = world.lock().await;
    for metrics in world.metrics() {
        info!(
            agent = %metrics.agent,
            delivered = metrics.cubes_delivered,
            distance = format!("{:.1}", metrics.distance_traveled),
            "agent totals"
        );
    }
    info!(
        delivered = world.total_delivered(),
        remaining = world.resources_in_play(),
        "run complete"
    );

    Ok(())
}
