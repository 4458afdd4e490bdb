//! # Cubefleet
//!
//! Cubefleet is a fleet-coordination core for cube-hauling robot agents. A
//! shared world hosts the agents, the cubes, and a claim registry that keeps
//! two agents off the same cube; an external decision service assigns work;
//! per-agent streaming pipelines ship sensor frames over UDP.
//!
//! ## Core Components
//!
//! - **[World]**: Agents, cubes, and the [ClaimRegistry], advanced one
//!   cooperative tick at a time
//! - **[Navigator]**: Movement backend the agents request routes from
//! - **[CoordinationLoop]**: Periodic snapshot/decide/apply cycle against the
//!   decision service
//! - **[StreamingPipeline]**: Bounded drop-oldest frame queue draining onto a
//!   [FrameTransport]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use cubefleet::{FleetConfig, Vec3, World};
//! use cubefleet::testing::ScriptedNavigator;
//!
//! let config = FleetConfig::default();
//! let mut world = World::new(
//!     Arc::new(ScriptedNavigator::new()),
//!     config.tuning(),
//!     Vec3::new(30.0, 0.0, 0.0),
//! );
//! let agent = world.spawn_agent();
//! world.spawn_resource(Vec3::new(-15.0, 0.0, 2.0));
//!
//! world.tick();
//! assert_eq!(world.agent_count(), 1);
//! assert_eq!(world.available_resources_for(agent).len(), 1);
//! ```

pub use cubefleet_core::{
    AgentId, AgentMetrics, AgentState, ClaimRegistry, ConfigError, Directive, ExploreBounds,
    FleetConfig, MoveHandle, MoveOutcome, MoveResolver, Navigator, Resource, ResourceId,
    RobotAgent, SeekOutcome, Tuning, Vec3, World, move_channel, testing,
};

pub use cubefleet_brain::{
    BrainError, BrainResult, CoordinationLoop, Decision, DecisionKind, DecisionService,
    HttpDecisionService, WorldSnapshot, build_snapshot, decode_directive,
};

pub use cubefleet_stream::{
    Frame, FrameQueue, FrameTransport, PipelineConfig, SensorCapture, StreamError, StreamResult,
    StreamingPipeline, UdpFrameTransport,
};

pub use cubefleet_brain as brain;
pub use cubefleet_core as core;
pub use cubefleet_stream as stream;
