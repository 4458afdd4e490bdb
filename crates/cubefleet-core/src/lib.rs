//! # Cubefleet Core
//!
//! Core fleet model: resource claims, the per-agent task state machine, and
//! the shared world the coordination and streaming layers plug into.
//!
//! The navigation collaborator (pathfinding, locomotion, obstacle
//! detection) is external; the core talks to it only through the
//! [`Navigator`] seam.

pub mod agent;
pub mod claims;
pub mod config;
pub mod nav;
pub mod resource;
pub mod testing;
pub mod types;
pub mod world;

pub use agent::{AgentState, Directive, RobotAgent, SeekOutcome, Tuning};
pub use claims::ClaimRegistry;
pub use config::{ConfigError, FleetConfig};
pub use nav::{MoveHandle, MoveOutcome, MoveResolver, Navigator, move_channel};
pub use resource::Resource;
pub use types::{AgentId, ResourceId, Vec3};
pub use world::{AgentMetrics, ExploreBounds, World};
