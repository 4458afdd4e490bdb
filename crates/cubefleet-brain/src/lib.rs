//! Coordination layer between the fleet simulation and the external
//! decision service.
//!
//! The [`CoordinationLoop`] snapshots the world on a fixed period, posts it
//! to the service over HTTP, and applies the returned decisions to the
//! agents. The service owns all task assignment; this crate only carries
//! state out and directives back.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod protocol;

pub use client::{DecisionService, HttpDecisionService};
pub use coordinator::CoordinationLoop;
pub use error::{BrainError, BrainResult};
pub use protocol::{
    AgentStateBody, AgentStateEntry, CubeInfo, Decision, DecisionKind, DecisionResponse,
    WorldSnapshot, build_snapshot, decode_directive,
};
