//! Wire protocol of the decision service.
//!
//! Requests carry a point-in-time [`WorldSnapshot`]; responses carry one
//! decision per agent, positionally matched to the snapshot's agent order.
//! The JSON shape follows the service contract exactly:
//!
//! ```json
//! {"agentStates": [{"id": "0", "state": {"position": {...},
//!   "has_cube": false, "available_cubes": [{"id": 3, "position": {...},
//!   "is_carried": false}]}}]}
//! ```
//!
//! Decision objects may carry fields beyond the contract
//! (`target_position`, `target`); unknown fields are ignored.

use crate::error::{BrainError, BrainResult};
use cubefleet_core::{Directive, ResourceId, Vec3, World};
use serde::{Deserialize, Serialize};

/// One cube as the decision service sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeInfo {
    pub id: u32,
    pub position: Vec3,
    pub is_carried: bool,
}

/// Per-agent state block inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateBody {
    pub position: Vec3,
    pub has_cube: bool,
    pub available_cubes: Vec<CubeInfo>,
}

/// Snapshot entry for one agent; `id` is stringly typed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateEntry {
    pub id: String,
    pub state: AgentStateBody,
}

/// Immutable point-in-time view of the world sent to the decision service.
///
/// Built fresh each cycle and never mutated after construction. Agent order
/// is the world's index order; decisions are applied back in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(rename = "agentStates")]
    pub agent_states: Vec<AgentStateEntry>,
}

impl WorldSnapshot {
    pub fn agent_count(&self) -> usize {
        self.agent_states.len()
    }
}

/// Decision vocabulary of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    GetCube,
    DeliverCube,
    PutCube,
    Explore,
}

/// One decision for one agent for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cube: Option<CubeInfo>,
}

/// Top-level response body. A missing or `null` `decisions` array is the
/// service's termination signal.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub decisions: Option<Vec<Decision>>,
}

/// Build a snapshot of `world` in agent-index order.
///
/// Each agent sees the cubes still in play that no other agent currently
/// claims.
pub fn build_snapshot(world: &World) -> WorldSnapshot {
    let agent_states = world
        .agents()
        .iter()
        .map(|agent| {
            let available_cubes = world
                .available_resources_for(agent.id())
                .into_iter()
                .map(|cube| CubeInfo {
                    id: cube.id.as_u32(),
                    position: cube.position,
                    is_carried: cube.carried,
                })
                .collect();
            AgentStateEntry {
                id: agent.id().as_u32().to_string(),
                state: AgentStateBody {
                    position: world.agent_position(agent.id()),
                    has_cube: agent.has_cube(),
                    available_cubes,
                },
            }
        })
        .collect();

    WorldSnapshot { agent_states }
}

/// Translate one wire decision into a core directive.
///
/// A `get_cube` without a target, or naming a cube that no longer exists,
/// is a protocol failure; callers degrade the affected agent to exploration
/// and continue the cycle.
pub fn decode_directive(world: &World, decision: &Decision) -> BrainResult<Directive> {
    match decision.decision {
        DecisionKind::Explore => Ok(Directive::Explore),
        DecisionKind::DeliverCube => Ok(Directive::Deliver),
        DecisionKind::PutCube => Ok(Directive::Drop),
        DecisionKind::GetCube => {
            let target = decision
                .target_cube
                .as_ref()
                .ok_or_else(|| BrainError::Protocol("get_cube without target_cube".to_string()))?;
            let id = ResourceId::new(target.id);
            if !world.resources().iter().any(|r| r.id == id) {
                return Err(BrainError::Protocol(format!(
                    "get_cube targets unknown cube {}",
                    target.id
                )));
            }
            Ok(Directive::Seek(id))
        }
    }
}
