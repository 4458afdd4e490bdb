//! Seam to the external navigation collaborator.
//!
//! Pathfinding, obstacle detection, and locomotion live outside the core.
//! The state machine only issues "move to point P" requests and later
//! observes exactly one [`MoveOutcome`] per request through the returned
//! handle. It never advances a moving state until an outcome arrives.

use crate::types::{AgentId, Vec3};
use tokio::sync::oneshot;

/// Terminal outcome of a single move request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// The agent stopped within its stopping distance of the destination.
    Arrived,
    /// A high obstacle was detected ahead; `height` is the obstacle height
    /// above the agent's base.
    Blocked { height: f32 },
    /// No path to the destination exists.
    InvalidPath,
}

/// Receiving end of an in-flight move request.
///
/// The navigator resolves the handle once, when the move settles. Dropping
/// the handle cancels the agent's interest in the move; the navigator side
/// observing a closed channel may abandon the motion.
pub type MoveHandle = oneshot::Receiver<MoveOutcome>;

/// Sending end paired with a [`MoveHandle`], held by navigator
/// implementations.
pub type MoveResolver = oneshot::Sender<MoveOutcome>;

/// Create a connected resolver/handle pair for one move request.
pub fn move_channel() -> (MoveResolver, MoveHandle) {
    oneshot::channel()
}

/// External navigation collaborator.
///
/// Implementations own agent positions and locomotion. `request_move` must
/// not block: it starts the motion and returns a handle that resolves later
/// with the outcome.
pub trait Navigator: Send + Sync {
    /// Begin moving `agent` toward `destination`.
    fn request_move(&self, agent: AgentId, destination: Vec3) -> MoveHandle;

    /// Current position of `agent`, as last reported by locomotion.
    fn position(&self, agent: AgentId) -> Vec3;
}
