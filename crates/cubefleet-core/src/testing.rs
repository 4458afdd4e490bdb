//! Test doubles for the navigation seam.
//!
//! Used by in-crate unit tests and the workspace integration suite.

use crate::nav::{MoveHandle, MoveOutcome, MoveResolver, Navigator, move_channel};
use crate::types::{AgentId, Vec3};
use std::collections::HashMap;
use std::sync::Mutex;

/// A move request captured by [`ScriptedNavigator`], resolvable by the test.
pub struct PendingMove {
    pub agent: AgentId,
    pub destination: Vec3,
    resolver: MoveResolver,
}

impl PendingMove {
    /// Settle the move with the given outcome.
    pub fn resolve(self, outcome: MoveOutcome) {
        let _ = self.resolver.send(outcome);
    }
}

/// Navigator whose positions and move outcomes are driven by the test.
///
/// `request_move` records the request and leaves it pending until the test
/// resolves it; positions are whatever the test last set.
#[derive(Default)]
pub struct ScriptedNavigator {
    positions: Mutex<HashMap<AgentId, Vec3>>,
    pending: Mutex<Vec<PendingMove>>,
}

impl ScriptedNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Teleport `agent` to `position` for subsequent position queries.
    pub fn set_position(&self, agent: AgentId, position: Vec3) {
        self.lock_positions().insert(agent, position);
    }

    /// Drain all captured move requests.
    pub fn take_requests(&self) -> Vec<PendingMove> {
        std::mem::take(&mut *self.lock_pending())
    }

    /// Number of captured, unresolved move requests.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Resolve every pending request for `agent` with `outcome`.
    pub fn resolve_for(&self, agent: AgentId, outcome: MoveOutcome) {
        let mut pending = self.lock_pending();
        let (matching, rest): (Vec<_>, Vec<_>) =
            pending.drain(..).partition(|m| m.agent == agent);
        *pending = rest;
        drop(pending);
        for request in matching {
            request.resolve(outcome);
        }
    }

    fn lock_positions(&self) -> std::sync::MutexGuard<'_, HashMap<AgentId, Vec3>> {
        self.positions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<PendingMove>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Navigator for ScriptedNavigator {
    fn request_move(&self, agent: AgentId, destination: Vec3) -> MoveHandle {
        let (resolver, handle) = move_channel();
        self.lock_pending().push(PendingMove {
            agent,
            destination,
            resolver,
        });
        handle
    }

    fn position(&self, agent: AgentId) -> Vec3 {
        self.lock_positions()
            .get(&agent)
            .copied()
            .unwrap_or(Vec3::ZERO)
    }
}
