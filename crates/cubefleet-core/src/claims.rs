//! Process-wide resource claim registry.
//!
//! The registry arbitrates contention between agents: a resource has at most
//! one claiming agent at any instant, and claim/release are atomic with
//! respect to each other. This is the one piece of shared, concurrently
//! mutated state in the core, so everything goes through a single
//! mutual-exclusion domain.

use crate::types::{AgentId, ResourceId};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Mapping from resource id to the agent currently claiming it.
///
/// Operations never block beyond the internal lock: contention is resolved
/// immediately by test-and-set, not queued. When two agents race
/// [`ClaimRegistry::try_claim`] for the same resource, exactly one observes
/// success.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claims: Mutex<HashMap<ResourceId, AgentId>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to claim `resource` for `agent`.
    ///
    /// Succeeds if the resource is unclaimed, or if `agent` already holds
    /// the claim (idempotent re-claim). Fails with no state change if
    /// another agent holds it.
    pub fn try_claim(&self, resource: ResourceId, agent: AgentId) -> bool {
        let mut claims = self.lock();
        match claims.get(&resource) {
            Some(&holder) => holder == agent,
            None => {
                claims.insert(resource, agent);
                debug!(%agent, %resource, "claimed resource");
                true
            }
        }
    }

    /// Release the claim on `resource`, but only if `agent` holds it.
    ///
    /// A release by a non-holder is a no-op so that an agent acting on
    /// stale state cannot revoke another agent's claim.
    pub fn release(&self, resource: ResourceId, agent: AgentId) {
        let mut claims = self.lock();
        if claims.get(&resource) == Some(&agent) {
            claims.remove(&resource);
            debug!(%agent, %resource, "released resource");
        }
    }

    /// The agent currently claiming `resource`, if any.
    pub fn claimant(&self, resource: ResourceId) -> Option<AgentId> {
        self.lock().get(&resource).copied()
    }

    /// Whether `resource` is claimed by an agent other than `agent`.
    pub fn claimed_by_other(&self, resource: ResourceId, agent: AgentId) -> bool {
        matches!(self.lock().get(&resource), Some(&holder) if holder != agent)
    }

    /// Number of live claims.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceId, AgentId>> {
        // A poisoned lock only means a panic elsewhere; the map itself is
        // still consistent after any single operation.
        self.claims.lock().unwrap_or_else(|e| e.into_inner())
    }
}
