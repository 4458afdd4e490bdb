//! HTTP client for the external decision service.

use crate::error::{BrainError, BrainResult};
use crate::protocol::{Decision, DecisionResponse, WorldSnapshot};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of per-cycle decisions.
///
/// Abstracted behind a trait so the coordination loop can be driven by a
/// scripted service in tests.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Submit a snapshot and wait for the service's decisions.
    ///
    /// Returns [`BrainError::Terminated`] when the service signals the end
    /// of the run (non-success status, or a missing/`null` decisions array).
    async fn decide(&self, snapshot: &WorldSnapshot) -> BrainResult<Vec<Decision>>;
}

/// [`DecisionService`] backed by an HTTP endpoint.
///
/// Posts snapshots to `<base>/get_decisions` with a per-request timeout.
pub struct HttpDecisionService {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpDecisionService {
    pub fn new(base_url: &str, timeout: Duration) -> BrainResult<Self> {
        let base = Url::parse(base_url)?;
        let endpoint = base.join("get_decisions")?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrainError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    async fn decide(&self, snapshot: &WorldSnapshot) -> BrainResult<Vec<Decision>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(snapshot)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BrainError::Timeout(self.timeout)
                } else {
                    BrainError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "decision service returned non-success status");
            return Err(BrainError::Terminated);
        }

        let body: DecisionResponse = response
            .json()
            .await
            .map_err(|e| BrainError::Protocol(e.to_string()))?;

        body.decisions.ok_or(BrainError::Terminated)
    }
}
