//! Error types for decision-service operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for decision-service operations.
pub type BrainResult<T> = Result<T, BrainError>;

/// Errors that can occur while talking to the decision service.
#[derive(Error, Debug)]
pub enum BrainError {
    /// The configured service URL is not valid.
    #[error("Invalid decision service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request never completed (connection refused, reset, DNS, ...).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The request did not settle within the configured timeout.
    #[error("Decision request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not match the protocol contract.
    #[error("Protocol failure: {0}")]
    Protocol(String),

    /// The service signaled that the simulation has ended.
    #[error("Decision service signaled termination")]
    Terminated,
}
