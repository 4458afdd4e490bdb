//! Fleet configuration with environment overrides.
//!
//! Defaults match the reference deployment; every knob can be overridden
//! with a `CUBEFLEET_*` environment variable so deployments change behavior
//! without rebuilds.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `CUBEFLEET_BRAIN_URL` | Decision service base URL | `http://localhost:5000` |
//! | `CUBEFLEET_DECISION_PERIOD` | Coordination cycle period | `1s` |
//! | `CUBEFLEET_REQUEST_TIMEOUT` | Decision request timeout | `30s` |
//! | `CUBEFLEET_CAPTURE_INTERVAL` | Frame capture cadence | `33ms` |
//! | `CUBEFLEET_FRAME_QUEUE_DEPTH` | Frames buffered per agent | `8` |
//! | `CUBEFLEET_STREAM_BASE_PORT` | UDP port base (`+ agent id`) | `5123` |
//! | `CUBEFLEET_OBSERVER_PORT` | UDP port of the observer stream | `5124` |
//! | `CUBEFLEET_PICKUP_RADIUS` | Max distance for a pickup | `1.8` |
//! | `CUBEFLEET_DELIVERY_RADIUS` | Delivery zone radius | `2.0` |
//! | `CUBEFLEET_PATH_RETRY_BACKOFF` | Wait before one path retry | `100ms` |
//! | `CUBEFLEET_RECOVERY_DURATION` | Obstacle recovery maneuver time | `500ms` |
//! | `CUBEFLEET_SHUTDOWN_TIMEOUT` | Pipeline join bound at teardown | `1s` |
//!
//! Durations use humantime syntax (`250ms`, `1s`, `2min`).

use crate::agent::Tuning;
use std::env;
use std::time::Duration;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Complete runtime configuration for one fleet process.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Base URL of the external decision service.
    pub brain_url: String,
    /// Period of the coordination cycle.
    pub decision_period: Duration,
    /// Timeout for one decision request.
    pub request_timeout: Duration,
    /// Frame capture cadence (~30 Hz by default).
    pub capture_interval: Duration,
    /// Bounded frame queue depth per agent.
    pub frame_queue_depth: usize,
    /// Frames for agent `i` go to UDP port `stream_base_port + i`.
    pub stream_base_port: u16,
    /// Port of the untagged world-observer stream.
    pub observer_port: u16,
    pub pickup_radius: f32,
    pub delivery_radius: f32,
    pub path_retry_backoff: Duration,
    pub recovery_duration: Duration,
    /// Bound on joining capture/sender tasks at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            brain_url: "http://localhost:5000".to_string(),
            decision_period: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            capture_interval: Duration::from_millis(33),
            frame_queue_depth: 8,
            stream_base_port: 5123,
            observer_port: 5124,
            pickup_radius: 1.8,
            delivery_radius: 2.0,
            path_retry_backoff: Duration::from_millis(100),
            recovery_duration: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

impl FleetConfig {
    /// Load configuration from `CUBEFLEET_*` environment variables on top
    /// of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = env::var("CUBEFLEET_BRAIN_URL") {
            config.brain_url = url;
        }
        read_duration("CUBEFLEET_DECISION_PERIOD", &mut config.decision_period)?;
        read_duration("CUBEFLEET_REQUEST_TIMEOUT", &mut config.request_timeout)?;
        read_duration("CUBEFLEET_CAPTURE_INTERVAL", &mut config.capture_interval)?;
        read_parsed("CUBEFLEET_FRAME_QUEUE_DEPTH", &mut config.frame_queue_depth)?;
        read_parsed("CUBEFLEET_STREAM_BASE_PORT", &mut config.stream_base_port)?;
        read_parsed("CUBEFLEET_OBSERVER_PORT", &mut config.observer_port)?;
        read_parsed("CUBEFLEET_PICKUP_RADIUS", &mut config.pickup_radius)?;
        read_parsed("CUBEFLEET_DELIVERY_RADIUS", &mut config.delivery_radius)?;
        read_duration(
            "CUBEFLEET_PATH_RETRY_BACKOFF",
            &mut config.path_retry_backoff,
        )?;
        read_duration("CUBEFLEET_RECOVERY_DURATION", &mut config.recovery_duration)?;
        read_duration("CUBEFLEET_SHUTDOWN_TIMEOUT", &mut config.shutdown_timeout)?;

        config.validate()?;
        Ok(config)
    }

    /// Check invariants shared by all loaders.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decision_period.is_zero() {
            return Err(ConfigError::ValidationError(
                "decision period must be non-zero".to_string(),
            ));
        }
        if self.capture_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "capture interval must be non-zero".to_string(),
            ));
        }
        if self.frame_queue_depth == 0 {
            return Err(ConfigError::ValidationError(
                "frame queue depth must be at least 1".to_string(),
            ));
        }
        if self.stream_base_port == 0 {
            return Err(ConfigError::ValidationError(
                "stream base port must be non-zero".to_string(),
            ));
        }
        if self.pickup_radius <= 0.0 || self.delivery_radius <= 0.0 {
            return Err(ConfigError::ValidationError(
                "pickup and delivery radii must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Movement-policy subset handed to the world.
    pub fn tuning(&self) -> Tuning {
        Tuning {
            pickup_radius: self.pickup_radius,
            delivery_radius: self.delivery_radius,
            path_retry_backoff: self.path_retry_backoff,
            recovery_duration: self.recovery_duration,
        }
    }
}

fn read_duration(key: &str, slot: &mut Duration) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var(key) {
        *slot = humantime::parse_duration(&raw).map_err(|e| ConfigError::InvalidEnvVar {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

fn read_parsed<T>(key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(key) {
        *slot = raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}
