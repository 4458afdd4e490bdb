//! Frame streaming for the fleet.
//!
//! Each agent runs a [`StreamingPipeline`]: a paced [`SensorCapture`] feeds
//! a bounded drop-oldest [`FrameQueue`], and a sender task drains it onto a
//! [`FrameTransport`] (UDP in production). Per-agent feeds tag each datagram
//! with a 4-byte little-endian agent id; the observer feed sends bare
//! payloads to a single fixed port.

pub mod capture;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod queue;
pub mod transport;

pub use capture::SensorCapture;
pub use error::{StreamError, StreamResult};
pub use frame::Frame;
pub use pipeline::{PipelineConfig, StreamingPipeline};
pub use queue::FrameQueue;
pub use transport::{FrameTransport, UdpFrameTransport};
