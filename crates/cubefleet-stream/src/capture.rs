//! Frame sources.

use crate::error::StreamResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Produces one encoded frame per call.
///
/// Implementations own their encoder state; the pipeline supplies the pacing
/// and the sequence numbering.
#[async_trait]
pub trait SensorCapture: Send + Sync {
    /// Capture and encode the next frame. Returns the payload and its
    /// capture timestamp in milliseconds.
    async fn capture(&self) -> StreamResult<(Bytes, u64)>;
}
