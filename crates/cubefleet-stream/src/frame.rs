//! Frame representation and datagram layout.

use bytes::{BufMut, Bytes, BytesMut};
use cubefleet_core::AgentId;

/// One captured sensor frame, queued for transmission.
///
/// `seq` is assigned by the capture side and increases monotonically per
/// pipeline; gaps in the receiver's view mean frames were shed under
/// saturation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub agent: AgentId,
    pub seq: u64,
    pub timestamp_ms: u64,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(agent: AgentId, seq: u64, timestamp_ms: u64, payload: Bytes) -> Self {
        Self {
            agent,
            seq,
            timestamp_ms,
            payload,
        }
    }

    /// Datagram with a 4-byte little-endian agent-id header before the
    /// payload. Receivers demultiplex agent feeds by this header.
    pub fn encode_tagged(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.payload.len());
        buf.put_u32_le(self.agent.as_u32());
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Bare payload, no header. Used for the single observer feed, where
    /// there is nothing to demultiplex.
    pub fn encode_untagged(&self) -> Bytes {
        self.payload.clone()
    }
}
