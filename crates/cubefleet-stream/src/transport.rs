//! Datagram transports for encoded frames.

use crate::error::StreamResult;
use async_trait::async_trait;
use bytes::Bytes;
use cubefleet_core::AgentId;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Sends encoded frame datagrams somewhere.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    async fn send(&self, agent: AgentId, datagram: Bytes) -> StreamResult<()>;
}

enum Route {
    /// Destination port is `base_port + agent_id`, one feed per agent.
    PerAgent { base_port: u16 },
    /// Single fixed destination regardless of agent.
    Fixed { port: u16 },
}

/// UDP transport to a local receiver. Fire-and-forget; delivery is best
/// effort by design of the medium.
pub struct UdpFrameTransport {
    socket: UdpSocket,
    route: Route,
}

impl UdpFrameTransport {
    /// Route each agent's frames to `base_port + agent_id`.
    pub async fn per_agent(base_port: u16) -> StreamResult<Self> {
        Ok(Self {
            socket: Self::bind().await?,
            route: Route::PerAgent { base_port },
        })
    }

    /// Route every frame to a single `port`.
    pub async fn fixed(port: u16) -> StreamResult<Self> {
        Ok(Self {
            socket: Self::bind().await?,
            route: Route::Fixed { port },
        })
    }

    async fn bind() -> StreamResult<UdpSocket> {
        Ok(UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?)
    }

    fn destination(&self, agent: AgentId) -> SocketAddr {
        let port = match self.route {
            // Saturate rather than wrap on oversized agent ids.
            Route::PerAgent { base_port } => u32::from(base_port)
                .saturating_add(agent.as_u32())
                .min(u32::from(u16::MAX)) as u16,
            Route::Fixed { port } => port,
        };
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }
}

#[async_trait]
impl FrameTransport for UdpFrameTransport {
    async fn send(&self, agent: AgentId, datagram: Bytes) -> StreamResult<()> {
        self.socket.send_to(&datagram, self.destination(agent)).await?;
        Ok(())
    }
}
