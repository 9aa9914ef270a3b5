use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::debug;

use super::Transport;

/// UDP socket bound locally and aimed at a single destination
pub struct UdpTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(local: SocketAddr, destination: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local)
            .await
            .with_context(|| format!("Failed to bind UDP socket on {}", local))?;
        debug!(
            local = %socket.local_addr().unwrap_or(local),
            %destination,
            "udp transport opened"
        );
        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read local socket address")
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.socket
            .send_to(payload, self.destination)
            .await
            .with_context(|| format!("Failed to send datagram to {}", self.destination))
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.destination)
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        debug!(destination = %self.destination, "udp transport released");
    }
}
