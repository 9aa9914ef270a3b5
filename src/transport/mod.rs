pub mod mock;
pub mod udp;

use anyhow::Result;
use async_trait::async_trait;

pub use mock::{MockTransport, SentDatagram};
pub use udp::UdpTransport;

/// Fire-and-forget datagram sink.
///
/// Implementations may drop data silently. An `Err` from `send` is treated
/// as transient by the scheduler. The underlying resource is released when
/// the transport is dropped.
#[async_trait]
pub trait Transport: Send {
    /// Send one datagram to the configured destination, returning bytes written
    async fn send(&mut self, payload: &[u8]) -> Result<usize>;

    /// Human readable destination, used in log lines
    fn describe(&self) -> String;
}
