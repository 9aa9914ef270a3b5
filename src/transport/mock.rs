use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

use super::Transport;
use crate::core::Packet;

/// A datagram captured by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct SentDatagram {
    pub payload: Vec<u8>,
    pub sent_at: Instant,
}

impl SentDatagram {
    pub fn decode(&self) -> Result<Packet> {
        Packet::decode(&self.payload)
    }
}

/// In-memory transport that records every datagram.
///
/// Can be told to stall once after a number of sends, or to fail every
/// n-th send, to exercise the scheduler's overload and error paths.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentDatagram>>>,
    released: Arc<AtomicBool>,
    attempts: usize,
    stall: Option<(usize, Duration)>,
    fail_every: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicBool::new(false)),
            attempts: 0,
            stall: None,
            fail_every: None,
        }
    }

    /// Sleep for `duration` right after the `after_sends`-th successful send
    pub fn with_stall(mut self, after_sends: usize, duration: Duration) -> Self {
        self.stall = Some((after_sends, duration));
        self
    }

    /// Fail every `n`-th send attempt (1-based)
    pub fn with_failures_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Shared view of the captured datagrams, valid after the transport moves
    pub fn sent(&self) -> Arc<Mutex<Vec<SentDatagram>>> {
        self.sent.clone()
    }

    /// Set once the transport has been dropped
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.attempts += 1;
        if let Some(n) = self.fail_every {
            if self.attempts % n == 0 {
                return Err(anyhow!("simulated send failure #{}", self.attempts));
            }
        }

        let count = {
            let mut sent = self
                .sent
                .lock()
                .map_err(|_| anyhow!("mock transport log poisoned"))?;
            sent.push(SentDatagram {
                payload: payload.to_vec(),
                sent_at: Instant::now(),
            });
            sent.len()
        };

        if let Some((after, duration)) = self.stall {
            if count == after {
                sleep(duration).await;
            }
        }

        Ok(payload.len())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
