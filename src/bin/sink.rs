use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use teleflood::core::Packet;
use tokio::net::UdpSocket;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 65_536;

#[derive(Parser)]
#[command(
    name = "teleflood-sink",
    version,
    about = "Receive teleflood datagrams and report rates, gaps and decode errors"
)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:54431")]
    listen: String,

    /// Seconds between reports
    #[arg(long, default_value_t = 5.0)]
    log_interval: f64,
}

/// A frame this far behind the newest one means the sender restarted
const RESTART_GAP: u64 = 1_000;

/// Per-group receive bookkeeping
#[derive(Debug, Default)]
struct GroupStats {
    received: u64,
    last_frame: Option<u64>,
    missing: u64,
    out_of_order: u64,
    restarts: u64,
}

impl GroupStats {
    fn observe(&mut self, frame: u64) {
        self.received += 1;
        let Some(last) = self.last_frame else {
            self.last_frame = Some(frame);
            return;
        };
        if frame > last {
            self.missing += frame - last - 1;
            self.last_frame = Some(frame);
        } else if last - frame > RESTART_GAP {
            self.restarts += 1;
            self.last_frame = Some(frame);
        } else {
            // A late frame fills a gap counted when a newer one arrived
            self.out_of_order += 1;
            if frame < last {
                self.missing = self.missing.saturating_sub(1);
            }
        }
    }
}

fn report_interval(secs: f64) -> Result<Duration> {
    let interval = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid --log-interval {}", secs))?;
    Ok(interval.max(Duration::from_millis(100)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_target(false).init();

    let socket = UdpSocket::bind(&cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!("Listening on {}", socket.local_addr()?);

    let interval = report_interval(cli.log_interval)?;
    let started = Instant::now();
    let mut last_log = started;
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut groups: HashMap<String, GroupStats> = HashMap::new();
    let mut datagrams = 0u64;
    let mut decode_errors = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received.context("Failed to receive datagram")?;
                datagrams += 1;
                match Packet::decode(&buf[..len]) {
                    Ok(packet) => groups.entry(packet.group_name).or_default().observe(packet.frame),
                    Err(e) => {
                        decode_errors += 1;
                        warn!("Undecodable datagram: {:#}", e);
                    }
                }
            }
            _ = &mut ctrl_c => break,
        }

        let now = Instant::now();
        if now - last_log >= interval {
            let secs = (now - started).as_secs_f64();
            let missing: u64 = groups.values().map(|g| g.missing).sum();
            let reordered: u64 = groups.values().map(|g| g.out_of_order).sum();
            info!(
                "datagrams={} (~{:.0}/s) groups={} missing={} out_of_order={} decode_errors={}",
                datagrams,
                datagrams as f64 / secs,
                groups.len(),
                missing,
                reordered,
                decode_errors
            );
            last_log = now;
        }
    }

    let mut names: Vec<_> = groups.keys().cloned().collect();
    names.sort();
    for name in names {
        let stats = &groups[&name];
        info!(
            "{}: received={} missing={} out_of_order={} restarts={}",
            name, stats.received, stats.missing, stats.out_of_order, stats.restarts
        );
    }
    Ok(())
}
