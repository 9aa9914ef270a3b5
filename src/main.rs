use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teleflood::core::StreamConfig;
use teleflood::engine::Scheduler;
use teleflood::transport::UdpTransport;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "teleflood",
    version,
    about = "Stream deterministic multi-group telemetry over UDP at a fixed rate, one datagram per group per tick"
)]
struct Cli {
    /// JSON config file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// UDP host to send data to
    #[arg(long)]
    host: Option<String>,

    /// UDP port
    #[arg(long)]
    port: Option<u16>,

    /// Number of signal groups (raised to --min-groups)
    #[arg(long)]
    groups: Option<usize>,

    /// Signals per group (auto-raised so the total reaches --min-signals)
    #[arg(long)]
    signals_per_group: Option<usize>,

    /// Target frame rate in Hertz
    #[arg(long)]
    hz: Option<f64>,

    /// Seconds between progress logs
    #[arg(long)]
    log_interval: Option<f64>,

    /// Random seed for deterministic signal characteristics
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Local address to bind the sending socket to
    #[arg(long)]
    bind: Option<String>,

    /// Minimum number of groups
    #[arg(long)]
    min_groups: Option<usize>,

    /// Minimum total number of signals
    #[arg(long)]
    min_signals: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => StreamConfig::load(path)?,
            None => StreamConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(groups) = self.groups {
            config.groups = groups;
        }
        if let Some(signals) = self.signals_per_group {
            config.signals_per_group = signals;
        }
        if let Some(hz) = self.hz {
            config.rate_hz = hz;
        }
        if let Some(interval) = self.log_interval {
            config.log_interval_secs = interval;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(frames) = self.frames {
            config.max_frames = Some(frames);
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(min_groups) = self.min_groups {
            config.limits.min_groups = min_groups;
        }
        if let Some(min_signals) = self.min_signals {
            config.limits.min_total_signals = min_signals;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = cli.into_config()?;
    config.validate().context("Invalid configuration")?;

    let plan = Arc::new(config.plan_builder().build());
    let mut scheduler = Scheduler::new(&config, plan)?;

    let transport = UdpTransport::bind(config.bind_addr()?, config.destination()?).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                // Dropping the sender would stop the stream, so hold it
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let summary = scheduler.run(transport, shutdown_rx).await?;
    info!(
        "Sent {} datagrams over {} frames in {:.2}s ({} send errors, {} resyncs)",
        summary.datagrams,
        summary.frames,
        summary.wall_elapsed.as_secs_f64(),
        summary.send_errors,
        summary.resyncs
    );

    Ok(())
}
