//! TLoE Node - reliable frame receiver over UDP
//!
//! Runs one endpoint against a single peer, acknowledges what arrives and
//! writes delivered payloads to stdout or a file.

use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tloe_cli::{display_compact_stats, display_endpoint_stats, Config};
use tloe_io::{Clock, MonotonicClock, Timer, UdpFabric};
use tloe_protocol::{Endpoint, EndpointError, RxEvent};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tloe-node")]
#[command(about = "TileLink over Ethernet receive endpoint", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Peer address
    #[arg(short, long)]
    peer: Option<SocketAddr>,

    /// Output file (use '-' for stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Statistics interval in seconds (0 disables)
    #[arg(long)]
    stats: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", path.display(), e))?,
        None => Config::default(),
    };

    // Command-line flags override the file
    if let Some(bind) = args.bind {
        config.node.bind = Some(bind);
    }
    if let Some(peer) = args.peer {
        config.node.peer = Some(peer);
    }
    if let Some(output) = args.output {
        config.node.output = output;
    }
    if let Some(stats) = args.stats {
        config.node.stats_interval_secs = stats;
    }

    let bind = config
        .node
        .bind
        .ok_or_else(|| anyhow::anyhow!("No bind address given (--bind or [node].bind)"))?;
    let peer = config
        .node
        .peer
        .ok_or_else(|| anyhow::anyhow!("No peer address given (--peer or [node].peer)"))?;

    tracing::info!("TLoE node starting...");

    let mut fabric = UdpFabric::bind(bind, peer)?;
    tracing::info!("Listening on {}, peer {}", fabric.local_addr()?, peer);

    let mut endpoint = Endpoint::new(config.protocol.to_endpoint_config()?);

    let mut writer: Box<dyn Write> = if config.node.output == "-" {
        tracing::info!("Writing to stdout");
        Box::new(io::stdout())
    } else {
        tracing::info!("Writing to file: {}", config.node.output);
        let file = File::create(&config.node.output).map_err(|e| {
            anyhow::anyhow!("Failed to create file '{}': {}", config.node.output, e)
        })?;
        Box::new(BufWriter::new(file))
    };
    let to_stdout = config.node.output == "-";

    let clock = MonotonicClock;
    let start = clock.now();
    let deadline = args.duration.map(|secs| start + Duration::from_secs(secs));
    let stats_interval = config.node.stats_interval();
    let mut stats_timer = Timer::new(stats_interval, start);
    let mut delivered_bytes = 0u64;

    tracing::info!("Ready to receive frames...");

    loop {
        let now = clock.now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            break;
        }

        let cycle = match endpoint.poll(&mut fabric, now) {
            Ok(cycle) => Some(cycle),
            Err(EndpointError::Ack(e)) => {
                // Control queue full; transmitting below drains it
                tracing::warn!("Dropping control frame: {}", e);
                None
            }
            Err(EndpointError::Fabric(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                tracing::debug!("Fabric busy: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = endpoint.transmit_control(&mut fabric) {
            tracing::warn!("Control transmit failed: {}", e);
        }

        while let Some(message) = endpoint.pop_message() {
            writer.write_all(&message.payload)?;
            delivered_bytes += message.payload.len() as u64;
        }

        if matches!(cycle.map(|c| c.event), Some(RxEvent::Idle) | None) {
            writer.flush()?;
            thread::sleep(Duration::from_micros(100));
        }

        if !stats_interval.is_zero() && stats_timer.try_fire(now) {
            let stats = endpoint.stats();
            if to_stdout {
                tracing::info!(
                    delivered = stats.delivered,
                    duplicates = stats.duplicates,
                    out_of_sequence = stats.out_of_sequence,
                    acks_flushed = stats.acks_flushed,
                    naks_sent = stats.naks_sent,
                    "stats"
                );
            } else {
                display_compact_stats(&stats, delivered_bytes, now - start);
            }
        }
    }

    writer.flush()?;

    if !to_stdout {
        display_endpoint_stats(&endpoint.stats(), endpoint.credits(), clock.now() - start);
    }

    tracing::info!("TLoE node stopped");
    Ok(())
}
