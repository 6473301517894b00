//! onvif-scout - find ONVIF devices on the local network
//!
//! Sends one WS-Discovery probe per device type and lists every device that
//! answers within the collection window.

mod config;
mod interface;
mod output;

use anyhow::{bail, Result};
use clap::Parser;
use scout_discovery::{DiscoveryError, DiscoverySession};
use scout_transport::UdpMulticastTransport;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "onvif-scout")]
#[command(about = "Discover ONVIF devices with WS-Discovery probes")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "onvif-scout.toml")]
    config: PathBuf,

    /// Collection window in milliseconds
    #[arg(short, long)]
    time: Option<u64>,

    /// Device type to probe for (repeatable)
    #[arg(long = "type", value_name = "TYPE")]
    types: Vec<String>,

    /// Interface name or IPv4 address to send probes from
    #[arg(short, long)]
    interface: Option<String>,

    /// Probe destination instead of the multicast group
    #[arg(long)]
    target: Option<SocketAddr>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// List each device once, even if several probes matched it
    #[arg(long)]
    unique: bool,

    /// List usable interfaces and exit
    #[arg(long)]
    list_interfaces: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Log raw reply payloads
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.list_interfaces {
        for (name, ip) in interface::list_ipv4()? {
            println!("{:<16} {}", name, ip);
        }
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    if let Some(time) = args.time {
        config.discovery.time_ms = time;
    }
    if !args.types.is_empty() {
        config.discovery.types = args.types;
    }
    if let Some(interface) = args.interface {
        config.transport.interface = Some(interface);
    }
    if let Some(target) = args.target {
        config.transport.target = target;
    }
    // Validate once, after the overrides
    config.validate()?;

    let mut transport_config = config.to_transport_config()?;
    transport_config.dump_payloads = args.verbose;

    info!(
        target_addr = %transport_config.target,
        types = ?config.discovery.types,
        time_ms = config.discovery.time_ms,
        "Configuration loaded"
    );

    let transport = UdpMulticastTransport::bind(transport_config).await?;

    // Ctrl-C closes the window early
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    if !args.json {
        let window = config.window();
        if window.subsec_millis() == 0 {
            println!("Searching ONVIF devices for {} seconds", window.as_secs());
        } else {
            println!("Searching ONVIF devices for {} ms", window.as_millis());
        }
    }

    let session = DiscoverySession::new(&transport).with_shutdown(shutdown_rx);
    let collecting = match session
        .start(config.discovery.types.iter().cloned(), config.window())
        .await
    {
        Ok(collecting) => collecting,
        Err(DiscoveryError::AllProbesFailed { failures }) => {
            eprint!("{}", output::format_failures(&failures));
            bail!("Could not send any probe");
        }
        Err(e) => return Err(e.into()),
    };

    let result = collecting.collect().await;
    if result.elapsed < config.window() {
        warn!("Discovery interrupted");
    }

    if args.json {
        println!("{}", output::format_json(&result)?);
    } else {
        println!("{}", output::format_human(&result, args.unique));
    }

    Ok(())
}
