//! lcbus daemon binary
//!
//! Loads configuration, builds the node stack, and keeps it connected to
//! a GridConnect hub.

use clap::Parser;
use lcbus::transport::event_channel;
use lcbus::{Config, GridConnectTcp, Node, PipSet, Stack, TransportEvent};
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// OpenLCB/LCC node daemon
#[derive(Parser, Debug)]
#[command(name = "lcbus", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// GridConnect hub address (overrides config)
    #[arg(long, value_name = "HOST:PORT")]
    hub: Option<String>,

    /// Node id in dotted-hex form (overrides config)
    #[arg(long, value_name = "ID")]
    node_id: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("lcbus starting");

    // Load configuration
    let (config, loaded_paths) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    // Resolve the node id: command line first, then config.
    let node_id = match &args.node_id {
        Some(id) => match id.parse() {
            Ok(id) => id,
            Err(e) => {
                error!("Invalid --node-id: {}", e);
                std::process::exit(1);
            }
        },
        None => match config.node_id() {
            Ok(id) => id,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
    };

    // Build the local node and its stack.
    let mut node = Node::new(node_id);
    node.snip = config.snip();
    node.pip.insert(PipSet::DATAGRAM);
    node.pip.insert(PipSet::STREAM);
    node.pip.insert(PipSet::MEMORY_CONFIGURATION);
    node.pip.insert(PipSet::EVENT_EXCHANGE);
    node.pip.insert(PipSet::SIMPLE_NODE_IDENT);
    let mut stack = Stack::new(node);

    let hub_addr = args.hub.as_deref().unwrap_or_else(|| config.hub.addr());
    let reconnect = Duration::from_secs(config.hub.reconnect_secs());
    info!(node = %node_id, hub = %hub_addr, "lcbus running, press Ctrl+C to exit");

    loop {
        let (event_tx, mut event_rx) = event_channel(1024);
        let mut transport = GridConnectTcp::new(hub_addr, event_tx);
        if let Err(e) = transport.start().await {
            warn!(hub = %hub_addr, "hub connection failed: {}, retrying", e);
            tokio::select! {
                _ = tokio::time::sleep(reconnect) => continue,
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        // Pump events until the connection drops or we are told to quit.
        let quitting = loop {
            let event = tokio::select! {
                event = event_rx.recv() => event,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break true;
                }
            };
            match event {
                Some(TransportEvent::Connected) => stack.link_up(),
                Some(TransportEvent::Frame(frame)) => stack.process_frame(&frame),
                Some(TransportEvent::Disconnected) | None => {
                    warn!(hub = %hub_addr, "hub connection lost");
                    stack.link_down();
                    break false;
                }
            }
            let mut send_failed = false;
            for frame in stack.take_frames() {
                if let Err(e) = transport.send_frame(&frame).await {
                    warn!("send failed: {}", e);
                    send_failed = true;
                    break;
                }
            }
            if send_failed {
                stack.link_down();
                break false;
            }
        };

        let _ = transport.stop().await;
        if quitting {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(reconnect) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("lcbus shutdown complete");
}
