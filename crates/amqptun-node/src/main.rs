// ============================================
// File: crates/amqptun-node/src/main.rs
// ============================================
//! # amqptun Entry Point
//!
//! ## Creation Reason
//! Command-line front end for a tunnel node: parses flags (optionally on
//! top of a TOML file), sets up logging, subscribes the node to its
//! networks and runs until SIGINT/SIGTERM.
//!
//! ## Usage
//! ```bash
//! # Node A: address 10.1.0.1, also serving 10.2.0.0/16
//! amqptun --amqp-uri amqp://guest:guest@mq:5672/%2f \
//!         --tun-ip 10.1.0.1/16 --networks 10.2.0.0/16
//!
//! # Same, from a config file, with per-packet logging
//! amqptun --config /etc/amqptun.toml --debug
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `--tun-ip` also subscribes the node to its own /32
//! - Any setup or run error exits with status 1
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use amqptun_node::config::DEFAULT_LOG_LEVEL;
use amqptun_node::NodeConfig;

// ============================================
// CLI Definition
// ============================================

/// IP tunnel over an AMQP topic exchange
#[derive(Parser, Debug)]
#[command(name = "amqptun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IP address with a network mask to use on the TUN interface
    #[arg(long, value_name = "CIDR")]
    tun_ip: Option<String>,

    /// TUN interface name to use or create [default: amqp-tun0]
    #[arg(long, value_name = "NAME")]
    tun_iface_name: Option<String>,

    /// URI to use for connection to AMQP broker
    #[arg(long, env = "AMQPTUN_AMQP_URI", hide_env_values = true, value_name = "URI")]
    amqp_uri: Option<String>,

    /// AMQP exchange to use or create [default: ip-router]
    #[arg(long, value_name = "NAME")]
    exchange: Option<String>,

    /// Comma separated list of networks to route to this node, e.g. 1.0.0.0/24,2.0.0.0/16
    #[arg(long, value_delimiter = ',', value_name = "CIDR,...")]
    networks: Vec<String>,

    /// Print all packets passing through
    #[arg(long)]
    debug: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set [default: info]
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Applies flags on top of file (or default) values.
    fn apply(self, config: &mut NodeConfig) {
        if let Some(address) = self.tun_ip {
            config.interface.address = Some(address);
        }
        if let Some(name) = self.tun_iface_name {
            config.interface.name = name;
        }
        if let Some(uri) = self.amqp_uri {
            config.broker.uri = uri;
        }
        if let Some(exchange) = self.exchange {
            config.broker.exchange = exchange;
        }
        let networks: Vec<String> = self
            .networks
            .into_iter()
            .filter(|n| !n.trim().is_empty())
            .collect();
        if !networks.is_empty() {
            config.routes.networks = networks;
        }
        if self.debug {
            config.logging.debug_packets = true;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let source = config_source(cli.config.as_deref());

    let config = match build_config(cli).await {
        Ok(config) => config,
        Err(e) => {
            init_logging(DEFAULT_LOG_LEVEL);
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    // The subscriber needs the resolved level, so loading happens unlogged
    init_logging(&config.logging.level);
    info!("Configuration loaded from {}", source);

    if let Err(e) = node::run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Resolves the final node configuration.
async fn build_config(cli: Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path).await?,
        None => NodeConfig::default(),
    };

    cli.apply(&mut config);

    config.validate()?;
    config.require_uri()?;
    Ok(config)
}

/// Describes where the configuration came from.
fn config_source(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("file {} with command-line overrides", path.display()),
        None => "command-line flags and defaults".to_owned(),
    }
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

// ============================================
// Node
// ============================================

#[cfg(target_os = "linux")]
mod node {
    use anyhow::Context;
    use tokio_util::sync::CancellationToken;
    use tracing::{info, warn};

    use amqptun_node::{NodeConfig, Tunnel};

    /// Sets up the tunnel, subscribes it and runs until a signal or error.
    pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
        let subscriptions = config.subscriptions()?;
        let tunnel = Tunnel::setup(config.tunnel_config()?)
            .await
            .context("failed to set up AMQP tunnel")?;

        let token = CancellationToken::new();
        spawn_signal_listener(token.clone());

        let result = async {
            tunnel.add_routes(&subscriptions).await?;
            tunnel.run(&token).await
        }
        .await;

        if let Err(e) = tunnel.shutdown().await {
            warn!("Broker close failed: {}", e);
        }

        result.context("tunnel exited")?;
        info!("Shutdown complete");
        Ok(())
    }

    /// Cancels `token` on SIGINT or SIGTERM.
    fn spawn_signal_listener(token: CancellationToken) {
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            token.cancel();
        });
    }

    async fn wait_for_signal() {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Ctrl-C handler unavailable: {}", e);
                }
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod node {
    use amqptun_node::NodeConfig;

    pub async fn run(_config: NodeConfig) -> anyhow::Result<()> {
        anyhow::bail!("amqptun needs a Linux TUN device")
    }
}

// ============================================
// Tests
// ============================================
