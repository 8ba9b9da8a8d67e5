//! canvas-bridge
//!
//! Listens for a design-tool plugin on a loopback WebSocket and serves MCP
//! tool calls on stdio, forwarding them to whichever plugin instance most
//! recently completed the handshake.
//!
//! Run:
//!   cargo run -p canvas-bridge-server -- --port 3055 --secret "$CANVAS_BRIDGE_SECRET"

use canvas_bridge_server::{server, Bridge, CatalogStore, Cli, Config, Dispatcher, McpServer};
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("canvas_bridge=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    if config.default_secret {
        tracing::warn!("Using the built-in handshake secret; set --secret for anything but local use");
    }
    if !config.listen.ip().is_loopback() {
        tracing::warn!("Listening on non-loopback address {}", config.listen.ip());
    }

    let bridge = Bridge::new(config.command_timeout, CatalogStore::shared());
    let listener = TcpListener::bind(config.listen).await?;

    let peers = tokio::spawn({
        let bridge = bridge.clone();
        let config = config.clone();
        async move { server::run(listener, bridge, &config).await }
    });

    let mcp = Arc::new(McpServer::new(Dispatcher::new(bridge)));
    tokio::select! {
        result = mcp.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => result?,
        result = peers => result??,
    }

    Ok(())
}
