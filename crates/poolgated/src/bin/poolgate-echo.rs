//! poolgate-echo — reference worker program.
//!
//! Binds the port given as its sole argument and answers every request
//! with the request line and body. `poolgated` spawns it by default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use poolgate_proxy::{HttpServer, echo_handler};

#[derive(Parser, Debug)]
#[command(name = "poolgate-echo", about = "poolgate reference worker")]
struct Cli {
    /// Port to listen on.
    port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr = SocketAddr::new(cli.host, cli.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });

    info!(port = cli.port, pid = std::process::id(), "worker starting");
    HttpServer::new(addr, echo_handler(cli.port))
        .serve(shutdown_rx)
        .await
}
