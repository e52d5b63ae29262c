//! poolgated — the poolgate dispatcher daemon.
//!
//! Single binary that assembles the poolgate subsystems:
//! - Worker pool (process spawning + registry)
//! - Autoscaler loop
//! - Reverse-proxy front end
//!
//! # Usage
//!
//! ```text
//! poolgated --config /etc/poolgate.toml
//! poolgated --port 8080 --base-port 5000 --worker-program node -- server.js
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use http::StatusCode;
use tokio::sync::watch;
use tracing::{error, info};

use poolgate_autoscale::Autoscaler;
use poolgate_core::{DEFAULT_WORKER_PROGRAM, PoolgateConfig};
use poolgate_pool::{CommandSpawner, WorkerPool};
use poolgate_proxy::{Dispatcher, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "poolgated", about = "poolgate dispatcher daemon", version)]
struct Cli {
    /// Path to poolgate.toml. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port the dispatcher listens on.
    #[arg(long)]
    port: Option<u16>,

    /// Port of the first worker.
    #[arg(long)]
    base_port: Option<u16>,

    /// Worker executable; receives its port as the last argument.
    #[arg(long)]
    worker_program: Option<String>,

    /// Cap the pool below the host CPU count.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Autoscaler tick interval, e.g. "5s".
    #[arg(long)]
    scale_interval: Option<String>,

    /// Status returned when every worker is busy.
    #[arg(long)]
    reject_status: Option<u16>,

    /// Extra worker arguments, placed before the port.
    #[arg(last = true)]
    worker_args: Vec<String>,
}

impl Cli {
    /// Load the config file (if any) and apply command-line overrides.
    fn load_config(&self) -> anyhow::Result<PoolgateConfig> {
        let mut config = match &self.config {
            Some(path) => PoolgateConfig::from_file(path)?,
            None => PoolgateConfig::default(),
        };

        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(base_port) = self.base_port {
            config.workers.base_port = base_port;
        }
        if let Some(program) = &self.worker_program {
            config.workers.program = program.clone();
        }
        if self.max_workers.is_some() {
            config.workers.max_workers = self.max_workers;
        }
        if let Some(interval) = &self.scale_interval {
            config.scaling.interval = interval.clone();
        }
        if let Some(status) = self.reject_status {
            config.proxy.reject_status = status;
        }
        if !self.worker_args.is_empty() {
            config.workers.args = self.worker_args.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,poolgate=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    run(config).await
}

/// Use the bundled worker next to this executable when the default
/// program name is configured and no explicit path was given.
fn resolve_program(program: &str) -> PathBuf {
    if program == DEFAULT_WORKER_PROGRAM
        && let Ok(exe) = std::env::current_exe()
    {
        let sibling = exe.with_file_name(program);
        if sibling.is_file() {
            return sibling;
        }
    }
    PathBuf::from(program)
}

async fn run(config: PoolgateConfig) -> anyhow::Result<()> {
    info!("poolgate dispatcher starting");

    let ip: IpAddr = config
        .listen
        .host
        .parse()
        .with_context(|| format!("invalid listen host {:?}", config.listen.host))?;
    let addr = SocketAddr::new(ip, config.listen.port);
    let reject_status = StatusCode::from_u16(config.proxy.reject_status)
        .context("invalid reject status")?;
    let base_port = config.workers.base_port;

    // ── Worker pool ────────────────────────────────────────────

    let program = resolve_program(&config.workers.program);
    let spawner = CommandSpawner::new(program.clone()).with_args(config.workers.args.clone());
    let pool = WorkerPool::new(Arc::new(spawner));
    info!(program = %program.display(), base_port, "worker pool initialized");

    pool.start_worker(base_port)
        .context("failed to start initial worker")?;

    // ── Autoscaler ─────────────────────────────────────────────

    let interval = config.scaling_interval();
    let autoscaler =
        Autoscaler::new(pool.clone(), base_port).with_max_workers(config.workers.max_workers);
    info!(
        interval_secs = interval.as_secs(),
        ceiling = autoscaler.ceiling(),
        "autoscaler initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
        }
        let _ = signal_tx.send(true);
    });

    let autoscale_shutdown = shutdown_rx.clone();
    let autoscale_handle = tokio::spawn(async move {
        autoscaler.run(interval, autoscale_shutdown).await;
    });

    // ── Dispatcher ─────────────────────────────────────────────

    let dispatcher = Dispatcher::new(pool.clone()).with_reject_status(reject_status);
    let served = HttpServer::new(addr, dispatcher.into_handler())
        .serve(shutdown_rx)
        .await;

    // Stop the autoscaler even if the server failed to start.
    let _ = shutdown_tx.send(true);
    let _ = autoscale_handle.await;
    pool.shutdown();

    served?;
    info!("poolgate dispatcher stopped");
    Ok(())
}
