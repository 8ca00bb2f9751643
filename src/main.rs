#![forbid(unsafe_code)]

//! `cluster-keeper`: demo pool serving a small axum app from every worker.
//!
//! The master forks workers, restarts them under the configured budget and
//! persists the pool snapshot. Each worker binds the shared port and serves
//! `/` plus the diagnostics routes until the master sends `quit`.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use clap::{Parser, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cluster_keeper::worker::bind_shared;
use cluster_keeper::{Cluster, ClusterConfig, ClusterError, Result, WorkerContext};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "cluster-keeper",
    about = "Supervised worker pool demo",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the number of workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Replace workers that exit.
    #[arg(long)]
    auto_restart: bool,

    /// Override the per-slot restart limit.
    #[arg(long)]
    auto_restart_limit: Option<u32>,

    /// Override the HTTP port workers listen on.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ClusterError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = load_config(&args)?;
    let port = config.http_port;

    let mut cluster = Cluster::new(config);
    let mut notifications = cluster.subscribe();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => println!("{notification}"),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = Router::new().route("/", get(hello));
    let app = cluster.attach_diagnostics(app);

    cluster
        .run(Some(move |ctx: WorkerContext| serve(ctx, app, port)))
        .await
}

fn load_config(args: &Cli) -> Result<ClusterConfig> {
    let mut config = match &args.config {
        Some(path) => ClusterConfig::load_from_path(path)?,
        None => ClusterConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    if args.auto_restart {
        config.auto_restart = true;
    }
    if let Some(limit) = args.auto_restart_limit {
        config.auto_restart_limit = limit;
    }
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.validate()?;
    Ok(config)
}

async fn serve(ctx: WorkerContext, app: Router, port: u16) -> Result<()> {
    let listener = bind_shared(SocketAddr::from(([0, 0, 0, 0], port)))?;
    info!(slot = %ctx.slot(), pid = ctx.pid(), port, "worker listening");

    let quit = ctx.quit_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { quit.cancelled().await })
        .await
        .map_err(|err| ClusterError::Worker(format!("http server error: {err}")))?;

    info!(slot = %ctx.slot(), "worker drained");
    Ok(())
}

async fn hello() -> String {
    format!("Process {} says hello!", std::process::id())
}

/// Logs go to stderr: a worker's stdout carries its control channel.
fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| ClusterError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| ClusterError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
