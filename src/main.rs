use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrops_inventory::config::{
    load_targets, Credentials, SyncSettings, DEFAULT_MAX_CHUNK_WORKERS,
    DEFAULT_MAX_CLUSTER_WORKERS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS,
};
use vrops_inventory::context::AppContext;
use vrops_inventory::server;
use vrops_inventory::utils::MAX_IDS_PER_REQUEST;

const APP_NAME: &str = "vrops-inventory";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8000";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(
    name = APP_NAME,
    version = VERSION,
    about = "Periodic vROps inventory discovery",
    long_about = "Discovers the vCenter topology behind every configured vROps target on a fixed interval and serves lock-free snapshots of it to metric collectors"
)]
struct Args {
    /// vROps user used to acquire tokens on every target
    #[arg(long, env = "USER", help = "vROps user")]
    user: String,

    /// Password for the vROps user
    #[arg(long, env = "PASSWORD", hide_env_values = true, help = "vROps password")]
    password: String,

    /// Service-discovery document listing the vROps targets
    #[arg(
        long,
        env = "INVENTORY",
        help = "Path to the service-discovery JSON listing the vROps targets"
    )]
    inventory_file: PathBuf,

    /// The address to listen on for HTTP requests
    #[arg(
        long,
        env = "VROPS_INVENTORY_LISTEN",
        default_value = DEFAULT_LISTEN_ADDRESS,
        help = "The address to listen on for HTTP requests"
    )]
    listen_address: String,

    /// Log level
    #[arg(
        long,
        env = "RUST_LOG",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log level (trace/debug/info/warn/error)"
    )]
    log_level: String,

    /// Inventory rebuild interval in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_SYNC_INTERVAL_SECS,
        help = "Inventory rebuild interval in seconds"
    )]
    sync_interval_secs: u64,

    /// Resource ids per bulk request
    #[arg(
        long,
        default_value_t = MAX_IDS_PER_REQUEST,
        help = "Resource ids per bulk request (1-1000)"
    )]
    chunk_size: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        help = "Per-request timeout in seconds"
    )]
    request_timeout_secs: u64,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CLUSTER_WORKERS,
        help = "Concurrent cluster workers per target"
    )]
    max_cluster_workers: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CHUNK_WORKERS,
        help = "Concurrent chunk requests per bulk query"
    )]
    max_chunk_workers: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!(
        app = APP_NAME,
        version = VERSION,
        listen_address = %args.listen_address,
        inventory_file = %args.inventory_file.display(),
        log_level = %args.log_level,
        sync_interval_secs = args.sync_interval_secs,
        chunk_size = args.chunk_size,
        "announcement"
    );

    let app_context = match build_context(&args) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Failed to initialize application context: {:#}", e);
            return;
        }
    };

    // Ctrl-C stops the HTTP server, which in turn stops the sync loop
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    };

    tracing::debug!(listen_address = %args.listen_address, "Starting HTTP server");
    if server::run(&args.listen_address, app_context, shutdown)
        .await
        .is_err()
    {
        std::process::exit(1);
    }
}

fn build_context(args: &Args) -> Result<AppContext> {
    let credentials = Credentials::new(&args.user, &args.password)?;
    let targets = load_targets(&args.inventory_file)?;
    let settings = SyncSettings {
        sync_interval: Duration::from_secs(args.sync_interval_secs),
        chunk_size: args.chunk_size,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        max_cluster_workers: args.max_cluster_workers,
        max_chunk_workers: args.max_chunk_workers,
    };
    AppContext::new(targets, credentials, settings)
}

/// Initialize the logging system
fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = match log_level {
        "trace" => EnvFilter::new("trace"),
        "debug" => EnvFilter::new("debug"),
        "info" => EnvFilter::new("info"),
        "warn" => EnvFilter::new("warn"),
        "error" => EnvFilter::new("error"),
        _ => EnvFilter::new("info"),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
