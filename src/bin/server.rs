//! QuickFT server binary.
//!
//! Run with: cargo run --bin quickft-server

use clap::Parser;
use quickft::config::LogFormat;
use quickft::{Config, Server};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = quickft::config::DEFAULT_PORT)]
    port: u16,

    /// Root directory for SEND/RECEIVE/DELETE operations
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Maximum number of concurrently active connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Directory to write rolling log files into; stderr if unset
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("failed to load config: {e}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    if args.config.is_none() {
        config.bind_address = args.bind;
        config.port = args.port;
    }
    if let Some(root) = args.root {
        config.root_dir = root;
    }
    if let Some(max_connections) = args.max_connections {
        config.max_connections = max_connections;
    }
    if let Some(log_format) = args.log_format {
        config.logging.format = log_format;
    }
    if let Some(log_dir) = args.log_dir {
        config.logging.directory = Some(log_dir);
    }

    let filter = if args.verbose { "debug" } else { "info" };
    let _log_guard = init_logging(&config, filter);

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }

    info!(
        bind_address = %config.bind_address,
        port = config.port,
        root_dir = ?config.root_dir,
        max_connections = config.max_connections,
        "quickft server configuration"
    );

    let server = Server::new(config);
    let shutdown = CancellationToken::new();
    let shutdown_on_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, shutting down");
        shutdown_on_signal.cancel();
    });

    if let Err(e) = server.run(shutdown).await {
        error!(error = %e, "server encountered an error");
        std::process::exit(1);
    }

    info!("quickft server shutdown complete");
}

fn init_logging(config: &Config, filter: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if let Some(ref dir) = config.logging.directory {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("warning: failed to create log directory {}: {e}", dir.display());
            eprintln!("falling back to stderr logging");
        } else {
            let appender = tracing_appender::rolling::daily(dir, &config.logging.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            match config.logging.format {
                LogFormat::Json => tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(EnvFilter::new(filter))
                    .with_writer(non_blocking)
                    .init(),
                LogFormat::Text => tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new(filter))
                    .with_writer(non_blocking)
                    .init(),
            }
            return Some(guard);
        }
    }

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::new(filter))
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter)).init(),
    }
    None
}
