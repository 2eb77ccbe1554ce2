//! QuickFT client binary.
//!
//! Run with: cargo run --bin quickft-client -- send local.txt remote.txt --addr 127.0.0.1:29765

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quickft::{Client, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Server address, host:port
    #[arg(long, global = true, default_value_t = default_addr())]
    addr: String,

    /// Per-frame deadline, in seconds (0 = default)
    #[arg(long, global = true, default_value_t = 0)]
    tframe: u64,

    /// Per-ACK deadline, in seconds (0 = default)
    #[arg(long, global = true, default_value_t = 0)]
    tack: u64,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file to a remote path.
    Send {
        /// Local file to read.
        local_path: PathBuf,
        /// Remote destination path.
        remote_path: String,
    },
    /// Download a remote file to a local path.
    Receive {
        /// Remote file to request.
        remote_filename: String,
        /// Local destination path.
        local_path: PathBuf,
    },
    /// Remove a remote file.
    Delete {
        /// Remote file to delete.
        remote_filename: String,
    },
}

fn default_addr() -> String {
    format!("127.0.0.1:{}", quickft::config::DEFAULT_PORT)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter)).init();

    let mut config = Config::default();
    config.frame_timeout_secs = args.tframe;
    config.ack_timeout_secs = args.tack;

    let client = Client::new(args.addr.clone(), &config);

    let outcome = match args.command {
        Command::Send { local_path, remote_path } => client.send(&local_path, &remote_path).await,
        Command::Receive { remote_filename, local_path } => client.receive(&remote_filename, &local_path).await,
        Command::Delete { remote_filename } => client.delete(&remote_filename).await,
    };

    match outcome {
        Ok(result) if result.is_success() => {
            println!("OK: {result}");
            ExitCode::SUCCESS
        }
        Ok(result) => {
            eprintln!("server rejected the request: {result}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("quickft-client: {e}");
            ExitCode::FAILURE
        }
    }
}
