//! # Bridge Relayer Node
//!
//! Entry point for the relayer process.
//!
//! ## Startup Sequence
//!
//! 1. Parse CLI flags and install logging
//! 2. Resolve configuration (defaults, file, environment, flags)
//! 3. Open the cursor store and dead-letter log
//! 4. Resolve the starting cursor against the source head
//! 5. Run scan cycles until a signal arrives or recovery gives up
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Stopped on signal |
//! | 1 | Startup failed |
//! | 2 | Faulted after exhausting cycle retries |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use relayer_core::RunExit;
use relayer_node::config::{NodeSettings, Overrides, StorageBackend};
use relayer_node::wiring;

/// Bridge relayer: forwards confirmed TokensLocked events to a destination.
#[derive(Debug, Parser)]
#[command(name = "relayer-node", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the cursor and dead-letter log.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Source chain JSON-RPC endpoint.
    #[arg(long, value_name = "URL")]
    source_rpc_url: Option<String>,

    /// Bridge contract address (0x-prefixed hex).
    #[arg(long, value_name = "ADDRESS")]
    contract_address: Option<String>,

    /// Destination endpoint that receives event payloads.
    #[arg(long, value_name = "URL")]
    destination: Option<String>,

    /// Blocks below the head a window must stay.
    #[arg(long, value_name = "BLOCKS")]
    confirmations: Option<u64>,

    /// Cursor storage backend: file or rocksdb.
    #[arg(long, value_name = "BACKEND")]
    storage: Option<StorageBackend>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            source_rpc_url: self.source_rpc_url.clone(),
            contract_address: self.contract_address.clone(),
            destination_endpoint: self.destination.clone(),
            confirmation_depth: self.confirmations,
            data_dir: self.data_dir.clone(),
            storage: self.storage,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins; plain info otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logging: {}", e);
        return ExitCode::from(1);
    }

    info!("===========================================");
    info!("  Bridge Relayer Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Confirmation-depth scan, at-least-once");
    info!("===========================================");

    match start(&args).await {
        Ok(RunExit::Terminated) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(RunExit::Faulted) => {
            error!("Relayer faulted after exhausting cycle retries");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Startup failed: {:#}", e);
            eprintln!("relayer-node: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn start(args: &Args) -> Result<RunExit> {
    let settings = NodeSettings::load(args.config.as_deref(), &args.overrides())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx);

    info!("Relayer is running. Press Ctrl+C to stop.");
    wiring::run(settings, shutdown_rx).await
}

/// Flip the shutdown flag on Ctrl+C (and SIGTERM on unix).
fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        if shutdown_tx.send(true).is_err() {
            warn!("Scan loop already stopped");
        }
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        // Holding the sender keeps the loop alive; dropping it would stop it
        error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
