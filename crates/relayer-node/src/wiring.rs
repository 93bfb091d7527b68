//! # Wiring
//!
//! Builds the production adapters from [`NodeSettings`] and hands them to
//! the scan coordinator. Alerts go to the console channel.

use crate::config::{NodeSettings, StorageBackend};
use anyhow::{Context, Result};
use relayer_core::{
    AlertRouter, CursorStore, FileCursorStore, HttpDispatchTransport, JsonRpcLedgerClient,
    JsonlDeadLetterLog, RelayerConfig, RunExit, ScanCoordinator,
};
use std::fs;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Build every component and run the loop until shutdown or fault.
///
/// # Errors
///
/// Startup failures only: adapters that cannot be built, a locked or
/// unreadable cursor store, a source that never answers the first height
/// query. Once the loop runs, the outcome is the returned [`RunExit`]. A
/// shutdown while the first height query is still retrying is
/// [`RunExit::Terminated`].
pub async fn run(settings: NodeSettings, shutdown: watch::Receiver<bool>) -> Result<RunExit> {
    let config = settings.relayer.clone();

    if config.contract_address == [0u8; 20] {
        warn!("Bridge contract address is the zero address; set BRIDGE_CONTRACT_ADDRESS");
    }
    info!("Source RPC: {}", config.source_endpoint);
    info!("Destination: {}", config.destination_endpoint);
    info!("Data Dir: {:?}", settings.data_dir);

    fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("cannot create data dir {}", settings.data_dir.display()))?;

    let ledger = Arc::new(
        JsonRpcLedgerClient::new(config.source_endpoint.clone(), config.rpc_timeout)
            .context("Failed to build ledger client")?,
    );
    let transport = Arc::new(
        HttpDispatchTransport::new(config.destination_endpoint.clone(), config.dispatch_timeout)
            .context("Failed to build dispatch transport")?,
    );
    let dead_letters = Arc::new(
        JsonlDeadLetterLog::open(settings.dead_letter_path())
            .context("Failed to open dead-letter log")?,
    );
    info!("Dead letters: {}", dead_letters.path().display());

    match settings.storage {
        StorageBackend::File => {
            let store = Arc::new(
                FileCursorStore::open(&settings.data_dir).context("Failed to open cursor store")?,
            );
            run_with_store(config, ledger, transport, store, dead_letters, shutdown).await
        }
        StorageBackend::Rocksdb => {
            run_rocksdb(&settings, config, ledger, transport, dead_letters, shutdown).await
        }
    }
}

#[cfg(feature = "rocksdb")]
async fn run_rocksdb(
    settings: &NodeSettings,
    config: RelayerConfig,
    ledger: Arc<JsonRpcLedgerClient>,
    transport: Arc<HttpDispatchTransport>,
    dead_letters: Arc<JsonlDeadLetterLog>,
    shutdown: watch::Receiver<bool>,
) -> Result<RunExit> {
    let path = settings.data_dir.join("cursor.rocksdb");
    let store = Arc::new(
        relayer_core::RocksDbCursorStore::open(&path)
            .context("Failed to open RocksDB cursor store")?,
    );
    run_with_store(config, ledger, transport, store, dead_letters, shutdown).await
}

#[cfg(not(feature = "rocksdb"))]
async fn run_rocksdb(
    _settings: &NodeSettings,
    _config: RelayerConfig,
    _ledger: Arc<JsonRpcLedgerClient>,
    _transport: Arc<HttpDispatchTransport>,
    _dead_letters: Arc<JsonlDeadLetterLog>,
    _shutdown: watch::Receiver<bool>,
) -> Result<RunExit> {
    anyhow::bail!("storage backend \"rocksdb\" requires building with --features rocksdb")
}

async fn run_with_store<C: CursorStore + 'static>(
    config: RelayerConfig,
    ledger: Arc<JsonRpcLedgerClient>,
    transport: Arc<HttpDispatchTransport>,
    store: Arc<C>,
    dead_letters: Arc<JsonlDeadLetterLog>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunExit> {
    let bootstrapped = ScanCoordinator::bootstrap_with_shutdown(
        config,
        ledger,
        transport,
        store,
        dead_letters,
        &mut shutdown,
    )
    .await
    .context("Failed to determine the starting cursor")?;

    let Some(coordinator) = bootstrapped else {
        info!("Shutdown before the first scan cycle");
        return Ok(RunExit::Terminated);
    };

    let mut coordinator = coordinator.with_alerts(Arc::new(AlertRouter::with_console()));
    Ok(coordinator.run(shutdown).await)
}
