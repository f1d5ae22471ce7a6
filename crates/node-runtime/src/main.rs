//! # DeStream Node Runtime
//!
//! Starts the consensus engine with in-memory collaborators and feeds it
//! from the inbound queue until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize logging
//! 3. Open storage at the configured genesis
//! 4. Build the engine and start the inbound worker
//! 5. Wait for shutdown

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ds_consensus::adapters::{HashTargetVerifier, InMemoryKVStore, InMemoryPeerManager, KvChainStorage, NoDeploymentRules};
use ds_consensus::{ConsensusApi, ConsensusDependencies, ConsensusEngine};
use node_runtime::{InboundWorker, NodeConfig};
use shared_types::short_hash;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("===========================================");
    info!("  DeStream Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Network: {}", config.consensus.network.name);
    info!("===========================================");

    let genesis = config.consensus.network.genesis_hash();
    let storage = KvChainStorage::new(InMemoryKVStore::new(), genesis)
        .context("Failed to open chain storage")?;

    let engine = Arc::new(ConsensusEngine::new(ConsensusDependencies {
        storage: Arc::new(storage),
        peers: Arc::new(InMemoryPeerManager::new()),
        proof: Arc::new(HashTargetVerifier),
        rules: Arc::new(NoDeploymentRules),
        config: config.consensus.clone(),
    }));

    let tip = engine.get_tip();
    info!(height = tip.height(), tip = %short_hash(&tip.hash()), "Active chain loaded");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (worker, _handle) = InboundWorker::new(Arc::clone(&engine), config.inbound_queue);
    let worker_task = tokio::spawn(worker.run(shutdown_rx));

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    if shutdown_tx.send(true).is_err() {
        warn!("Inbound worker already stopped");
    }
    let handled = worker_task.await.context("Inbound worker panicked")?;

    let tip = engine.get_tip();
    info!(
        handled,
        height = tip.height(),
        tip = %short_hash(&tip.hash()),
        "Shutdown complete"
    );
    Ok(())
}
