//! # Ledger Node Runtime
//!
//! The main entry point for a single-ledger node running unilateral
//! consensus.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration from `UL_*` environment variables
//! 3. Wire stores, commit engine and ledger bus
//! 4. Create the genesis block (if not exists)
//! 5. Recover events left pending by an interrupted run
//! 6. Start the block watcher and submit demo operations, if any
//! 7. Run until Ctrl+C

use anyhow::{Context, Result};
use serde_json::json;
use shared_bus::{EventFilter, EventTopic, Subscription};
use shared_types::Operation;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{LedgerNode, NodeConfig};

/// Log every `BlockAdded` until shutdown.
fn spawn_block_watcher(
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                added = subscription.recv_block_added() => match added {
                    Some(added) => info!(
                        block_height = added.block_height,
                        block_hash = %added.block_hash,
                        "Block added"
                    ),
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
    })
}

async fn submit_demo_operations(node: &LedgerNode, count: usize) {
    for n in 0..count {
        let operation = Operation::new(
            "Create",
            json!({ "id": format!("urn:demo:{n}"), "sequence": n }),
        );
        match node.submit(operation).await {
            Ok(receipt) => info!(
                event_hash = %receipt.event_hash,
                block_height = receipt.block_height,
                "Demo operation committed"
            ),
            Err(e) => warn!("Demo operation {} failed: {:#}", n, e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    info!("===========================================");
    info!("  Ledger Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Consensus: {}", shared_types::UNILATERAL_CONSENSUS_METHOD);
    info!("===========================================");

    let config = NodeConfig::from_env().context("Invalid node configuration")?;
    info!("Ledger: {}", config.ledger.ledger_id);

    let node = LedgerNode::new(config).context("Failed to wire ledger node")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = spawn_block_watcher(
        node.subscribe(EventFilter::topics(vec![EventTopic::Chain])),
        shutdown_rx,
    );

    let startup = node.start().await.context("Failed to start ledger node")?;
    if let Some(genesis) = &startup.genesis {
        info!("Genesis block: {}", genesis.block_hash);
    }

    let demo_operations = node.config().demo_operations;
    if demo_operations > 0 {
        submit_demo_operations(&node, demo_operations).await;
    }

    info!(
        chain_length = node.chain_length(),
        "Node is running. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = watcher.await {
        error!("Block watcher terminated abnormally: {}", e);
    }

    Ok(())
}
