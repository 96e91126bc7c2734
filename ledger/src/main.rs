// src/main.rs
//
// Minimal demo node that wires up the ledger library:
//
// - JSON snapshot storage (or memory only, per config)
// - Proof-of-work or proof-of-stake finalization, per config
// - Structured logs through tracing (RUST_LOG, default `ledger=info`)
// - Loop that finalizes a block every `block_time_secs` and, once the
//   local miner has confirmed funds, pays a second identity.
//
// Usage: `ledger [config.json]`. Ctrl-C stops the loop and prints metrics.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ledger::{
    Amount, ConsensusError, Keypair, LedgerConfig, Node, Signer, Transaction, now_millis,
    snapshot_store,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ledger=info")),
        )
        .init();

    if let Err(err) = run_node().await {
        error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::load(&path).map_err(|e| e.to_string())?,
        None => LedgerConfig::default(),
    };

    // ---------------------------
    // Node + storage
    // ---------------------------

    let store = snapshot_store(&cfg.storage);
    let node = Arc::new(
        Node::open(cfg.consensus.clone(), store).map_err(|e| format!("failed to open node: {e}"))?,
    );

    // ---------------------------
    // Identities (demo)
    // ---------------------------

    // Fresh keys every run; a real deployment would load them.
    let miner = Keypair::generate();
    let payee = Keypair::generate();

    if node.policy().is_stake() {
        node.register_validator(miner.identity(), cfg.consensus.minimum_stake)
            .map_err(|e| format!("failed to register demo validator: {e}"))?;
    }

    let block_interval = Duration::from_secs(cfg.consensus.block_time_secs.max(1));
    info!(
        policy = node.policy().name(),
        miner = miner.identity().short(),
        interval_secs = block_interval.as_secs(),
        "starting node"
    );

    // ---------------------------
    // Main finalization loop
    // ---------------------------

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        });
    }

    let mut paid = false;
    let mut ticker = tokio::time::interval(block_interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !paid && node.balance(&miner.identity()).at_least(Amount::coins(2)) {
            let tx = Transaction::transfer(
                &miner,
                payee.identity(),
                Amount::coins(1),
                cfg.consensus.minimum_fee,
                None,
                now_millis(),
            );
            match node.submit(tx) {
                Ok(_) => paid = true,
                Err(reason) => warn!(%reason, "demo transfer refused"),
            }
        }

        let mining = node
            .clone()
            .mine_pending(miner.identity(), shutdown.child_token());
        match mining.await {
            Ok(outcome) => {
                if !outcome.durability.is_persisted() {
                    warn!(index = outcome.block.index, "block not persisted");
                }
                info!(
                    index = outcome.block.index,
                    miner_balance = %node.balance(&miner.identity()),
                    payee_balance = %node.balance(&payee.identity()),
                    "tick"
                );
            }
            Err(ConsensusError::Cancelled) if shutdown.is_cancelled() => break,
            Err(e) => warn!(error = %e, "finalization failed"),
        }
    }

    println!("{}", node.metrics().gather_text());
    Ok(())
}
