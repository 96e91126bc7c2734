//! Ledger library crate.
//!
//! This crate provides the building blocks of a small hash-linked ledger
//! replicated across nodes:
//!
//! - strongly-typed domain types (`types`) and signing (`crypto`),
//! - the pending transaction pool (`mempool`),
//! - confirmed balances (`balance`),
//! - the append-only chain (`chain`) and its integrity checks (`validation`),
//! - proof-of-work / proof-of-stake finalization and fork choice (`consensus`),
//! - snapshot persistence (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - the replica itself (`node`),
//! - and a top-level node configuration (`config`).

pub mod balance;
pub mod chain;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod mempool;
pub mod metrics;
pub mod node;
pub mod storage;
pub mod types;
pub mod validation;

// Re-export top-level configuration types.
pub use config::{ConfigError, LedgerConfig, StorageConfig};

// Re-export "core" consensus types and traits.
pub use consensus::{
    BlockValidator, ChainError, ConsensusConfig, ConsensusEngine, ConsensusError,
    FinalizationPolicy, ForkChoice, IntegrityCheck, LedgerState, LongestChainForkChoice,
    PolicyConfig, ProofOfStake, ProofOfWork, Proposer, RegistryError, RejectReason, Replacement,
    TxPool, ValidationError, ValidatorEntry, ValidatorRegistry,
};

pub use balance::BalanceLedger;
pub use chain::ChainStore;
pub use crypto::{Keypair, Signer};
pub use mempool::{Eviction, Mempool};
pub use node::{Durability, FinalizeOutcome, Node, NodeError, PeerSource, ReconcileOutcome};
pub use validation::BaseValidity;

// Re-export storage backends.
pub use storage::{InMemorySnapshotStore, JsonFileSnapshotStore, SnapshotStore, StorageError};

// Re-export metrics registry and ledger metrics.
pub use metrics::{LedgerMetrics, MetricsRegistry};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default fork-choice rule.
pub type DefaultForkChoice = LongestChainForkChoice;

/// Snapshot store chosen at runtime from [`StorageConfig`].
pub type DynSnapshotStore = Box<dyn SnapshotStore>;

/// Opens the store described by `cfg`: a JSON file, or memory only.
pub fn snapshot_store(cfg: &StorageConfig) -> DynSnapshotStore {
    if cfg.enabled {
        Box::new(JsonFileSnapshotStore::new(cfg.path.clone()))
    } else {
        Box::new(InMemorySnapshotStore::new())
    }
}
