//! Block proposal logic.
//!
//! The proposer assembles an unsealed candidate block on top of the current
//! tip from a view of the chain and a transaction pool. Finalization (nonce
//! search or validator stamp) happens afterwards in the policy.

use crate::chain::ChainStore;
use crate::types::{Block, Finalizer, Transaction};

use super::config::ConsensusConfig;

/// Abstract transaction pool interface.
///
/// Consensus does not care how transactions are admitted or stored; it
/// needs a way to look at a batch that fits into a block and, once that
/// block is committed, to drop exactly that batch.
pub trait TxPool {
    /// Returns up to `max_txs` pending transactions in admission order,
    /// without removing them.
    fn select_for_block(&self, max_txs: usize) -> Vec<Transaction>;

    /// Removes the given transactions, returning how many were pending.
    fn remove_included(&mut self, included: &[Transaction]) -> usize;
}

/// Configurable block proposer.
///
/// This struct is deliberately stateless with respect to the chain; it
/// uses a [`ChainStore`] and [`TxPool`] provided at call time.
#[derive(Clone, Debug)]
pub struct Proposer {
    pub max_block_txs: usize,
}

impl Proposer {
    /// Constructs a proposer from a [`ConsensusConfig`].
    pub fn from_config(cfg: &ConsensusConfig) -> Self {
        Self {
            max_block_txs: cfg.max_block_txs,
        }
    }

    /// Builds a candidate block on top of the current tip.
    ///
    /// The candidate is sealed with `finalizer` as a placeholder; the
    /// policy replaces it before the block is committed.
    pub fn build_block<P>(
        &self,
        chain: &ChainStore,
        tx_pool: &P,
        finalizer: Finalizer,
        timestamp: u64,
    ) -> Block
    where
        P: TxPool + ?Sized,
    {
        let tip = chain.tip();
        let txs = tx_pool.select_for_block(self.max_block_txs);
        Block::new(tip.index + 1, timestamp, txs, tip.hash, finalizer)
    }
}
