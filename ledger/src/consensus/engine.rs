//! High-level consensus engine orchestration.
//!
//! The consensus engine wires together:
//!
//! - a [`FinalizationPolicy`] (proof of work or proof of stake),
//! - a [`ForkChoice`] implementation for reconciling replicas, and
//! - a [`Proposer`] for block construction.
//!
//! It operates on a [`LedgerState`] handed in by the caller, which owns
//! locking. Finalization is split into three steps so that the expensive
//! middle one can run without holding any lock:
//!
//! 1. [`ConsensusEngine::build_candidate`] snapshots pending transactions
//!    into a block on top of the tip,
//! 2. [`ConsensusEngine::finalize_candidate`] mines or stamps it,
//! 3. [`ConsensusEngine::commit`] appends it, provided the tip has not
//!    moved in the meantime, and settles balances and the mempool.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balance::BalanceLedger;
use crate::chain::ChainStore;
use crate::mempool::{Eviction, Mempool};
use crate::types::{Block, Identity, Transaction};

use super::config::ConsensusConfig;
use super::error::ConsensusError;
use super::fork_choice::{Choice, ForkChoice, LongestChainForkChoice};
use super::policy::FinalizationPolicy;
use super::proposer::{Proposer, TxPool};
use super::registry::ValidatorRegistry;

/// Chain, mempool and balance cache, mutated together.
#[derive(Clone, Debug)]
pub struct LedgerState {
    pub chain: ChainStore,
    pub mempool: Mempool,
    pub balances: BalanceLedger,
}

impl LedgerState {
    /// State holding `chain` with a rebuilt balance cache and an empty mempool.
    pub fn from_chain(chain: ChainStore) -> Self {
        let balances = BalanceLedger::from_blocks(chain.blocks());
        Self {
            chain,
            mempool: Mempool::new(),
            balances,
        }
    }

    /// Replaces the chain wholesale.
    ///
    /// The balance cache is rebuilt, pending transactions that the new
    /// chain already confirms are dropped, and the rest of the mempool is
    /// re-admitted against the new balances.
    pub fn adopt(&mut self, chain: ChainStore) -> Replacement {
        let previous_len = self.chain.len();
        let confirmed = chain.confirmed_tx_ids();
        self.balances.rebuild(chain.blocks());
        self.chain = chain;
        let purged = self.mempool.remove_ids(&confirmed);

        let evicted = self.mempool.revalidate(&self.balances);
        for eviction in &evicted {
            match eviction {
                Eviction::OrphanedReward(id) => {
                    debug!(tx = %id, "dropping reward of an orphaned block")
                }
                Eviction::Rejected(id, reason) => {
                    warn!(
                        tx = %id,
                        reason = reason.label(),
                        error = %reason,
                        "pending transaction no longer admissible"
                    )
                }
            }
        }

        Replacement {
            previous_len,
            new_len: self.chain.len(),
            purged,
            evicted: evicted.len(),
        }
    }
}

/// Summary of a chain replacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub previous_len: usize,
    pub new_len: usize,
    /// Pending transactions dropped because the new chain confirms them.
    pub purged: usize,
    /// Pending transactions dropped because they no longer fit the new
    /// chain: rewards of orphaned blocks and transfers it cannot fund.
    pub evicted: usize,
}

/// Fully-configurable consensus engine.
///
/// Generic over the fork-choice rule `F`.
#[derive(Clone, Debug)]
pub struct ConsensusEngine<F = LongestChainForkChoice> {
    config: ConsensusConfig,
    policy: FinalizationPolicy,
    proposer: Proposer,
    fork_choice: F,
}

impl ConsensusEngine<LongestChainForkChoice> {
    /// Engine with the longest-valid-chain rule.
    pub fn from_config(config: ConsensusConfig) -> Self {
        Self::new(config, LongestChainForkChoice)
    }
}

impl<F> ConsensusEngine<F>
where
    F: ForkChoice,
{
    /// Creates a new consensus engine.
    pub fn new(config: ConsensusConfig, fork_choice: F) -> Self {
        let policy = FinalizationPolicy::from_config(&config.policy);
        let proposer = Proposer::from_config(&config);
        Self {
            config,
            policy,
            proposer,
            fork_choice,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn policy(&self) -> &FinalizationPolicy {
        &self.policy
    }

    /// Fresh state holding only the configured genesis block.
    pub fn genesis_state(&self) -> LedgerState {
        LedgerState::from_chain(ChainStore::new(self.config.genesis_timestamp_ms))
    }

    /// Reward transaction minted to the finalizer of a block sealed at `timestamp`.
    pub fn reward_for(&self, beneficiary: &Identity, timestamp: u64) -> Transaction {
        Transaction::reward(beneficiary.clone(), self.config.block_reward, timestamp)
    }

    /// See [`FinalizationPolicy::authorize`].
    pub fn authorize(
        &self,
        registry: &ValidatorRegistry,
        beneficiary: &Identity,
    ) -> Result<(), ConsensusError> {
        self.policy.authorize(registry, beneficiary)
    }

    /// Step 1: candidate block on top of the tip with pending transactions.
    pub fn build_candidate(
        &self,
        state: &LedgerState,
        beneficiary: &Identity,
        timestamp: u64,
    ) -> Block {
        self.proposer.build_block(
            &state.chain,
            &state.mempool,
            self.policy.placeholder(beneficiary),
            timestamp,
        )
    }

    /// Step 2: mine or stamp the candidate. Needs no ledger state.
    pub fn finalize_candidate(
        &self,
        candidate: Block,
        beneficiary: &Identity,
        cancel: &CancellationToken,
    ) -> Result<Block, ConsensusError> {
        self.policy.propose(candidate, beneficiary, cancel)
    }

    /// Step 3: append a finalized block and settle the ledger.
    ///
    /// Fails with [`ConsensusError::Stale`] if the chain moved since the
    /// candidate was built. On success, balances absorb the block, exactly
    /// the included transactions leave the mempool, and a reward for
    /// `beneficiary` is queued for the next block.
    pub fn commit(
        &self,
        state: &mut LedgerState,
        block: Block,
        beneficiary: &Identity,
    ) -> Result<Block, ConsensusError> {
        let tip = state.chain.tip();
        if block.index != state.chain.next_index() || block.previous_hash != tip.hash {
            debug!(
                index = block.index,
                tip = tip.index,
                "candidate no longer extends the tip"
            );
            return Err(ConsensusError::Stale {
                height: block.index,
            });
        }

        let block = state.chain.append(block)?.clone();
        state.balances.apply_block(&block);
        let removed = state.mempool.remove_included(&block.transactions);
        state.mempool.seed(self.reward_for(beneficiary, block.timestamp));

        info!(
            index = block.index,
            hash = %block.hash,
            txs = block.transactions.len(),
            removed,
            finalizer = %block.finalizer,
            "block finalized"
        );
        Ok(block)
    }

    /// All three steps at once, under whatever lock guards `state`.
    pub fn propose_block(
        &self,
        state: &mut LedgerState,
        registry: &ValidatorRegistry,
        beneficiary: &Identity,
        timestamp: u64,
        cancel: &CancellationToken,
    ) -> Result<Block, ConsensusError> {
        self.authorize(registry, beneficiary)?;
        let candidate = self.build_candidate(state, beneficiary, timestamp);
        let block = self.finalize_candidate(candidate, beneficiary, cancel)?;
        self.commit(state, block, beneficiary)
    }

    /// Applies the fork-choice rule; adopts the winner if it is not local.
    pub fn reconcile(
        &self,
        state: &mut LedgerState,
        candidates: Vec<ChainStore>,
    ) -> Option<Replacement> {
        let Choice::Candidate(i) = self.fork_choice.choose(&state.chain, &candidates) else {
            debug!(len = state.chain.len(), "local chain kept");
            return None;
        };

        let chosen = candidates.into_iter().nth(i)?;
        let replacement = state.adopt(chosen);

        info!(
            previous_len = replacement.previous_len,
            new_len = replacement.new_len,
            purged = replacement.purged,
            evicted = replacement.evicted,
            "chain replaced by longer valid chain"
        );
        Some(replacement)
    }
}
