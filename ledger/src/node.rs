//! A ledger replica.
//!
//! [`Node`] wires the consensus engine to its state and is the only thing
//! that mutates it. Chain, mempool and balance cache sit behind one
//! `RwLock` and change together; the validator registry has its own lock.
//! Where both are needed the registry is locked first.
//!
//! Proof-of-work search runs without holding any lock. A block found that
//! way is only appended if the tip it was built on is still the tip.
//! Reconciliation that replaces the chain cancels every search in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balance::rescan;
use crate::chain::ChainStore;
use crate::consensus::engine::{LedgerState, Replacement};
use crate::consensus::error::{ConsensusError, RegistryError, RejectReason};
use crate::consensus::registry::{ValidatorEntry, ValidatorRegistry};
use crate::consensus::{ConsensusConfig, ConsensusEngine, FinalizationPolicy, ProofOfStake};
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::storage::{SnapshotStore, StorageError};
use crate::types::{Amount, Balance, Block, BlockHash, Identity, Transaction, TxId, now_millis};

/// Unrecoverable node setup failure.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to initialise metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Whether the state change that produced an outcome reached the snapshot.
#[derive(Debug)]
pub enum Durability {
    Persisted,
    /// Applied in memory, but saving the snapshot failed.
    InMemoryOnly(StorageError),
}

impl Durability {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Durability::Persisted)
    }
}

/// A block this node finalized.
#[derive(Debug)]
pub struct FinalizeOutcome {
    pub block: Block,
    pub durability: Durability,
}

/// Result of comparing the local chain with peer chains.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The local chain stays; `len` is its block count.
    Kept { len: usize },
    Replaced {
        replacement: Replacement,
        durability: Durability,
    },
}

impl ReconcileOutcome {
    pub fn replaced(&self) -> bool {
        matches!(self, ReconcileOutcome::Replaced { .. })
    }
}

/// Where peer chains come from.
///
/// Transport is not this crate's concern; anything that can hand over the
/// block lists of other replicas can feed [`Node::reconcile_from`].
pub trait PeerSource {
    fn peer_chains(&self) -> Vec<Vec<Block>>;
}

impl<S: SnapshotStore> PeerSource for Node<S> {
    fn peer_chains(&self) -> Vec<Vec<Block>> {
        vec![self.chain()]
    }
}

impl<T: PeerSource + ?Sized> PeerSource for Arc<T> {
    fn peer_chains(&self) -> Vec<Vec<Block>> {
        (**self).peer_chains()
    }
}

impl<T: PeerSource> PeerSource for [T] {
    fn peer_chains(&self) -> Vec<Vec<Block>> {
        self.iter().flat_map(PeerSource::peer_chains).collect()
    }
}

/// Cancellation tokens of the proof-of-work searches currently running.
#[derive(Default)]
struct InFlight {
    next_id: u64,
    tokens: HashMap<u64, CancellationToken>,
}

/// Unregisters a search when it ends, however it ends.
struct Attempt<'a> {
    in_flight: &'a Mutex<InFlight>,
    id: u64,
    token: CancellationToken,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().tokens.remove(&self.id);
    }
}

/// One ledger replica.
pub struct Node<S> {
    engine: ConsensusEngine,
    state: RwLock<LedgerState>,
    registry: RwLock<ValidatorRegistry>,
    store: S,
    in_flight: Mutex<InFlight>,
    metrics: Arc<MetricsRegistry>,
}

impl<S: SnapshotStore> Node<S> {
    /// Opens a node with its own metrics registry.
    ///
    /// The chain is restored from `store` when it holds a valid snapshot
    /// with the configured genesis; otherwise the node starts from genesis.
    pub fn open(config: ConsensusConfig, store: S) -> Result<Self, NodeError> {
        let metrics = Arc::new(MetricsRegistry::new()?);
        Ok(Self::with_metrics(config, store, metrics))
    }

    /// Same as [`Node::open`] with a caller-supplied metrics registry.
    pub fn with_metrics(config: ConsensusConfig, store: S, metrics: Arc<MetricsRegistry>) -> Self {
        let engine = ConsensusEngine::from_config(config);
        let chain = restore(&engine, &store, &metrics);
        let registry = ValidatorRegistry::new(engine.config().minimum_stake);
        metrics.ledger.observe_sizes(0, chain.len());

        info!(
            policy = engine.policy().name(),
            len = chain.len(),
            tip = %chain.tip().hash,
            "node opened"
        );

        Self {
            state: RwLock::new(LedgerState::from_chain(chain)),
            registry: RwLock::new(registry),
            engine,
            store,
            in_flight: Mutex::new(InFlight::default()),
            metrics,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        self.engine.config()
    }

    pub fn policy(&self) -> &FinalizationPolicy {
        self.engine.policy()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    // ---------------------------
    // Transactions and balances
    // ---------------------------

    /// Runs the admission checks and, if they pass, queues `tx`.
    pub fn submit(&self, tx: Transaction) -> Result<TxId, RejectReason> {
        let from = tx.from.clone();
        let amount = tx.amount;

        let result = Mempool::precheck(&tx, self.config().minimum_fee).and_then(|_| {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let admitted = state.mempool.admit(tx, &state.balances);
            self.metrics
                .ledger
                .observe_sizes(state.mempool.len(), state.chain.len());
            admitted
        });

        let sender = from.as_ref().map_or("reward", Identity::short);
        match &result {
            Ok(id) => {
                self.metrics.ledger.tx_accepted_total.inc();
                info!(tx = %id, from = sender, amount = %amount, "transaction accepted");
            }
            Err(reason) => {
                self.metrics
                    .ledger
                    .tx_rejected_total
                    .with_label_values(&[reason.label()])
                    .inc();
                info!(from = sender, reason = reason.label(), error = %reason, "transaction rejected");
            }
        }
        result
    }

    /// Confirmed balance from the cache.
    pub fn balance(&self, identity: &Identity) -> Balance {
        self.state.read().balances.balance(identity)
    }

    /// Confirmed balance by replaying the whole chain.
    pub fn rescan_balance(&self, identity: &Identity) -> Balance {
        rescan(self.state.read().chain.blocks(), identity)
    }

    /// Confirmed balance minus what pending transactions already spend.
    pub fn spendable(&self, identity: &Identity) -> Balance {
        let state = self.state.read();
        state.mempool.spendable(identity, &state.balances, None)
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.state.read().mempool.transactions().cloned().collect()
    }

    // ---------------------------
    // Chain queries
    // ---------------------------

    /// Copy of the whole chain.
    pub fn chain(&self) -> Vec<Block> {
        self.state.read().chain.blocks().to_vec()
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.state.read().chain.len()
    }

    /// Always `false`; the chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.state.read().chain.tip().hash
    }

    /// Whole-chain integrity check.
    pub fn is_valid(&self) -> bool {
        let valid = self.state.read().chain.is_valid();
        if !valid {
            self.metrics.ledger.validation_failures_total.inc();
        }
        valid
    }

    // ---------------------------
    // Validators
    // ---------------------------

    pub fn register_validator(&self, identity: Identity, stake: Amount) -> Result<(), RegistryError> {
        self.registry.write().register(identity, stake)
    }

    pub fn top_up_stake(&self, identity: &Identity, amount: Amount) -> Result<Amount, RegistryError> {
        self.registry.write().top_up(identity, amount)
    }

    pub fn deregister_validator(&self, identity: &Identity) -> Option<ValidatorEntry> {
        self.registry.write().deregister(identity)
    }

    pub fn validators(&self) -> Vec<ValidatorEntry> {
        self.registry.read().entries().to_vec()
    }

    /// Stake-weighted draw; `None` when no validator is registered.
    pub fn select_validator<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Identity> {
        ProofOfStake::new()
            .select_validator(&self.registry.read(), rng)
            .map(|entry| entry.identity.clone())
    }

    // ---------------------------
    // Finalization
    // ---------------------------

    /// Turns pending transactions into the next block for `beneficiary`.
    ///
    /// Under proof of work this blocks until a nonce is found, `cancel`
    /// fires, or a chain replacement supersedes the search. Under proof of
    /// stake `beneficiary` must be a registered validator.
    pub fn finalize(
        &self,
        beneficiary: &Identity,
        cancel: &CancellationToken,
    ) -> Result<FinalizeOutcome, ConsensusError> {
        if self.policy().is_stake() {
            self.finalize_by_stake(beneficiary, cancel)
        } else {
            self.finalize_by_work(beneficiary, cancel)
        }
    }

    /// Stake path: `validator` finalizes the pending transactions.
    pub fn validate_pending(&self, validator: &Identity) -> Result<FinalizeOutcome, ConsensusError> {
        if !self.policy().is_stake() {
            return Err(ConsensusError::WrongPolicy);
        }
        self.finalize(validator, &CancellationToken::new())
    }

    /// Stake path with the validator drawn by stake weight.
    ///
    /// `Ok(None)` when no validator is registered; nothing changes then.
    pub fn finalize_selected<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<FinalizeOutcome>, ConsensusError> {
        if !self.policy().is_stake() {
            return Err(ConsensusError::WrongPolicy);
        }
        match self.select_validator(rng) {
            Some(validator) => self.validate_pending(&validator).map(Some),
            None => {
                debug!("no validators registered; finalization deferred");
                Ok(None)
            }
        }
    }

    /// Runs [`Node::finalize`] on the blocking pool.
    pub async fn mine_pending(
        self: Arc<Self>,
        beneficiary: Identity,
        cancel: CancellationToken,
    ) -> Result<FinalizeOutcome, ConsensusError>
    where
        S: 'static,
    {
        let task = tokio::task::spawn_blocking(move || self.finalize(&beneficiary, &cancel));
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ConsensusError::Cancelled),
        }
    }

    /// Number of proof-of-work searches currently running.
    pub fn mining_in_flight(&self) -> usize {
        self.in_flight.lock().tokens.len()
    }

    // ---------------------------
    // Reconciliation
    // ---------------------------

    /// Adopts the longest valid chain among the local one and `peers`.
    ///
    /// Peer lists that are not even shaped like a chain are skipped. The
    /// chain is replaced as a whole or not at all.
    pub fn reconcile(&self, peers: Vec<Vec<Block>>) -> ReconcileOutcome {
        let candidates: Vec<ChainStore> = peers
            .into_iter()
            .filter_map(|blocks| {
                ChainStore::from_blocks(blocks)
                    .map_err(|e| debug!(error = %e, "ignoring malformed peer chain"))
                    .ok()
            })
            .collect();

        let mut state = self.state.write();
        let from_len = state.chain.len();
        let Some(replacement) = self.engine.reconcile(&mut state, candidates) else {
            return ReconcileOutcome::Kept { len: from_len };
        };

        let cancelled = self.cancel_mining();
        self.metrics.ledger.chain_replacements_total.inc();
        info!(
            from_len,
            to_len = replacement.new_len,
            cancelled,
            "chain replaced"
        );

        let durability = self.persist(state.chain.blocks());
        self.metrics
            .ledger
            .observe_sizes(state.mempool.len(), state.chain.len());
        ReconcileOutcome::Replaced {
            replacement,
            durability,
        }
    }

    /// [`Node::reconcile`] over whatever `source` provides.
    pub fn reconcile_from<P: PeerSource + ?Sized>(&self, source: &P) -> ReconcileOutcome {
        self.reconcile(source.peer_chains())
    }

    // ---------------------------
    // Internals
    // ---------------------------

    /// Stamping is instant, so the whole step runs under both locks.
    fn finalize_by_stake(
        &self,
        validator: &Identity,
        cancel: &CancellationToken,
    ) -> Result<FinalizeOutcome, ConsensusError> {
        let started = Instant::now();
        let registry = self.registry.read();
        let mut state = self.state.write();
        let block =
            self.engine
                .propose_block(&mut state, &registry, validator, now_millis(), cancel);
        self.metrics
            .ledger
            .mining_seconds
            .observe(started.elapsed().as_secs_f64());
        Ok(self.settled(&state, block?))
    }

    /// Searches without a lock, then commits if the tip has not moved.
    fn finalize_by_work(
        &self,
        miner: &Identity,
        cancel: &CancellationToken,
    ) -> Result<FinalizeOutcome, ConsensusError> {
        let started = Instant::now();
        let mined = {
            let attempt = self.start_attempt(cancel);
            let candidate = {
                let state = self.state.read();
                self.engine.build_candidate(&state, miner, now_millis())
            };
            debug!(
                index = candidate.index,
                txs = candidate.transactions.len(),
                "mining candidate"
            );
            self.engine
                .finalize_candidate(candidate, miner, &attempt.token)
        };
        self.metrics
            .ledger
            .mining_seconds
            .observe(started.elapsed().as_secs_f64());

        let mut state = self.state.write();
        let block = self.engine.commit(&mut state, mined?, miner)?;
        Ok(self.settled(&state, block))
    }

    fn settled(&self, state: &LedgerState, block: Block) -> FinalizeOutcome {
        self.metrics.ledger.blocks_finalized_total.inc();
        self.metrics
            .ledger
            .observe_sizes(state.mempool.len(), state.chain.len());
        let durability = self.persist(state.chain.blocks());
        FinalizeOutcome { block, durability }
    }

    fn persist(&self, blocks: &[Block]) -> Durability {
        match self.store.save(blocks) {
            Ok(()) => Durability::Persisted,
            Err(e) => {
                warn!(error = %e, len = blocks.len(), "snapshot save failed; state is in memory only");
                Durability::InMemoryOnly(e)
            }
        }
    }

    fn start_attempt(&self, cancel: &CancellationToken) -> Attempt<'_> {
        let token = cancel.child_token();
        let mut in_flight = self.in_flight.lock();
        let id = in_flight.next_id;
        in_flight.next_id += 1;
        in_flight.tokens.insert(id, token.clone());
        Attempt {
            in_flight: &self.in_flight,
            id,
            token,
        }
    }

    fn cancel_mining(&self) -> usize {
        let in_flight = self.in_flight.lock();
        for token in in_flight.tokens.values() {
            token.cancel();
        }
        in_flight.tokens.len()
    }
}

/// Chain from the snapshot, or genesis when there is no usable snapshot.
fn restore<S: SnapshotStore>(
    engine: &ConsensusEngine,
    store: &S,
    metrics: &MetricsRegistry,
) -> ChainStore {
    let genesis = engine.genesis_state().chain;

    let blocks = match store.load() {
        Ok(Some(blocks)) => blocks,
        Ok(None) => {
            info!("no snapshot found; starting from genesis");
            return genesis;
        }
        Err(e) => {
            warn!(error = %e, "snapshot unreadable; starting from genesis");
            return genesis;
        }
    };

    match ChainStore::from_blocks(blocks) {
        Ok(chain) if chain.genesis().hash != genesis.genesis().hash => {
            warn!(
                found = %chain.genesis().hash,
                expected = %genesis.genesis().hash,
                "snapshot has a different genesis; starting from genesis"
            );
        }
        Ok(chain) if chain.is_valid() => {
            info!(len = chain.len(), "chain restored from snapshot");
            return chain;
        }
        Ok(_) => {
            metrics.ledger.validation_failures_total.inc();
            warn!("snapshot failed validation; starting from genesis");
        }
        Err(e) => warn!(error = %e, "snapshot is not a chain; starting from genesis"),
    }
    genesis
}
