//! Mempool: unconfirmed transactions awaiting inclusion.
//!
//! Admission runs the checks below in order; the first failure wins.
//!
//! 1. signature over the content digest verifies against `from`,
//! 2. positive amount and, for non-reward transactions, fee at least the
//!    configured minimum,
//! 3. the sender's spendable balance covers `amount + fee`,
//! 4. the contract predicate (if any) accepts the spendable balance,
//! 5. no pending transaction has the same digest.
//!
//! Checks 1 and 2 only look at the transaction and are exposed separately
//! as [`Mempool::precheck`], so callers can run them outside whatever lock
//! guards the pool. Checks 3 to 5 and the insertion form one step in
//! [`Mempool::admit`].
//!
//! Spendable balance is the confirmed balance minus what the sender's
//! other pending transactions already debit, so a set of pending
//! transfers can never spend more than the sender holds.

use std::collections::HashSet;

use crate::balance::BalanceLedger;
use crate::consensus::error::RejectReason;
use crate::consensus::proposer::TxPool;
use crate::types::{Amount, Balance, Identity, Transaction, TxId};

/// Pending transactions in admission order, keyed by digest.
#[derive(Clone, Debug, Default)]
pub struct Mempool {
    entries: Vec<(TxId, Transaction)>,
    ids: HashSet<TxId>,
}

/// A pending transaction dropped by [`Mempool::revalidate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Eviction {
    /// Reward minted for a block the current chain does not contain.
    OrphanedReward(TxId),
    /// Transfer that no longer passes admission.
    Rejected(TxId, RejectReason),
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stateless admission checks (signature, amount and fee floor).
    pub fn precheck(tx: &Transaction, minimum_fee: Amount) -> Result<TxId, RejectReason> {
        if tx.from.is_some() && !tx.verify_signature() {
            return Err(RejectReason::BadSignature);
        }
        if tx.amount.is_zero() || (tx.from.is_some() && tx.fee < minimum_fee) {
            return Err(RejectReason::InvalidAmount { minimum_fee });
        }
        Ok(tx.id())
    }

    /// Stateful admission checks followed by insertion.
    ///
    /// Assumes [`Mempool::precheck`] already passed for `tx`.
    pub fn admit(
        &mut self,
        tx: Transaction,
        balances: &BalanceLedger,
    ) -> Result<TxId, RejectReason> {
        let id = tx.id();
        self.admit_with_id(id, tx, balances)
    }

    fn admit_with_id(
        &mut self,
        id: TxId,
        tx: Transaction,
        balances: &BalanceLedger,
    ) -> Result<TxId, RejectReason> {
        if let Some(from) = &tx.from {
            let spendable = self.spendable(from, balances, Some(&id));
            let required = tx.total_debit();
            if !spendable.covers(required) {
                return Err(RejectReason::InsufficientFunds {
                    spendable: spendable.0,
                    required,
                });
            }
            if let Some(contract) = &tx.contract {
                if !contract.evaluate(spendable, tx.amount) {
                    return Err(RejectReason::ContractRejected);
                }
            }
        }

        if self.ids.contains(&id) {
            return Err(RejectReason::DuplicateTransaction(id));
        }

        self.ids.insert(id);
        self.entries.push((id, tx));
        Ok(id)
    }

    /// Full admission: [`Mempool::precheck`] then [`Mempool::admit`].
    pub fn submit(
        &mut self,
        tx: Transaction,
        balances: &BalanceLedger,
        minimum_fee: Amount,
    ) -> Result<TxId, RejectReason> {
        let id = Self::precheck(&tx, minimum_fee)?;
        self.admit_with_id(id, tx, balances)
    }

    /// Inserts a finalizer-minted transaction without admission checks.
    pub fn seed(&mut self, tx: Transaction) {
        let id = tx.id();
        if self.ids.insert(id) {
            self.entries.push((id, tx));
        }
    }

    /// Re-admits every pending transaction against `balances`.
    ///
    /// Runs after the chain under the pool was replaced. Pending rewards
    /// are dropped, since the blocks they pay for are gone; transfers go
    /// through the stateful checks again in admission order, and those
    /// that fail are dropped.
    pub fn revalidate(&mut self, balances: &BalanceLedger) -> Vec<Eviction> {
        let pending = std::mem::take(&mut self.entries);
        self.ids.clear();

        let mut evicted = Vec::new();
        for (id, tx) in pending {
            if tx.is_reward() {
                evicted.push(Eviction::OrphanedReward(id));
                continue;
            }
            if let Err(reason) = self.admit_with_id(id, tx, balances) {
                evicted.push(Eviction::Rejected(id, reason));
            }
        }
        evicted
    }

    /// Confirmed balance minus the sender's pending debits.
    ///
    /// `exclude` skips one pending transaction, so a resubmission is not
    /// charged against itself and reaches the duplicate check.
    pub fn spendable(
        &self,
        identity: &Identity,
        balances: &BalanceLedger,
        exclude: Option<&TxId>,
    ) -> Balance {
        let pending: u128 = self
            .entries
            .iter()
            .filter(|(id, tx)| tx.from.as_ref() == Some(identity) && exclude != Some(id))
            .map(|(_, tx)| tx.total_debit())
            .sum();
        let confirmed = balances.balance(identity);
        Balance(confirmed.0 - pending as i128)
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending transactions in admission order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(|(_, tx)| tx)
    }

    /// Removes every transaction whose digest is in `ids`.
    pub fn remove_ids(&mut self, ids: &HashSet<TxId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| !ids.contains(id));
        self.ids.retain(|id| !ids.contains(id));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}

impl TxPool for Mempool {
    fn select_for_block(&self, max_txs: usize) -> Vec<Transaction> {
        self.transactions().take(max_txs).cloned().collect()
    }

    fn remove_included(&mut self, included: &[Transaction]) -> usize {
        let ids: HashSet<TxId> = included.iter().map(Transaction::id).collect();
        self.remove_ids(&ids)
    }
}
