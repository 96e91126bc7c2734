//! Balance ledger: spendable balances derived from the confirmed chain.
//!
//! The reference semantics is a full rescan: for an identity, the sum of
//! `amount` received as `to` minus `amount + fee` spent as `from`, over
//! every transaction in every confirmed block. Pending transactions never
//! count.
//!
//! [`BalanceLedger`] memoizes that rescan. It is rebuilt from a whole
//! chain in one pass and afterwards updated per finalized block by
//! applying only that block's deltas to the identities it touches. Every
//! identity that appears anywhere in the chain is therefore cached, and an
//! absent identity has a rescan total of zero, so the cache agrees with a
//! rescan at all times.

use std::collections::HashMap;

use crate::types::{Balance, Block, Identity};

/// Full-rescan balance of `identity` over `blocks`.
pub fn rescan<'a, I>(blocks: I, identity: &Identity) -> Balance
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut balance = Balance::ZERO;
    for tx in blocks.into_iter().flat_map(|b| b.transactions.iter()) {
        if tx.from.as_ref() == Some(identity) {
            balance.debit(tx.amount);
            balance.debit(tx.fee);
        }
        if &tx.to == identity {
            balance.credit(tx.amount);
        }
    }
    balance
}

/// Cached, incrementally maintained view of confirmed balances.
#[derive(Clone, Debug, Default)]
pub struct BalanceLedger {
    cache: HashMap<Identity, Balance>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the cache from every block in `blocks`.
    pub fn from_blocks<'a, I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let mut ledger = Self::new();
        for block in blocks {
            ledger.apply_block(block);
        }
        ledger
    }

    /// Drops the cache and rebuilds it from `blocks`.
    pub fn rebuild<'a, I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = &'a Block>,
    {
        *self = Self::from_blocks(blocks);
    }

    /// Folds one newly confirmed block into the cache.
    ///
    /// Only identities touched by the block are updated.
    pub fn apply_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            if let Some(from) = &tx.from {
                let entry = self.cache.entry(from.clone()).or_default();
                entry.debit(tx.amount);
                entry.debit(tx.fee);
            }
            self.cache.entry(tx.to.clone()).or_default().credit(tx.amount);
        }
    }

    /// Cached confirmed balance of `identity`.
    pub fn balance(&self, identity: &Identity) -> Balance {
        self.cache.get(identity).copied().unwrap_or_default()
    }

    /// Number of identities with a cached balance.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
