//! Chain store: the ordered sequence of sealed blocks.
//!
//! The store exclusively owns block storage. Appending wires the linkage
//! to the current tip and reseals the block; prior blocks are never
//! touched. Validity is a whole-chain property: one defect anywhere makes
//! the chain untrustworthy.

use std::collections::HashSet;

use tracing::warn;

use crate::consensus::error::{ChainError, ValidationError};
use crate::consensus::validator::{BlockValidator, validate_chain};
use crate::types::{Block, BlockHash, TxId};
use crate::validation::BaseValidity;

/// Ordered, append-only sequence of blocks starting at genesis.
#[derive(Clone, Debug)]
pub struct ChainStore {
    blocks: Vec<Block>,
}

impl ChainStore {
    /// Creates a chain holding only the genesis block for `genesis_timestamp`.
    pub fn new(genesis_timestamp: u64) -> Self {
        Self {
            blocks: vec![Block::genesis(genesis_timestamp)],
        }
    }

    /// Wraps an existing block list without validating it.
    ///
    /// Only the shape is checked: the list must be non-empty and start with
    /// a genesis block. Use [`ChainStore::validate`] for integrity.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        let first = blocks.first().ok_or(ChainError::Empty)?;
        if !first.is_genesis() || first.previous_hash != BlockHash::GENESIS_PARENT {
            return Err(ChainError::MissingGenesis);
        }
        Ok(Self { blocks })
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn tip(&self) -> &Block {
        // Invariant: never empty (constructors guarantee a genesis block).
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false`; a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index the next appended block must carry.
    pub fn next_index(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Appends `block` on top of the current tip.
    ///
    /// The block's `previous_hash` is set from the tip and its Merkle root
    /// and hash are recomputed, so a chain built only through `append`
    /// stays valid after every call.
    pub fn append(&mut self, mut block: Block) -> Result<&Block, ChainError> {
        let expected = self.next_index();
        if block.index != expected {
            return Err(ChainError::IndexMismatch {
                expected,
                found: block.index,
            });
        }

        block.previous_hash = self.tip().hash;
        block.seal();
        self.blocks.push(block);
        Ok(self.tip())
    }

    /// Runs the integrity checks over every block after genesis.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_with(&BaseValidity::new())
    }

    /// Same as [`ChainStore::validate`] with a caller-supplied predicate.
    pub fn validate_with<V: BlockValidator + ?Sized>(
        &self,
        validator: &V,
    ) -> Result<(), ValidationError> {
        validate_chain(validator, &self.blocks)
    }

    /// Boolean form of [`ChainStore::validate`]; logs the failing check.
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(index = e.index, check = %e.check, "chain validation failed");
                false
            }
        }
    }

    /// Identifiers of every confirmed transaction.
    pub fn confirmed_tx_ids(&self) -> HashSet<TxId> {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter().map(|tx| tx.id()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::error::IntegrityCheck;
    use crate::crypto::{Keypair, Signer};
    use crate::types::{Amount, Finalizer, Transaction};

    fn candidate(chain: &ChainStore, txs: Vec<Transaction>) -> Block {
        Block::new(
            chain.next_index(),
            chain.tip().timestamp + 1_000,
            txs,
            BlockHash::default(),
            Finalizer::Nonce(0),
        )
    }

    fn transfer(from: &Keypair, to: &Keypair, coins: u64) -> Transaction {
        Transaction::transfer(
            from,
            to.identity(),
            Amount::coins(coins),
            Amount(10_000_000),
            None,
            1_700_000_000_000 + coins,
        )
    }

    fn sample_chain(len: usize) -> ChainStore {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let mut chain = ChainStore::new(0);
        for i in 1..len {
            let txs = vec![
                Transaction::reward(alice.identity(), Amount::coins(5), i as u64),
                transfer(&alice, &bob, i as u64),
            ];
            let block = candidate(&chain, txs);
            chain.append(block).expect("append");
        }
        chain
    }

    #[test]
    fn append_keeps_chain_valid_after_each_step() {
        let alice = Keypair::generate();
        let mut chain = ChainStore::new(0);
        assert!(chain.is_valid());

        for i in 1..6u64 {
            let block = candidate(
                &chain,
                vec![Transaction::reward(alice.identity(), Amount::coins(5), i)],
            );
            let appended = chain.append(block).expect("append");
            assert_eq!(appended.index, i);
            assert!(chain.is_valid());
        }
        assert_eq!(chain.len(), 6);
    }

    #[test]
    fn append_wires_linkage_from_tip() {
        let mut chain = ChainStore::new(0);
        let genesis_hash = chain.tip().hash;
        let block = candidate(&chain, vec![]);
        assert_eq!(block.previous_hash, BlockHash::default());

        let appended = chain.append(block).expect("append");
        assert_eq!(appended.previous_hash, genesis_hash);
        assert!(appended.hash_is_consistent());
    }

    #[test]
    fn append_rejects_wrong_index() {
        let mut chain = ChainStore::new(0);
        let mut block = candidate(&chain, vec![]);
        block.index = 5;

        let err = chain.append(block).unwrap_err();
        assert_eq!(
            err,
            ChainError::IndexMismatch {
                expected: 1,
                found: 5
            }
        );
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn tampered_transaction_invalidates_chain() {
        let mut chain = sample_chain(4);
        assert!(chain.is_valid());

        chain.blocks[2].transactions[1].amount = Amount::coins(1_000);
        let err = chain.validate().unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.check, IntegrityCheck::Hash);
        assert!(!chain.is_valid());
    }

    #[test]
    fn resealed_tamper_breaks_linkage_downstream() {
        let mut chain = sample_chain(4);
        chain.blocks[1].transactions[0].amount = Amount::coins(1_000);
        chain.blocks[1].seal();

        let err = chain.validate().unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.check, IntegrityCheck::Linkage);
    }

    #[test]
    fn resealed_tamper_of_signed_transfer_fails_signature_check() {
        let mut chain = sample_chain(2);
        chain.blocks[1].transactions[1].amount = Amount::coins(1_000);
        chain.blocks[1].seal();

        let err = chain.validate().unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.check, IntegrityCheck::Signature);
    }

    #[test]
    fn from_blocks_requires_genesis() {
        assert_eq!(ChainStore::from_blocks(vec![]).unwrap_err(), ChainError::Empty);

        let chain = sample_chain(3);
        let mut blocks = chain.into_blocks();
        blocks.remove(0);
        assert_eq!(
            ChainStore::from_blocks(blocks).unwrap_err(),
            ChainError::MissingGenesis
        );
    }

    #[test]
    fn json_roundtrip_preserves_every_hash() {
        let chain = sample_chain(5);
        let json = serde_json::to_string(chain.blocks()).expect("encode chain");
        let blocks: Vec<Block> = serde_json::from_str(&json).expect("decode chain");

        for block in &blocks {
            assert_eq!(block.compute_hash(), block.hash);
        }
        let restored = ChainStore::from_blocks(blocks).expect("shape");
        assert!(restored.is_valid());
        assert_eq!(restored.tip().hash, chain.tip().hash);
    }

    #[test]
    fn confirmed_ids_cover_every_block() {
        let chain = sample_chain(3);
        let ids = chain.confirmed_tx_ids();
        assert_eq!(ids.len(), 4);
        for block in chain.blocks() {
            for tx in &block.transactions {
                assert!(ids.contains(&tx.id()));
            }
        }
    }
}
