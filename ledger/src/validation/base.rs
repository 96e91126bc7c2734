//! Base integrity predicate for blocks.
//!
//! This validator enforces the chain invariants that need nothing beyond
//! the block and its predecessor, checked in this order:
//!
//! 1. stored hash equals the recomputed hash,
//! 2. `previous_hash` equals the predecessor's stored hash,
//! 3. stored Merkle root equals the recomputed root,
//! 4. every non-reward transaction's signature verifies against `from`.

use crate::consensus::error::{IntegrityCheck, ValidationError};
use crate::consensus::validator::BlockValidator;
use crate::types::Block;

/// Base integrity predicate for blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaseValidity;

impl BaseValidity {
    pub fn new() -> Self {
        Self
    }

    fn fail(block: &Block, check: IntegrityCheck) -> ValidationError {
        ValidationError {
            index: block.index,
            check,
        }
    }

    fn check_hash(&self, block: &Block) -> Result<(), ValidationError> {
        if !block.hash_is_consistent() {
            return Err(Self::fail(block, IntegrityCheck::Hash));
        }
        Ok(())
    }

    fn check_linkage(&self, previous: &Block, block: &Block) -> Result<(), ValidationError> {
        if block.previous_hash != previous.hash {
            return Err(Self::fail(block, IntegrityCheck::Linkage));
        }
        Ok(())
    }

    fn check_merkle_root(&self, block: &Block) -> Result<(), ValidationError> {
        if block.merkle_root != block.compute_merkle_root() {
            return Err(Self::fail(block, IntegrityCheck::MerkleRoot));
        }
        Ok(())
    }

    fn check_signatures(&self, block: &Block) -> Result<(), ValidationError> {
        if !block.transactions.iter().all(|tx| tx.verify_signature()) {
            return Err(Self::fail(block, IntegrityCheck::Signature));
        }
        Ok(())
    }
}

impl BlockValidator for BaseValidity {
    fn validate(&self, previous: &Block, block: &Block) -> Result<(), ValidationError> {
        self.check_hash(block)?;
        self.check_linkage(previous, block)?;
        self.check_merkle_root(block)?;
        self.check_signatures(block)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::crypto::Signer;
    use crate::types::{Amount, Finalizer, HASH_LEN, Identity, Transaction};

    fn dummy_identity(byte: u8) -> Identity {
        Identity(hex::encode([byte; HASH_LEN]))
    }

    fn child_of(parent: &Block, txs: Vec<Transaction>) -> Block {
        Block::new(
            parent.index + 1,
            parent.timestamp + 1_000,
            txs,
            parent.hash,
            Finalizer::Nonce(0),
        )
    }

    fn signed_transfer(kp: &Keypair) -> Transaction {
        Transaction::transfer(
            kp,
            dummy_identity(2),
            Amount::coins(1),
            Amount(10_000_000),
            None,
            1_700_000_000_000,
        )
    }

    #[test]
    fn base_validity_accepts_well_formed_child() {
        let kp = Keypair::generate();
        let genesis = Block::genesis(0);
        let block = child_of(&genesis, vec![signed_transfer(&kp)]);

        assert!(BaseValidity::new().validate(&genesis, &block).is_ok());
    }

    #[test]
    fn base_validity_rejects_bad_hash_first() {
        let genesis = Block::genesis(0);
        let other = Block::genesis(99);
        // Broken linkage too, but the hash check runs first.
        let mut block = child_of(&other, vec![]);
        block.timestamp += 1;

        let err = BaseValidity::new().validate(&genesis, &block).unwrap_err();
        assert_eq!(err.check, IntegrityCheck::Hash);
        assert_eq!(err.index, 1);
    }

    #[test]
    fn base_validity_rejects_broken_linkage() {
        let genesis = Block::genesis(0);
        let other = Block::genesis(99);
        let block = child_of(&other, vec![]);

        let err = BaseValidity::new().validate(&genesis, &block).unwrap_err();
        assert_eq!(err.check, IntegrityCheck::Linkage);
    }

    #[test]
    fn base_validity_rejects_stale_merkle_root() {
        let genesis = Block::genesis(0);
        let mut block = child_of(
            &genesis,
            vec![Transaction::reward(dummy_identity(1), Amount::coins(5), 1)],
        );
        block.transactions[0].amount = Amount::coins(6);
        block.hash = block.compute_hash();

        let err = BaseValidity::new().validate(&genesis, &block).unwrap_err();
        assert_eq!(err.check, IntegrityCheck::MerkleRoot);
    }

    #[test]
    fn base_validity_rejects_forged_signature() {
        let owner = Keypair::generate();
        let forger = Keypair::generate();
        let genesis = Block::genesis(0);

        let mut tx = signed_transfer(&forger);
        tx.from = Some(owner.identity());
        let block = child_of(&genesis, vec![tx]);

        let err = BaseValidity::new().validate(&genesis, &block).unwrap_err();
        assert_eq!(err.check, IntegrityCheck::Signature);
    }
}
