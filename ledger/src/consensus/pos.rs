//! Stake-weighted finalization.
//!
//! A registered validator stamps its identity into the block's finalizer
//! and seals it; there is no search. Who gets to stamp the next block is
//! drawn from the [`ValidatorRegistry`] in proportion to stake.

use rand::Rng;
use tracing::debug;

use crate::types::{Block, Finalizer, Identity};

use super::error::ConsensusError;
use super::registry::{ValidatorEntry, ValidatorRegistry};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProofOfStake;

impl ProofOfStake {
    pub fn new() -> Self {
        Self
    }

    /// Draws the next validator, `None` when the registry is empty.
    pub fn select_validator<'r, R>(
        &self,
        registry: &'r ValidatorRegistry,
        rng: &mut R,
    ) -> Option<&'r ValidatorEntry>
    where
        R: Rng + ?Sized,
    {
        let picked = registry.select_with(rng);
        if picked.is_none() {
            debug!("no registered validators; nothing to select");
        }
        picked
    }

    /// Fails with [`ConsensusError::Unauthorized`] unless `validator` is registered.
    pub fn authorize(
        &self,
        registry: &ValidatorRegistry,
        validator: &Identity,
    ) -> Result<(), ConsensusError> {
        if registry.contains(validator) {
            Ok(())
        } else {
            Err(ConsensusError::Unauthorized(validator.clone()))
        }
    }

    /// Stamps `validator` as finalizer and reseals `block`.
    pub fn seal(&self, block: &mut Block, validator: &Identity) {
        block.finalizer = Finalizer::Validator(validator.clone());
        block.seal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, BlockHash};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dummy_registry() -> ValidatorRegistry {
        let mut reg = ValidatorRegistry::new(Amount::coins(100));
        reg.register(Identity::from("val-a"), Amount::coins(100))
            .expect("register a");
        reg.register(Identity::from("val-b"), Amount::coins(300))
            .expect("register b");
        reg
    }

    #[test]
    fn unregistered_validator_is_unauthorized() {
        let reg = dummy_registry();
        let pos = ProofOfStake::new();

        assert!(pos.authorize(&reg, &Identity::from("val-a")).is_ok());
        let err = pos.authorize(&reg, &Identity::from("mallory")).unwrap_err();
        assert!(matches!(err, ConsensusError::Unauthorized(id) if id == Identity::from("mallory")));
    }

    #[test]
    fn seal_stamps_validator_and_keeps_hash_consistent() {
        let mut block = Block::new(1, 10, vec![], BlockHash::default(), Finalizer::Nonce(0));
        let before = block.hash;

        ProofOfStake::new().seal(&mut block, &Identity::from("val-b"));
        assert_eq!(block.finalizer, Finalizer::Validator(Identity::from("val-b")));
        assert_ne!(block.hash, before);
        assert!(block.hash_is_consistent());
    }

    #[test]
    fn selection_picks_registered_members_only() {
        let reg = dummy_registry();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let picked = ProofOfStake::new()
                .select_validator(&reg, &mut rng)
                .expect("non-empty registry");
            assert!(reg.contains(&picked.identity));
        }

        let empty = ValidatorRegistry::new(Amount::coins(100));
        assert!(ProofOfStake::new().select_validator(&empty, &mut rng).is_none());
    }
}
