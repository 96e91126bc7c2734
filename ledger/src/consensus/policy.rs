//! The two finalization policies behind one type.

use tokio_util::sync::CancellationToken;

use crate::types::{Block, Finalizer, Identity};

use super::config::PolicyConfig;
use super::error::ConsensusError;
use super::pos::ProofOfStake;
use super::pow::ProofOfWork;
use super::registry::ValidatorRegistry;

/// How a candidate block becomes final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizationPolicy {
    ProofOfWork(ProofOfWork),
    ProofOfStake(ProofOfStake),
}

impl FinalizationPolicy {
    pub fn from_config(cfg: &PolicyConfig) -> Self {
        match cfg {
            PolicyConfig::ProofOfWork { difficulty } => {
                FinalizationPolicy::ProofOfWork(ProofOfWork::new(*difficulty))
            }
            PolicyConfig::ProofOfStake => FinalizationPolicy::ProofOfStake(ProofOfStake::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FinalizationPolicy::ProofOfWork(_) => "proof_of_work",
            FinalizationPolicy::ProofOfStake(_) => "proof_of_stake",
        }
    }

    pub fn is_stake(&self) -> bool {
        matches!(self, FinalizationPolicy::ProofOfStake(_))
    }

    /// Placeholder finalizer for a candidate built for `beneficiary`.
    pub fn placeholder(&self, beneficiary: &Identity) -> Finalizer {
        match self {
            FinalizationPolicy::ProofOfWork(_) => Finalizer::Nonce(0),
            FinalizationPolicy::ProofOfStake(_) => Finalizer::Validator(beneficiary.clone()),
        }
    }

    /// Checks that `beneficiary` may finalize at all under this policy.
    ///
    /// Always passes for proof of work; under proof of stake the identity
    /// must be registered.
    pub fn authorize(
        &self,
        registry: &ValidatorRegistry,
        beneficiary: &Identity,
    ) -> Result<(), ConsensusError> {
        match self {
            FinalizationPolicy::ProofOfWork(_) => Ok(()),
            FinalizationPolicy::ProofOfStake(pos) => pos.authorize(registry, beneficiary),
        }
    }

    /// Turns a candidate into a final block for `beneficiary`.
    ///
    /// Proof of work searches for a nonce and may block for a long time;
    /// it honors `cancel`. Proof of stake stamps the validator and returns
    /// at once. Callers run [`FinalizationPolicy::authorize`] first.
    pub fn propose(
        &self,
        mut candidate: Block,
        beneficiary: &Identity,
        cancel: &CancellationToken,
    ) -> Result<Block, ConsensusError> {
        match self {
            FinalizationPolicy::ProofOfWork(pow) => {
                pow.mine(&mut candidate, cancel)?;
            }
            FinalizationPolicy::ProofOfStake(pos) => pos.seal(&mut candidate, beneficiary),
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, BlockHash};

    fn dummy_candidate() -> Block {
        Block::new(1, 5, vec![], BlockHash::default(), Finalizer::Nonce(0))
    }

    #[test]
    fn from_config_maps_each_kind() {
        let pow = FinalizationPolicy::from_config(&PolicyConfig::ProofOfWork { difficulty: 2 });
        assert_eq!(pow, FinalizationPolicy::ProofOfWork(ProofOfWork::new(2)));
        assert!(!pow.is_stake());

        let pos = FinalizationPolicy::from_config(&PolicyConfig::ProofOfStake);
        assert!(pos.is_stake());
        assert_eq!(pos.name(), "proof_of_stake");
    }

    #[test]
    fn work_policy_authorizes_anyone() {
        let policy = FinalizationPolicy::ProofOfWork(ProofOfWork::new(1));
        let reg = ValidatorRegistry::new(Amount::coins(100));
        assert!(policy.authorize(&reg, &Identity::from("anyone")).is_ok());
    }

    #[test]
    fn stake_policy_stamps_beneficiary() {
        let policy = FinalizationPolicy::ProofOfStake(ProofOfStake::new());
        let who = Identity::from("val");
        let block = policy
            .propose(dummy_candidate(), &who, &CancellationToken::new())
            .expect("sealed");
        assert_eq!(block.finalizer, Finalizer::Validator(who));
        assert!(block.hash_is_consistent());
    }

    #[test]
    fn work_policy_mines_to_difficulty() {
        let policy = FinalizationPolicy::ProofOfWork(ProofOfWork::new(1));
        let block = policy
            .propose(dummy_candidate(), &Identity::from("miner"), &CancellationToken::new())
            .expect("mined");
        assert!(block.hash.to_string().starts_with('0'));
        assert!(block.hash_is_consistent());
    }
}
