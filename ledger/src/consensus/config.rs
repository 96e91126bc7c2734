use serde::{Deserialize, Serialize};

use crate::types::Amount;

/// Which finalization policy a deployment runs.
///
/// Chosen once at configuration time; a chain never mixes the two.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Nonce search until the hex hash has `difficulty` leading zeros.
    ProofOfWork { difficulty: usize },
    /// Stake-weighted validator selection.
    ProofOfStake,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::ProofOfWork { difficulty: 3 }
    }
}

/// Consensus configuration parameters.
///
/// This includes both protocol-level knobs (fees, rewards, stake floor)
/// and implementation-level limits (e.g. maximum transactions per block).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Finalization policy for this deployment.
    pub policy: PolicyConfig,
    /// Minimum fee for non-reward transactions.
    pub minimum_fee: Amount,
    /// Amount minted to the finalizer of each block.
    pub block_reward: Amount,
    /// Minimum stake accepted by the validator registry.
    pub minimum_stake: Amount,
    /// Upper bound on pending transactions drained into one block.
    pub max_block_txs: usize,
    /// Target block interval used by the demo node loop.
    pub block_time_secs: u64,
    /// Genesis timestamp; replicas must agree on it to share a genesis.
    pub genesis_timestamp_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            minimum_fee: Amount(10_000_000),
            block_reward: Amount::coins(5),
            minimum_stake: Amount::coins(100),
            max_block_txs: 10_000,
            block_time_secs: 5,
            genesis_timestamp_ms: 1_700_000_000_000,
        }
    }
}

impl ConsensusConfig {
    /// Default parameters with the proof-of-work policy at `difficulty`.
    pub fn proof_of_work(difficulty: usize) -> Self {
        Self {
            policy: PolicyConfig::ProofOfWork { difficulty },
            ..Self::default()
        }
    }

    /// Default parameters with the stake-weighted policy.
    pub fn proof_of_stake() -> Self {
        Self {
            policy: PolicyConfig::ProofOfStake,
            ..Self::default()
        }
    }
}
