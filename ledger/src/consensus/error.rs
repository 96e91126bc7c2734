use thiserror::Error;

use crate::types::{Amount, Identity, TxId};

/// Integrity check that a block failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityCheck {
    /// Stored hash differs from the recomputed hash.
    Hash,
    /// `previous_hash` differs from the prior block's stored hash.
    Linkage,
    /// Stored Merkle root differs from the recomputed root.
    MerkleRoot,
    /// A non-reward transaction's signature does not verify.
    Signature,
}

impl IntegrityCheck {
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrityCheck::Hash => "hash",
            IntegrityCheck::Linkage => "linkage",
            IntegrityCheck::MerkleRoot => "merkle_root",
            IntegrityCheck::Signature => "signature",
        }
    }
}

impl std::fmt::Display for IntegrityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type returned when a block fails structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid block #{index}: {check} check failed")]
pub struct ValidationError {
    /// Index of the offending block.
    pub index: u64,
    /// First check that failed.
    pub check: IntegrityCheck,
}

/// Why the mempool refused a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("signature does not verify against the sender key")]
    BadSignature,
    #[error("amount must be positive and fee at least {minimum_fee}")]
    InvalidAmount { minimum_fee: Amount },
    #[error("insufficient funds: spendable {spendable} units, required {required} units")]
    InsufficientFunds { spendable: i128, required: u128 },
    #[error("contract predicate rejected the transfer")]
    ContractRejected,
    #[error("transaction {0} is already pending")]
    DuplicateTransaction(TxId),
}

impl RejectReason {
    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::BadSignature => "bad_signature",
            RejectReason::InvalidAmount { .. } => "invalid_amount",
            RejectReason::InsufficientFunds { .. } => "insufficient_funds",
            RejectReason::ContractRejected => "contract_rejected",
            RejectReason::DuplicateTransaction(_) => "duplicate",
        }
    }
}

/// Validator registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("stake {stake} below minimum {minimum}")]
    InsufficientStake { stake: Amount, minimum: Amount },
    #[error("validator {0} is already registered")]
    AlreadyRegistered(Identity),
    #[error("validator {0} is not registered")]
    UnknownValidator(Identity),
    #[error("stake overflow")]
    StakeOverflow,
}

/// Misuse of the chain store API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block index {found} does not extend the chain (expected {expected})")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("a chain needs at least a genesis block")]
    Empty,
    #[error("first block is not a genesis block")]
    MissingGenesis,
}

/// High-level errors that can occur while finalizing a block.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Identity is not a registered validator.
    #[error("unauthorized validator {0}")]
    Unauthorized(Identity),
    /// The policy does not match the requested finalization path.
    #[error("finalization path not available under the configured policy")]
    WrongPolicy,
    /// Proof-of-work search was cancelled.
    #[error("mining cancelled")]
    Cancelled,
    /// Every nonce was tried without meeting the difficulty.
    #[error("nonce space exhausted at difficulty {difficulty}")]
    NonceSpaceExhausted { difficulty: usize },
    /// The chain tip moved while the block was being built.
    #[error("candidate block for height {height} is stale")]
    Stale { height: u64 },
    #[error(transparent)]
    Chain(#[from] ChainError),
}
