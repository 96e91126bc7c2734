//! Proof-of-work finalization.
//!
//! Mining searches nonces from 0 upward until the block hash, rendered in
//! hex, starts with `difficulty` zero characters. The hashed prefix (every
//! field but the finalizer) is absorbed once and the hasher state cloned
//! per attempt.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::{Block, BlockHash, Finalizer, Hash256};

use super::error::ConsensusError;

/// Attempts between two looks at the cancellation token.
pub const CANCEL_CHECK_INTERVAL: u64 = 4_096;

/// Nonce-search policy at a fixed difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    pub difficulty: usize,
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self { difficulty }
    }

    /// Mines `block` in place, returning the number of hashes tried.
    ///
    /// The Merkle root is recomputed before the search. On success the
    /// block carries the winning nonce and its hash; on cancellation the
    /// block is left untouched.
    pub fn mine(&self, block: &mut Block, cancel: &CancellationToken) -> Result<u64, ConsensusError> {
        block.merkle_root = block.compute_merkle_root();

        let mut prefix = blake3::Hasher::new();
        prefix.update(&block.prefix_bytes());

        for nonce in 0..=u64::MAX {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                debug!(index = block.index, attempts = nonce, "mining cancelled");
                return Err(ConsensusError::Cancelled);
            }

            let finalizer = Finalizer::Nonce(nonce);
            let mut hasher = prefix.clone();
            hasher.update(&Block::finalizer_bytes(&finalizer));
            let hash = Hash256(*hasher.finalize().as_bytes());

            if hash.meets_difficulty(self.difficulty) {
                block.finalizer = finalizer;
                block.hash = BlockHash(hash);
                return Ok(nonce.saturating_add(1));
            }
        }

        Err(ConsensusError::NonceSpaceExhausted {
            difficulty: self.difficulty,
        })
    }

    /// Returns `true` if `block`'s stored hash satisfies this difficulty.
    pub fn is_satisfied_by(&self, block: &Block) -> bool {
        block.hash.0.meets_difficulty(self.difficulty)
    }
}
