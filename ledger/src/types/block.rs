// ledger/src/types/block.rs

//! Block types, sealing and Merkle commitments.
//!
//! A block's `merkle_root` and `hash` are pure functions of its other
//! fields. [`Block::seal`] fixes both; any block whose stored values differ
//! from the recomputed ones is corrupt.
//!
//! The block hash is BLAKE3-256 over the **bincode 2** (`standard()`,
//! serde integration) encoding of, in order: `index` (`u64`), `timestamp`
//! (`u64` ms, UTC), `transactions` (full records, signatures included),
//! `previous_hash`, `merkle_root` (`Option`), `finalizer`. Because bincode
//! encodes a struct as the concatenation of its fields, the prefix up to
//! `merkle_root` can be hashed once and reused across nonces while mining.

use serde::{Deserialize, Serialize};

use super::{Hash256, Identity, Transaction};

/// Strongly-typed block hash.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    /// Parent sentinel carried by the genesis block.
    pub const GENESIS_PARENT: BlockHash = BlockHash(Hash256::ZERO);
}

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What finalized a block: a proof-of-work nonce or a stake validator.
///
/// A deployment uses exactly one policy, so one chain only ever holds
/// one kind of finalizer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Finalizer {
    Nonce(u64),
    Validator(Identity),
}

impl std::fmt::Display for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Finalizer::Nonce(n) => write!(f, "nonce:{n}"),
            Finalizer::Validator(id) => write!(f, "validator:{}", id.short()),
        }
    }
}

/// Merkle root over the transactions' content digests, in list order.
///
/// Adjacent digests are paired left to right and the concatenation hashed;
/// an odd trailing digest is carried to the next level unchanged. An empty
/// list has no root.
pub fn merkle_root(txs: &[Transaction]) -> Option<Hash256> {
    let mut level: Vec<Hash256> = txs.iter().map(|tx| tx.id().0).collect();
    if level.is_empty() {
        return None;
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => Hash256::combine(left, right),
                [odd] => *odd,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }

    level.first().copied()
}

/// Hashed fields preceding the finalizer, in canonical order.
#[derive(Serialize)]
struct BlockPrefix<'a> {
    index: u64,
    timestamp: u64,
    transactions: &'a [Transaction],
    previous_hash: &'a BlockHash,
    merkle_root: Option<&'a Hash256>,
}

/// Sealed ledger block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; 0 for genesis.
    pub index: u64,
    /// Sealing time, milliseconds since the Unix epoch (UTC).
    pub timestamp: u64,
    /// Ordered transactions; order affects both Merkle root and hash.
    pub transactions: Vec<Transaction>,
    /// Hash of the preceding block, [`BlockHash::GENESIS_PARENT`] for genesis.
    pub previous_hash: BlockHash,
    /// Merkle root over `transactions`; `None` when there are none.
    pub merkle_root: Option<Hash256>,
    /// Nonce or validator that finalized this block.
    pub finalizer: Finalizer,
    /// Stored hash; must equal [`Block::compute_hash`].
    pub hash: BlockHash,
}

impl Block {
    /// Builds and seals a block.
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: BlockHash,
        finalizer: Finalizer,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            merkle_root: None,
            finalizer,
            hash: BlockHash::default(),
        };
        block.seal();
        block
    }

    /// Genesis block: index 0, no transactions, zero parent, nonce 0.
    ///
    /// Every replica configured with the same `timestamp` derives the
    /// same genesis hash.
    pub fn genesis(timestamp: u64) -> Self {
        Self::new(
            0,
            timestamp,
            Vec::new(),
            BlockHash::GENESIS_PARENT,
            Finalizer::Nonce(0),
        )
    }

    /// Recomputes and stores the Merkle root and hash.
    pub fn seal(&mut self) {
        self.merkle_root = self.compute_merkle_root();
        self.hash = self.compute_hash();
    }

    pub fn compute_merkle_root(&self) -> Option<Hash256> {
        merkle_root(&self.transactions)
    }

    /// Canonical bytes of every hashed field except the finalizer.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are required to be serializable.
    pub fn prefix_bytes(&self) -> Vec<u8> {
        let prefix = BlockPrefix {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            merkle_root: self.merkle_root.as_ref(),
        };
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(&prefix, cfg)
            .expect("block prefix should always be serializable with bincode 2 + serde")
    }

    /// Canonical bytes of a finalizer, appended after [`Block::prefix_bytes`].
    pub fn finalizer_bytes(finalizer: &Finalizer) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(finalizer, cfg)
            .expect("finalizer should always be serializable with bincode 2 + serde")
    }

    /// Computes the canonical hash from the current field values.
    pub fn compute_hash(&self) -> BlockHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.prefix_bytes());
        hasher.update(&Self::finalizer_bytes(&self.finalizer));
        BlockHash(Hash256(*hasher.finalize().as_bytes()))
    }

    /// Returns `true` if the stored hash matches the recomputed one.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
