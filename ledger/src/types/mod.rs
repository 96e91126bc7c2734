//! Core domain types used by the ledger
//!
//! This module defines strongly-typed digests, identities, signatures and
//! fixed-point amounts that are shared across the ledger implementation.
//! The goal is to avoid "naked" strings and integers in public APIs and
//! instead use domain-specific newtypes whose encodings are fixed, so that
//! every hash can be recomputed bit-for-bit by another process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Blocks and block hashing.
pub mod block;
/// Transactions and the conditional-transfer predicate.
pub mod tx;

pub use block::{Block, BlockHash, Finalizer, merkle_root};
pub use tx::{Contract, ContractRule, Transaction, TxId};

/// Length in bytes of all 256-bit digests used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit digest wrapper (BLAKE3-256).
///
/// Digests are rendered as 64 lowercase hex characters wherever a printable
/// form is needed (logs, JSON snapshots, the proof-of-work target). The same
/// hex form is used by `Serialize`, so the canonical bincode encoding of a
/// struct containing a digest is also stable.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// The all-zero digest, used as the genesis parent sentinel.
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not**
    /// a password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Hashes the concatenation `left || right`.
    pub fn combine(left: &Hash256, right: &Hash256) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&left.0);
        hasher.update(&right.0);
        Hash256(*hasher.finalize().as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex rendering of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Hash256(out))
    }

    /// Number of leading `'0'` characters in the hex rendering.
    ///
    /// Equivalent to counting zero nibbles from the most significant end,
    /// without allocating the string.
    pub fn leading_zero_nibbles(&self) -> usize {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// Returns `true` if the hex rendering starts with `difficulty` zeros.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.leading_zero_nibbles() >= difficulty
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Participant identity: the hex encoding of an Ed25519 public key.
///
/// Identities are what transactions name as `from` / `to`, what validators
/// register under, and what signatures are verified against. The ledger
/// never interprets the string beyond handing it to
/// [`crate::crypto::verify`]; an identity that is not a valid key simply
/// never verifies.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    /// Wraps raw public key bytes as a hex identity.
    pub fn from_public_key(pk_bytes: &[u8]) -> Self {
        Identity(hex::encode(pk_bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

/// Ed25519 signature bytes, wrapped to avoid naked `Vec<u8>`.
///
/// These are detached signatures over a transaction's content digest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Number of minor units in one whole coin.
pub const COIN: u64 = 100_000_000;

/// Non-negative fixed-point value with eight decimal places.
///
/// Stored and hashed as an integer count of minor units so that amounts
/// are exact and their encoding is fixed across processes.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Whole coins, e.g. `Amount::coins(5)` is `5.00000000`.
    pub const fn coins(n: u64) -> Self {
        Amount(n * COIN)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / COIN, self.0 % COIN)
    }
}

/// Error returned when a decimal amount string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount literal: {0:?}")]
pub struct ParseAmountError(pub String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Parses `"12"`, `"12.5"` or `"0.00000001"`; at most eight decimals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAmountError(s.to_string());
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 8 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<8}").parse().map_err(|_| err())?
        };
        whole
            .checked_mul(COIN)
            .and_then(|w| w.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(err)
    }
}

/// Signed account balance in minor units.
///
/// Balances are derived by replaying the chain, so a chain adopted from a
/// peer may legitimately drive an account below zero; the signed
/// representation keeps the replay total exact in that case.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Balance(pub i128);

impl Balance {
    pub const ZERO: Balance = Balance(0);

    pub fn credit(&mut self, amount: Amount) {
        self.0 += i128::from(amount.0);
    }

    pub fn debit(&mut self, amount: Amount) {
        self.0 -= i128::from(amount.0);
    }

    /// Returns `true` if this balance can pay `required`.
    pub fn covers(self, required: u128) -> bool {
        self.0 >= 0 && self.0 as u128 >= required
    }

    /// Returns `true` if this balance is at least `threshold`.
    pub fn at_least(self, threshold: Amount) -> bool {
        self.0 >= i128::from(threshold.0)
    }
}

impl From<Amount> for Balance {
    fn from(a: Amount) -> Self {
        Balance(i128::from(a.0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let coin = u128::from(COIN);
        write!(f, "{sign}{}.{:08}", abs / coin, abs % coin)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch (UTC).
///
/// Falls back to 0 if the system clock reads before the epoch.
pub fn now_millis() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zero_nibbles_counts_hex_zeros() {
        let mut bytes = [0xffu8; HASH_LEN];
        assert_eq!(Hash256(bytes).leading_zero_nibbles(), 0);

        bytes[0] = 0x0f;
        assert_eq!(Hash256(bytes).leading_zero_nibbles(), 1);

        bytes[0] = 0x00;
        bytes[1] = 0x01;
        let h = Hash256(bytes);
        assert_eq!(h.leading_zero_nibbles(), 3);
        assert!(h.to_hex().starts_with("000"));
        assert!(!h.to_hex().starts_with("0000"));

        assert_eq!(Hash256::ZERO.leading_zero_nibbles(), 64);
    }

    #[test]
    fn hash_serializes_as_hex_string() {
        let h = Hash256::compute(b"ledger");
        let json = serde_json::to_string(&h).expect("serialize hash");
        assert_eq!(json, format!("\"{}\"", h.to_hex()));

        let back: Hash256 = serde_json::from_str(&json).expect("deserialize hash");
        assert_eq!(back, h);
    }

    #[test]
    fn amount_parses_decimal_literals() {
        assert_eq!("5".parse::<Amount>().unwrap(), Amount::coins(5));
        assert_eq!("0.1".parse::<Amount>().unwrap(), Amount(10_000_000));
        assert_eq!("12.5".parse::<Amount>().unwrap(), Amount(1_250_000_000));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount(50_000_000));
        assert!("1.123456789".parse::<Amount>().is_err());
        assert!("-3".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
    }

    #[test]
    fn amount_and_balance_display() {
        assert_eq!(Amount(10_000_000).to_string(), "0.10000000");
        assert_eq!(Balance(-150_000_000).to_string(), "-1.50000000");
    }

    #[test]
    fn balance_covers_requires_non_negative() {
        assert!(Balance(10).covers(10));
        assert!(!Balance(9).covers(10));
        assert!(!Balance(-1).covers(0));
        assert!(Balance::ZERO.covers(0));
    }
}
