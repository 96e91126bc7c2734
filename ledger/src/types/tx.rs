// ledger/src/types/tx.rs

//! Transaction types for the ledger.
//!
//! A [`Transaction`] moves an [`Amount`] from one identity to another and
//! burns a flat fee. Transactions without a sender are reward (coinbase)
//! transactions minted by the finalization policy.
//!
//! The content digest is BLAKE3-256 over the **bincode 2** (`standard()`
//! config, serde integration) encoding of the fields, in this order:
//!
//! 1. `from` (`Option<String>`, hex public key)
//! 2. `to` (`String`, hex public key)
//! 3. `amount` (`u64` minor units)
//! 4. `fee` (`u64` minor units)
//! 5. `timestamp` (`u64` milliseconds since the Unix epoch, UTC)
//! 6. `contract` (`Option<{code, state}>`)
//!
//! The signature is excluded from the digest; it signs the digest.

use serde::{Deserialize, Serialize};

use super::{Amount, Balance, Hash256, Identity, Signature};
use crate::crypto::{self, Signer};

/// Prefix of the only contract rule the ledger understands.
pub const BALANCE_THRESHOLD_RULE: &str = "TRANSFER_IF_BALANCE_ABOVE:";

/// Strongly-typed transaction identifier (its content digest).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub Hash256);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Parsed form of a contract's rule string.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContractRule {
    /// Spendable balance must be at least the threshold.
    MinimumBalance(Amount),
}

/// Conditional-transfer predicate attached to a transaction.
///
/// The `code` holds the rule text and `state` an opaque string carried
/// along (and hashed) but never interpreted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub code: String,
    pub state: String,
}

impl Contract {
    /// Creates a contract with the empty JSON object as its state.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: "{}".to_string(),
        }
    }

    /// Contract requiring the sender's balance to be at least `threshold`.
    pub fn balance_above(threshold: Amount) -> Self {
        Self::new(format!("{BALANCE_THRESHOLD_RULE}{threshold}"))
    }

    /// Parses the rule, returning `None` for unknown or malformed code.
    pub fn rule(&self) -> Option<ContractRule> {
        let threshold = self.code.strip_prefix(BALANCE_THRESHOLD_RULE)?;
        threshold.parse().ok().map(ContractRule::MinimumBalance)
    }

    /// Evaluates the predicate against the sender's balance and the amount.
    ///
    /// Always `true` when the rule cannot be parsed.
    pub fn evaluate(&self, balance: Balance, amount: Amount) -> bool {
        match self.rule() {
            Some(ContractRule::MinimumBalance(threshold)) => {
                balance.at_least(threshold) && !amount.is_zero()
            }
            None => true,
        }
    }
}

/// Borrowed view of the hashed transaction fields, in canonical order.
#[derive(Serialize)]
struct TxContent<'a> {
    from: Option<&'a Identity>,
    to: &'a Identity,
    amount: Amount,
    fee: Amount,
    timestamp: u64,
    contract: Option<&'a Contract>,
}

/// Value transfer between two identities.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender public key; `None` marks a reward transaction.
    pub from: Option<Identity>,
    /// Recipient public key.
    pub to: Identity,
    /// Amount credited to `to`.
    pub amount: Amount,
    /// Flat fee burned from `from` on top of `amount`.
    pub fee: Amount,
    /// Creation time, milliseconds since the Unix epoch (UTC).
    pub timestamp: u64,
    /// Optional conditional-transfer predicate.
    pub contract: Option<Contract>,
    /// Sender's signature over [`Transaction::id`]; absent for rewards.
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Builds a reward transaction crediting `to`.
    pub fn reward(to: Identity, amount: Amount, timestamp: u64) -> Self {
        Self {
            from: None,
            to,
            amount,
            fee: Amount::ZERO,
            timestamp,
            contract: None,
            signature: None,
        }
    }

    /// Builds a transfer from `signer` and signs its content digest.
    pub fn transfer<S: Signer + ?Sized>(
        signer: &S,
        to: Identity,
        amount: Amount,
        fee: Amount,
        contract: Option<Contract>,
        timestamp: u64,
    ) -> Self {
        let mut tx = Self {
            from: Some(signer.identity()),
            to,
            amount,
            fee,
            timestamp,
            contract,
            signature: None,
        };
        tx.sign(signer);
        tx
    }

    /// Signs (or re-signs) the transaction with `signer`.
    pub fn sign<S: Signer + ?Sized>(&mut self, signer: &S) {
        let digest = self.id();
        self.signature = Some(signer.sign_digest(&digest.0));
    }

    /// Returns the canonical byte representation of the hashed fields.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are plain strings and integers.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let content = TxContent {
            from: self.from.as_ref(),
            to: &self.to,
            amount: self.amount,
            fee: self.fee,
            timestamp: self.timestamp,
            contract: self.contract.as_ref(),
        };
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(&content, cfg)
            .expect("transaction content should always be serializable with bincode 2 + serde")
    }

    /// Content digest; doubles as the transaction identifier.
    pub fn id(&self) -> TxId {
        TxId(Hash256::compute(&self.canonical_bytes()))
    }

    pub fn is_reward(&self) -> bool {
        self.from.is_none()
    }

    /// Total debited from the sender: `amount + fee`.
    pub fn total_debit(&self) -> u128 {
        u128::from(self.amount.0) + u128::from(self.fee.0)
    }

    /// Checks the sender's signature over the content digest.
    ///
    /// Reward transactions carry no signature and always pass.
    pub fn verify_signature(&self) -> bool {
        match (&self.from, &self.signature) {
            (None, _) => true,
            (Some(from), Some(sig)) => crypto::verify(from, &self.id().0, sig),
            (Some(_), None) => false,
        }
    }
}
