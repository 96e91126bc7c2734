//! Validator registry for the stake-weighted policy.
//!
//! Validators are kept in registration order; that order is the fixed walk
//! order used by stake-weighted selection.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{Amount, Identity};

use super::error::RegistryError;

/// A participant eligible to finalize blocks, with its stake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEntry {
    pub identity: Identity,
    pub stake: Amount,
}

/// Registered validators in a fixed order.
#[derive(Clone, Debug)]
pub struct ValidatorRegistry {
    minimum_stake: Amount,
    validators: Vec<ValidatorEntry>,
}

impl ValidatorRegistry {
    pub fn new(minimum_stake: Amount) -> Self {
        Self {
            minimum_stake,
            validators: Vec::new(),
        }
    }

    pub fn minimum_stake(&self) -> Amount {
        self.minimum_stake
    }

    /// Registers `identity` with `stake`.
    ///
    /// Fails if the stake is below the minimum or the identity is already
    /// registered (use [`ValidatorRegistry::top_up`] to add stake).
    pub fn register(&mut self, identity: Identity, stake: Amount) -> Result<(), RegistryError> {
        if stake < self.minimum_stake {
            warn!(
                identity = identity.short(),
                stake = %stake,
                minimum = %self.minimum_stake,
                "validator registration rejected: insufficient stake"
            );
            return Err(RegistryError::InsufficientStake {
                stake,
                minimum: self.minimum_stake,
            });
        }
        if self.contains(&identity) {
            warn!(identity = identity.short(), "validator already registered");
            return Err(RegistryError::AlreadyRegistered(identity));
        }

        info!(identity = identity.short(), stake = %stake, "validator registered");
        self.validators.push(ValidatorEntry { identity, stake });
        Ok(())
    }

    /// Adds `amount` to an existing validator's stake, returning the new stake.
    pub fn top_up(&mut self, identity: &Identity, amount: Amount) -> Result<Amount, RegistryError> {
        let entry = self
            .validators
            .iter_mut()
            .find(|v| &v.identity == identity)
            .ok_or_else(|| RegistryError::UnknownValidator(identity.clone()))?;
        entry.stake = entry
            .stake
            .checked_add(amount)
            .ok_or(RegistryError::StakeOverflow)?;
        Ok(entry.stake)
    }

    /// Removes a validator, keeping the order of the others.
    pub fn deregister(&mut self, identity: &Identity) -> Option<ValidatorEntry> {
        let pos = self.validators.iter().position(|v| &v.identity == identity)?;
        Some(self.validators.remove(pos))
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.validators.iter().any(|v| &v.identity == identity)
    }

    pub fn get(&self, identity: &Identity) -> Option<&ValidatorEntry> {
        self.validators.iter().find(|v| &v.identity == identity)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn entries(&self) -> &[ValidatorEntry] {
        &self.validators
    }

    /// Sum of all stakes, in minor units.
    pub fn total_stake(&self) -> u128 {
        self.validators.iter().map(|v| u128::from(v.stake.0)).sum()
    }

    /// Deterministic stake-weighted pick for a draw in `[0, total_stake)`.
    ///
    /// Walks validators in registration order accumulating stake and
    /// returns the first whose cumulative stake is at least `draw`; at an
    /// exact boundary the earlier validator wins.
    pub fn select(&self, draw: u128) -> Option<&ValidatorEntry> {
        let mut cumulative: u128 = 0;
        for entry in &self.validators {
            cumulative += u128::from(entry.stake.0);
            if cumulative >= draw {
                return Some(entry);
            }
        }
        None
    }

    /// Stake-weighted pick with a uniform draw from `rng`.
    ///
    /// `None` when there are no validators (or no stake at all).
    pub fn select_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ValidatorEntry> {
        let total = self.total_stake();
        if total == 0 {
            return None;
        }
        let draw = rng.gen_range(0..total);
        self.select(draw)
    }
}
