//! Consensus engine and related abstractions.
//!
//! This module provides a modular, testable consensus layer consisting of:
//!
//! - configuration parameters ([`config::ConsensusConfig`]),
//! - error types ([`error`]),
//! - block validity predicates ([`validator::BlockValidator`]),
//! - block proposal ([`proposer::Proposer`] over a [`proposer::TxPool`]),
//! - the two finalization policies ([`pow::ProofOfWork`],
//!   [`pos::ProofOfStake`]) behind [`policy::FinalizationPolicy`],
//! - the stake registry ([`registry::ValidatorRegistry`]),
//! - fork choice between replicas ([`fork_choice::LongestChainForkChoice`]),
//! - and the orchestrating [`engine::ConsensusEngine`].

pub mod config;
pub mod engine;
pub mod error;
pub mod fork_choice;
pub mod policy;
pub mod pos;
pub mod pow;
pub mod proposer;
pub mod registry;
pub mod validator;

pub use config::{ConsensusConfig, PolicyConfig};
pub use engine::{ConsensusEngine, LedgerState, Replacement};
pub use error::{
    ChainError, ConsensusError, IntegrityCheck, RegistryError, RejectReason, ValidationError,
};
pub use fork_choice::{Choice, ForkChoice, LongestChainForkChoice};
pub use policy::FinalizationPolicy;
pub use pos::ProofOfStake;
pub use pow::ProofOfWork;
pub use proposer::{Proposer, TxPool};
pub use registry::{ValidatorEntry, ValidatorRegistry};
pub use validator::{BlockValidator, validate_chain};
