//! Block validity predicates for the ledger.
//!
//! This module implements concrete block validators that plug into the
//! chain store via [`crate::consensus::validator::BlockValidator`].
//!
//! It currently provides:
//!
//! - [`base::BaseValidity`]: hash, linkage, Merkle root and signature checks.

pub mod base;

pub use base::BaseValidity;
