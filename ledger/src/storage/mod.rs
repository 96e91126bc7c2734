//! Snapshot persistence for the chain.
//!
//! The whole chain is saved as one snapshot after every change and read
//! back once at startup. This module provides the [`SnapshotStore`]
//! abstraction and two backends:
//!
//! - an in-memory store ([`mem::InMemorySnapshotStore`]) suitable for tests
//!   and nodes that run without persistence,
//! - a JSON file store ([`file::JsonFileSnapshotStore`]) for nodes that
//!   should survive a restart.

use thiserror::Error;

use crate::types::Block;

pub mod file;
pub mod mem;

pub use file::JsonFileSnapshotStore;
pub use mem::InMemorySnapshotStore;

/// Storage-level error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The snapshot could not be encoded or decoded.
    #[error("snapshot codec failed: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Whole-chain snapshot persistence.
///
/// Implementations must be shareable between threads; a node saves from
/// whichever thread finalized or reconciled.
pub trait SnapshotStore: Send + Sync {
    /// Reads the last saved chain, `Ok(None)` if nothing was saved yet.
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError>;

    /// Replaces the saved chain with `blocks`.
    fn save(&self, blocks: &[Block]) -> Result<(), StorageError>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError> {
        (**self).load()
    }

    fn save(&self, blocks: &[Block]) -> Result<(), StorageError> {
        (**self).save(blocks)
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError> {
        (**self).load()
    }

    fn save(&self, blocks: &[Block]) -> Result<(), StorageError> {
        (**self).save(blocks)
    }
}
