//! In-memory snapshot store.
//!
//! Keeps the last saved chain behind a lock. Useful for unit tests and for
//! nodes configured without persistence.

use parking_lot::Mutex;

use crate::types::Block;

use super::{SnapshotStore, StorageError};

/// In-memory implementation of [`SnapshotStore`].
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    blocks: Mutex<Option<Vec<Block>>>,
}

impl InMemorySnapshotStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `blocks`, as if they had been saved earlier.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(Some(blocks)),
        }
    }

    /// Number of blocks in the saved snapshot.
    pub fn len(&self) -> usize {
        self.blocks.lock().as_ref().map_or(0, Vec::len)
    }

    /// Returns `true` if nothing (or an empty chain) was saved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError> {
        Ok(self.blocks.lock().clone())
    }

    fn save(&self, blocks: &[Block]) -> Result<(), StorageError> {
        *self.blocks.lock() = Some(blocks.to_vec());
        Ok(())
    }
}
