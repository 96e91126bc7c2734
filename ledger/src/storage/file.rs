//! JSON file snapshot store.
//!
//! The chain is written as a pretty-printed JSON array of blocks. Writes
//! go to a sibling temporary file which is then renamed over the target,
//! so a crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::Block;

use super::{SnapshotStore, StorageError};

/// File-backed implementation of [`SnapshotStore`].
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<Option<Vec<Block>>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blocks: Vec<Block> = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), blocks = blocks.len(), "snapshot loaded");
        Ok(Some(blocks))
    }

    fn save(&self, blocks: &[Block]) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.tmp_path();
        {
            let mut out = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut out, blocks)?;
            out.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), blocks = blocks.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainStore;
    use crate::types::{Amount, BlockHash, Finalizer, Identity, Transaction};
    use tempfile::TempDir;

    fn dummy_chain(len: u64) -> ChainStore {
        let mut chain = ChainStore::new(1_700_000_000_000);
        for i in 1..len {
            let reward = Transaction::reward(Identity::from("miner"), Amount::coins(5), i);
            let block = Block::new(i, i, vec![reward], BlockHash::default(), Finalizer::Nonce(i));
            chain.append(block).expect("append");
        }
        chain
    }

    #[test]
    fn missing_file_loads_nothing() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = JsonFileSnapshotStore::new(tmp.path().join("chain.json"));
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn save_then_load_restores_identical_chain() {
        let tmp = TempDir::new().expect("create temp dir");
        let store = JsonFileSnapshotStore::new(tmp.path().join("nested/dir/chain.json"));
        let chain = dummy_chain(4);

        store.save(chain.blocks()).expect("save");
        assert!(!store.tmp_path().exists());

        let blocks = store.load().expect("load").expect("snapshot");
        assert_eq!(blocks, chain.blocks());
        let restored = ChainStore::from_blocks(blocks).expect("shape");
        assert!(restored.is_valid());
    }

    #[test]
    fn corrupt_file_is_a_codec_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("chain.json");
        fs::write(&path, b"{ not json").expect("write garbage");

        let err = JsonFileSnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
    }

    #[test]
    fn unwritable_target_is_an_io_error() {
        let tmp = TempDir::new().expect("create temp dir");
        // The target's parent is a regular file, so the directory cannot be created.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"x").expect("write blocker");

        let store = JsonFileSnapshotStore::new(blocker.join("chain.json"));
        let err = store.save(dummy_chain(2).blocks()).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
