//! Chain storage over an abstract key-value store.
//!
//! Keeps block bodies, the set of applied blocks and the storage tip. Each
//! apply/rollback is one atomic batch, so a crash between calls leaves the
//! store at a block boundary.

use crate::ports::ChainStorage;
use parking_lot::Mutex;
use shared_types::{short_hash, Block, Hash, StorageError};
use std::collections::HashMap;

const BLOCK_PREFIX: &[u8] = b"blk:";
const APPLIED_PREFIX: &[u8] = b"app:";
const TIP_KEY: &[u8] = b"tip";

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl From<KVStoreError> for StorageError {
    fn from(err: KVStoreError) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

/// Abstract key-value store (RocksDB, sled, in-memory).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Either all operations are applied or none.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// In-memory key-value store for testing and ephemeral nodes.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: HashMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.contains_key(key))
    }
}

fn key(prefix: &[u8], hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + hash.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(hash);
    key
}

/// [`ChainStorage`] backed by a [`KeyValueStore`].
///
/// Blocks must be applied strictly on top of the storage tip and rolled
/// back strictly from it.
pub struct KvChainStorage<K: KeyValueStore> {
    store: Mutex<K>,
}

impl<K: KeyValueStore> KvChainStorage<K> {
    /// Open storage whose tip is `genesis` unless the store already has one.
    pub fn new(mut store: K, genesis: Hash) -> Result<Self, StorageError> {
        if !store.exists(TIP_KEY)? {
            store.put(TIP_KEY, &genesis)?;
        }
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    /// Hash of the last applied block.
    pub fn tip(&self) -> Result<Hash, StorageError> {
        let store = self.store.lock();
        read_hash(&*store, TIP_KEY)
    }

    pub fn is_applied(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.store.lock().exists(&key(APPLIED_PREFIX, hash))?)
    }

    pub fn has_block(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.store.lock().exists(&key(BLOCK_PREFIX, hash))?)
    }

    fn load_block(store: &K, hash: &Hash) -> Result<Block, StorageError> {
        let bytes = store
            .get(&key(BLOCK_PREFIX, hash))?
            .ok_or_else(|| StorageError::NotFound(hex::encode(hash)))?;
        serde_json::from_slice(&bytes).map_err(|_| StorageError::DataCorruption {
            block_hash: hex::encode(hash),
        })
    }
}

fn read_hash<K: KeyValueStore>(store: &K, key: &[u8]) -> Result<Hash, StorageError> {
    let bytes = store
        .get(key)?
        .ok_or_else(|| StorageError::NotFound(String::from_utf8_lossy(key).into_owned()))?;
    bytes
        .try_into()
        .map_err(|_| StorageError::DatabaseError("malformed tip record".to_string()))
}

impl<K: KeyValueStore> ChainStorage for KvChainStorage<K> {
    fn store_block(&self, block: &Block) -> Result<(), StorageError> {
        let hash = block.hash();
        let bytes =
            serde_json::to_vec(block).map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        self.store.lock().put(&key(BLOCK_PREFIX, &hash), &bytes)?;
        Ok(())
    }

    fn apply_block(&self, hash: &Hash) -> Result<(), StorageError> {
        let mut store = self.store.lock();
        let block = Self::load_block(&*store, hash)?;
        let tip = read_hash(&*store, TIP_KEY)?;
        if block.header.parent_hash != tip {
            return Err(StorageError::RejectedByState {
                block_hash: hex::encode(hash),
                reason: format!("parent is not the storage tip {}", short_hash(&tip)),
            });
        }

        store.atomic_batch_write(vec![
            BatchOperation::put(key(APPLIED_PREFIX, hash), tip.to_vec()),
            BatchOperation::put(TIP_KEY, hash.to_vec()),
        ])?;
        tracing::trace!(hash = %short_hash(hash), "Block applied");
        Ok(())
    }

    fn rollback_block(&self, hash: &Hash) -> Result<(), StorageError> {
        let mut store = self.store.lock();
        let applied_key = key(APPLIED_PREFIX, hash);
        let Some(parent) = store.get(&applied_key)? else {
            // never applied or already rolled back
            return Ok(());
        };
        let tip = read_hash(&*store, TIP_KEY)?;
        if tip != *hash {
            return Err(StorageError::RejectedByState {
                block_hash: hex::encode(hash),
                reason: format!("not the storage tip {}", short_hash(&tip)),
            });
        }

        store.atomic_batch_write(vec![
            BatchOperation::delete(applied_key),
            BatchOperation::put(TIP_KEY, parent),
        ])?;
        tracing::trace!(hash = %short_hash(hash), "Block rolled back");
        Ok(())
    }
}
