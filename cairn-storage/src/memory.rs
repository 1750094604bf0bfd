use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter, KvStore};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory engine. Clones of an `Arc<MemoryStore>` see the same data, which
/// is how tests reopen a chain.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Map>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Map>, StorageError> {
        self.data.read().map_err(|e| StorageError::Engine {
            reason: e.to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Map>, StorageError> {
        self.data.write().map_err(|e| StorageError::Engine {
            reason: e.to_string(),
        })
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .read()?
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

impl BatchWriter for MemoryStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut data = self.write()?;
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}
