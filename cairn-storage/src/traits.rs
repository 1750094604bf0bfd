use std::sync::Arc;

use crate::error::StorageError;

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Byte-keyed storage engine the chain store is written against.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Single unbatched write. The chain store itself only writes in batches.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Every pair whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}

/// An engine that can apply a list of writes all-or-nothing.
pub trait BatchWriter: KvStore {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        S::get(self, key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        S::put(self, key, value)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        S::exists(self, key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        S::scan_prefix(self, prefix)
    }
}

impl<S: BatchWriter + ?Sized> BatchWriter for Arc<S> {
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        S::write_batch(self, ops)
    }
}
