use borsh::{BorshDeserialize, BorshSerialize};

use cairn_types::block::BlockStatus;
use cairn_types::primitives::Id;

use crate::error::StorageError;
use crate::traits::{BatchOp, BatchWriter};

const BLOCK_PREFIX: &[u8] = b"chain:block:";
const LAST_ACCEPTED_KEY: &[u8] = b"chain:last_accepted";

/// An encoded block and its status, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StoredBlock {
    pub bytes: Vec<u8>,
    pub status: BlockStatus,
}

/// Ledger tables. Each one lives under its own key prefix so a block only
/// writes the entries it changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Meta,
    Utxo,
    CurrentStaker,
    PendingStaker,
    Subnet,
    Chains,
    Tx,
}

impl Table {
    fn prefix(self) -> &'static [u8] {
        match self {
            Table::Meta => b"ledger:meta:",
            Table::Utxo => b"ledger:utxo:",
            Table::CurrentStaker => b"ledger:current:",
            Table::PendingStaker => b"ledger:pending:",
            Table::Subnet => b"ledger:subnet:",
            Table::Chains => b"ledger:chains:",
            Table::Tx => b"ledger:tx:",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Table::Meta => "ledger metadata",
            Table::Utxo => "utxo",
            Table::CurrentStaker => "current staker",
            Table::PendingStaker => "pending staker",
            Table::Subnet => "subnet",
            Table::Chains => "chain list",
            Table::Tx => "tx record",
        }
    }

    fn key(self, key: &[u8]) -> Vec<u8> {
        prefixed(self.prefix(), key)
    }
}

fn prefixed(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + key.len());
    full.extend_from_slice(prefix);
    full.extend_from_slice(key);
    full
}

fn encode<T: BorshSerialize>(what: &'static str, value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::Encode {
        what,
        reason: e.to_string(),
    })
}

fn decode<T: BorshDeserialize>(what: &'static str, bytes: &[u8]) -> Result<T, StorageError> {
    T::try_from_slice(bytes).map_err(|e| StorageError::Corrupt {
        what,
        reason: e.to_string(),
    })
}

/// Writes collected for one atomic commit.
#[derive(Debug, Default)]
pub struct ChainBatch {
    ops: Vec<BatchOp>,
}

impl ChainBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_block(&mut self, id: &Id, block: &StoredBlock) -> Result<(), StorageError> {
        self.ops.push(BatchOp::Put {
            key: prefixed(BLOCK_PREFIX, id),
            value: encode("block", block)?,
        });
        Ok(())
    }

    pub fn set_last_accepted(&mut self, id: &Id) {
        self.ops.push(BatchOp::Put {
            key: LAST_ACCEPTED_KEY.to_vec(),
            value: id.to_vec(),
        });
    }

    pub fn put_entry<T: BorshSerialize>(
        &mut self,
        table: Table,
        key: &[u8],
        value: &T,
    ) -> Result<(), StorageError> {
        self.ops.push(BatchOp::Put {
            key: table.key(key),
            value: encode(table.name(), value)?,
        });
        Ok(())
    }

    pub fn delete_entry(&mut self, table: Table, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            key: table.key(key),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Persistence for blocks, the last accepted id and the ledger tables.
pub struct ChainStore<S: BatchWriter> {
    store: S,
}

impl<S: BatchWriter> ChainStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load a block by id. A miss is [`StorageError::NotFound`].
    pub fn load_block(&self, id: &Id) -> Result<StoredBlock, StorageError> {
        match self.store.get(&prefixed(BLOCK_PREFIX, id))? {
            Some(bytes) => decode("block", &bytes),
            None => Err(StorageError::NotFound {
                key: format!("block {}", hex::encode(id)),
            }),
        }
    }

    pub fn has_block(&self, id: &Id) -> Result<bool, StorageError> {
        self.store.exists(&prefixed(BLOCK_PREFIX, id))
    }

    pub fn load_last_accepted(&self) -> Result<Option<Id>, StorageError> {
        match self.store.get(LAST_ACCEPTED_KEY)? {
            Some(bytes) => {
                let id: Id = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::Corrupt {
                        what: "last accepted id",
                        reason: format!("expected 32 bytes, found {}", bytes.len()),
                    }
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub fn load_entry<T: BorshDeserialize>(
        &self,
        table: Table,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        match self.store.get(&table.key(key))? {
            Some(bytes) => Ok(Some(decode(table.name(), &bytes)?)),
            None => Ok(None),
        }
    }

    /// Every entry of `table`, keyed without the table prefix.
    pub fn load_table<T: BorshDeserialize>(
        &self,
        table: Table,
    ) -> Result<Vec<(Vec<u8>, T)>, StorageError> {
        let prefix = table.prefix();
        self.store
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(key, bytes)| {
                let value = decode(table.name(), &bytes)?;
                Ok::<_, StorageError>((key[prefix.len()..].to_vec(), value))
            })
            .collect()
    }

    /// Write the whole batch atomically.
    pub fn commit(&self, batch: ChainBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.store.write_batch(batch.ops)
    }
}
