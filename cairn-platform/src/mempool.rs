use std::collections::BTreeMap;
use std::sync::RwLock;

use cairn_types::primitives::Id;
use cairn_types::tx::Tx;

/// What the block builder needs from the transaction pool.
pub trait Mempool: Send + Sync {
    fn get(&self, tx_id: &Id) -> Option<Tx>;

    /// Report that a transaction failed verification and should be evicted.
    fn mark_dropped(&self, tx_id: Id, reason: String);
}

/// Simple pool of pending transactions keyed by id, with a record of why
/// transactions were dropped.
#[derive(Debug, Default)]
pub struct TxPool {
    txs: RwLock<BTreeMap<Id, Tx>>,
    dropped: RwLock<BTreeMap<Id, String>>,
    max_size: usize,
}

impl TxPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    /// Add a transaction. Returns false if the pool is full or already has it.
    pub fn add(&self, tx: Tx) -> bool {
        let Ok(mut txs) = self.txs.write() else {
            return false;
        };
        if txs.len() >= self.max_size || txs.contains_key(&tx.id()) {
            return false;
        }
        txs.insert(tx.id(), tx);
        true
    }

    pub fn remove(&self, tx_id: &Id) -> Option<Tx> {
        self.txs.write().ok()?.remove(tx_id)
    }

    /// Pending transaction ids in id order.
    pub fn ids(&self) -> Vec<Id> {
        self.txs
            .read()
            .map(|txs| txs.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.txs.read().map(|txs| txs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_reason(&self, tx_id: &Id) -> Option<String> {
        self.dropped.read().ok()?.get(tx_id).cloned()
    }
}

impl Mempool for TxPool {
    fn get(&self, tx_id: &Id) -> Option<Tx> {
        self.txs.read().ok()?.get(tx_id).cloned()
    }

    fn mark_dropped(&self, tx_id: Id, reason: String) {
        self.remove(&tx_id);
        if let Ok(mut dropped) = self.dropped.write() {
            dropped.insert(tx_id, reason);
        }
    }
}
