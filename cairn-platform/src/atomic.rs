//! Cross-chain shared memory used by import and export transactions.

use std::collections::BTreeMap;
use std::sync::RwLock;

use cairn_types::primitives::Id;
use cairn_types::utxo::{Utxo, UtxoId};

use crate::error::PlatformError;

/// Shared-memory writes produced by one block, for a single peer chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicRequests {
    /// UTXOs the peer exported to this chain, consumed by imports.
    pub remove: Vec<UtxoId>,
    /// UTXOs this chain exports to the peer.
    pub put: Vec<Utxo>,
}

impl AtomicRequests {
    pub fn merge(&mut self, other: AtomicRequests) {
        self.remove.extend(other.remove);
        self.put.extend(other.put);
    }
}

/// Merge `from` into `into`, keyed by peer chain.
pub fn merge_requests(into: &mut BTreeMap<Id, AtomicRequests>, from: BTreeMap<Id, AtomicRequests>) {
    for (chain, requests) in from {
        into.entry(chain).or_default().merge(requests);
    }
}

/// Persists the chain's own writes for an accepted block.
pub type Commit<'a> = Box<dyn FnOnce() -> Result<(), PlatformError> + 'a>;

pub trait SharedMemory: Send + Sync {
    /// UTXOs `peer_chain` exported to this chain. Every id must be present.
    fn get(&self, peer_chain: &Id, utxo_ids: &[UtxoId]) -> Result<Vec<Utxo>, PlatformError>;

    /// Apply the requests of an accepted block together with `commit`.
    ///
    /// Either both take effect or neither does: `commit` is not run if the
    /// requests cannot be applied, and the requests are dropped if `commit`
    /// fails.
    fn apply(
        &self,
        requests: &BTreeMap<Id, AtomicRequests>,
        commit: Commit<'_>,
    ) -> Result<(), PlatformError>;
}

/// In-memory shared memory for a single chain.
#[derive(Debug, Default)]
pub struct MemorySharedMemory {
    inbound: RwLock<BTreeMap<(Id, UtxoId), Utxo>>,
    outbound: RwLock<BTreeMap<(Id, UtxoId), Utxo>>,
}

impl MemorySharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `utxo` importable from `peer_chain`, as if the peer had exported it.
    pub fn insert_inbound(&self, peer_chain: Id, utxo: Utxo) -> Result<(), PlatformError> {
        self.inbound.write()?.insert((peer_chain, utxo.utxo_id), utxo);
        Ok(())
    }

    /// UTXOs exported to `peer_chain`.
    pub fn outbound(&self, peer_chain: &Id) -> Result<Vec<Utxo>, PlatformError> {
        Ok(self
            .outbound
            .read()?
            .iter()
            .filter(|((chain, _), _)| chain == peer_chain)
            .map(|(_, utxo)| utxo.clone())
            .collect())
    }
}

impl SharedMemory for MemorySharedMemory {
    fn get(&self, peer_chain: &Id, utxo_ids: &[UtxoId]) -> Result<Vec<Utxo>, PlatformError> {
        let inbound = self.inbound.read()?;
        utxo_ids
            .iter()
            .map(|id| {
                inbound.get(&(*peer_chain, *id)).cloned().ok_or_else(|| {
                    PlatformError::not_found(format!(
                        "shared utxo {}:{}",
                        hex::encode(id.tx_id),
                        id.output_index
                    ))
                })
            })
            .collect()
    }

    fn apply(
        &self,
        requests: &BTreeMap<Id, AtomicRequests>,
        commit: Commit<'_>,
    ) -> Result<(), PlatformError> {
        let mut inbound = self.inbound.write()?;
        let mut outbound = self.outbound.write()?;
        for (chain, request) in requests {
            if let Some(id) = request
                .remove
                .iter()
                .find(|id| !inbound.contains_key(&(*chain, **id)))
            {
                return Err(PlatformError::rejected(format!(
                    "shared utxo {}:{} was already consumed",
                    hex::encode(id.tx_id),
                    id.output_index
                )));
            }
        }

        commit()?;
        for (chain, request) in requests {
            for id in &request.remove {
                inbound.remove(&(*chain, *id));
            }
            for utxo in &request.put {
                outbound.insert((*chain, utxo.utxo_id), utxo.clone());
            }
        }
        Ok(())
    }
}
