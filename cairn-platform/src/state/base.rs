use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use cairn_crypto::hash::blake3_hash;
use cairn_storage::chain_store::{ChainBatch, ChainStore, StoredBlock, Table};
use cairn_storage::error::StorageError;
use cairn_storage::traits::BatchWriter;
use cairn_types::block::{Block, BlockBody, BlockHeader, BlockStatus};
use cairn_types::codec::codec;
use cairn_types::genesis::Genesis;
use cairn_types::primitives::{Amount, Id, NodeId, Timestamp, PRIMARY_NETWORK_ID};
use cairn_types::staker::Staker;
use cairn_types::tx::{TxStatus, UnsignedTx};
use cairn_types::utxo::{OutputOwners, Utxo, UtxoId};

use super::{
    subnet_not_found, tx_not_found, utxo_not_found, validator_not_found, Chain, Diff, TxRecord,
};
use crate::atomic::{AtomicRequests, SharedMemory};
use crate::error::PlatformError;
use crate::reward::Calculator;

/// Validators keyed by `(subnet, node)` and delegators keyed by tx id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakerSet {
    validators: BTreeMap<(Id, NodeId), Staker>,
    delegators: BTreeMap<Id, Staker>,
}

impl StakerSet {
    pub fn put(&mut self, staker: Staker) {
        if staker.kind.is_validator() {
            self.validators
                .insert((staker.subnet_id, staker.node_id), staker);
        } else {
            self.delegators.insert(staker.tx_id, staker);
        }
    }

    pub fn delete(&mut self, staker: &Staker) {
        if staker.kind.is_validator() {
            self.remove_validator(&staker.subnet_id, &staker.node_id);
        } else {
            self.remove_delegator(&staker.tx_id);
        }
    }

    pub(super) fn remove_validator(&mut self, subnet_id: &Id, node_id: &NodeId) {
        self.validators.remove(&(*subnet_id, *node_id));
    }

    pub(super) fn remove_delegator(&mut self, tx_id: &Id) {
        self.delegators.remove(tx_id);
    }

    pub fn validator(&self, subnet_id: &Id, node_id: &NodeId) -> Option<&Staker> {
        self.validators.get(&(*subnet_id, *node_id))
    }

    pub fn delegators_of(&self, node_id: &NodeId) -> Vec<Staker> {
        self.delegators
            .values()
            .filter(|s| &s.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Staker> {
        self.validators
            .values()
            .chain(self.delegators.values())
            .cloned()
            .collect()
    }
}

const TIMESTAMP_KEY: &[u8] = b"timestamp";
const SUPPLY_KEY: &[u8] = b"supply";

pub(super) fn utxo_key(utxo_id: &UtxoId) -> Vec<u8> {
    let mut key = utxo_id.tx_id.to_vec();
    key.extend_from_slice(&utxo_id.output_index.to_be_bytes());
    key
}

pub(super) fn validator_key(subnet_id: &Id, node_id: &NodeId) -> Vec<u8> {
    let mut key = vec![0u8];
    key.extend_from_slice(subnet_id);
    key.extend_from_slice(node_id);
    key
}

pub(super) fn delegator_key(tx_id: &Id) -> Vec<u8> {
    let mut key = vec![1u8];
    key.extend_from_slice(tx_id);
    key
}

fn id_from_key(key: &[u8], what: &'static str) -> Result<Id, PlatformError> {
    key.try_into().map_err(|_| {
        PlatformError::Storage(StorageError::Corrupt {
            what,
            reason: format!("expected a 32 byte key, found {}", key.len()),
        })
    })
}

pub(super) fn stage_meta(
    batch: &mut ChainBatch,
    timestamp: Timestamp,
    current_supply: Amount,
) -> Result<(), PlatformError> {
    batch.put_entry(Table::Meta, TIMESTAMP_KEY, &timestamp)?;
    batch.put_entry(Table::Meta, SUPPLY_KEY, &current_supply)?;
    Ok(())
}

fn stage_block(batch: &mut ChainBatch, block: &Block, status: BlockStatus) -> Result<(), PlatformError> {
    batch.put_block(
        &block.id(),
        &StoredBlock {
            bytes: block.bytes().to_vec(),
            status,
        },
    )?;
    Ok(())
}

/// The committed ledger. Each entry is persisted under its own key, so an
/// accepted block only rewrites what it changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub timestamp: Timestamp,
    pub current_supply: Amount,
    pub current: StakerSet,
    pub pending: StakerSet,
    pub utxos: BTreeMap<UtxoId, Utxo>,
    pub subnets: BTreeMap<Id, OutputOwners>,
    /// Chain creation tx ids per subnet.
    pub chains: BTreeMap<Id, Vec<Id>>,
    pub txs: BTreeMap<Id, TxRecord>,
}

impl Ledger {
    /// Stage every entry. Only genesis writes a whole ledger.
    fn stage_all(&self, batch: &mut ChainBatch) -> Result<(), PlatformError> {
        stage_meta(batch, self.timestamp, self.current_supply)?;
        for (table, set) in [
            (Table::CurrentStaker, &self.current),
            (Table::PendingStaker, &self.pending),
        ] {
            for ((subnet_id, node_id), staker) in &set.validators {
                batch.put_entry(table, &validator_key(subnet_id, node_id), staker)?;
            }
            for (tx_id, staker) in &set.delegators {
                batch.put_entry(table, &delegator_key(tx_id), staker)?;
            }
        }
        for (utxo_id, utxo) in &self.utxos {
            batch.put_entry(Table::Utxo, &utxo_key(utxo_id), utxo)?;
        }
        for (subnet_id, owner) in &self.subnets {
            batch.put_entry(Table::Subnet, subnet_id, owner)?;
        }
        for (subnet_id, chains) in &self.chains {
            batch.put_entry(Table::Chains, subnet_id, chains)?;
        }
        for (tx_id, record) in &self.txs {
            batch.put_entry(Table::Tx, tx_id, record)?;
        }
        Ok(())
    }

    fn load<S: BatchWriter>(store: &ChainStore<S>) -> Result<Self, PlatformError> {
        let timestamp = store
            .load_entry(Table::Meta, TIMESTAMP_KEY)?
            .ok_or_else(|| PlatformError::not_found("ledger timestamp"))?;
        let current_supply = store
            .load_entry(Table::Meta, SUPPLY_KEY)?
            .ok_or_else(|| PlatformError::not_found("ledger supply"))?;
        let mut ledger = Ledger {
            timestamp,
            current_supply,
            ..Ledger::default()
        };

        for (_, staker) in store.load_table::<Staker>(Table::CurrentStaker)? {
            ledger.current.put(staker);
        }
        for (_, staker) in store.load_table::<Staker>(Table::PendingStaker)? {
            ledger.pending.put(staker);
        }
        for (_, utxo) in store.load_table::<Utxo>(Table::Utxo)? {
            ledger.utxos.insert(utxo.utxo_id, utxo);
        }
        for (key, owner) in store.load_table::<OutputOwners>(Table::Subnet)? {
            ledger.subnets.insert(id_from_key(&key, "subnet")?, owner);
        }
        for (key, chains) in store.load_table::<Vec<Id>>(Table::Chains)? {
            ledger.chains.insert(id_from_key(&key, "chain list")?, chains);
        }
        for (key, record) in store.load_table::<TxRecord>(Table::Tx)? {
            ledger.txs.insert(id_from_key(&key, "tx record")?, record);
        }
        Ok(ledger)
    }
}

/// The state as of the last accepted block.
pub struct State {
    ledger: RwLock<Ledger>,
    last_accepted: RwLock<Id>,
    /// Rejected blocks not written yet.
    unsaved_blocks: RwLock<BTreeMap<Id, (Block, BlockStatus)>>,
    store: ChainStore<Arc<dyn BatchWriter>>,
}

impl State {
    fn with_ledger(ledger: Ledger, last_accepted: Id, store: ChainStore<Arc<dyn BatchWriter>>) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            last_accepted: RwLock::new(last_accepted),
            unsaved_blocks: RwLock::new(BTreeMap::new()),
            store,
        }
    }

    /// Build and persist the initial state from genesis bytes.
    ///
    /// Genesis validators become current stakers with their potential reward
    /// added to supply. The genesis block is a legacy commit block at height 0
    /// whose parent is the hash of the genesis bytes.
    pub fn from_genesis(
        genesis_bytes: &[u8],
        store: Arc<dyn BatchWriter>,
        calculator: &Calculator,
    ) -> Result<Self, PlatformError> {
        let genesis = Genesis::parse(genesis_bytes)?;
        let mut ledger = Ledger {
            timestamp: genesis.timestamp,
            current_supply: genesis.initial_supply,
            ..Ledger::default()
        };

        for utxo in genesis.utxos {
            ledger.utxos.insert(utxo.utxo_id, utxo);
        }

        for tx in &genesis.validators {
            let UnsignedTx::AddValidator(add) = tx.unsigned() else {
                return Err(PlatformError::rejected(format!(
                    "genesis validator is a {}",
                    tx.unsigned().name()
                )));
            };
            if ledger.current_supply == 0 {
                return Err(PlatformError::rejected(
                    "genesis validators require a positive initial supply",
                ));
            }
            let reward = calculator.calculate(
                add.validator.duration(),
                add.validator.weight,
                ledger.current_supply,
            );
            ledger.current_supply = ledger
                .current_supply
                .checked_add(reward)
                .ok_or_else(|| PlatformError::rejected("genesis supply overflow"))?;
            if let Some(staker) = Staker::from_tx(tx, reward) {
                ledger.current.put(staker);
            }
            ledger.txs.insert(
                tx.id(),
                TxRecord {
                    tx: tx.clone(),
                    status: TxStatus::Committed,
                },
            );
        }

        for tx in &genesis.chains {
            let UnsignedTx::CreateChain(create) = tx.unsigned() else {
                return Err(PlatformError::rejected(format!(
                    "genesis chain is a {}",
                    tx.unsigned().name()
                )));
            };
            ledger
                .chains
                .entry(create.subnet_id)
                .or_default()
                .push(tx.id());
            ledger.txs.insert(
                tx.id(),
                TxRecord {
                    tx: tx.clone(),
                    status: TxStatus::Committed,
                },
            );
        }

        let genesis_block = Block::new(
            BlockHeader::Legacy {
                parent: blake3_hash(genesis_bytes),
                height: 0,
            },
            BlockBody::Commit,
        )?;

        let store = ChainStore::new(store);
        let mut batch = ChainBatch::new();
        ledger.stage_all(&mut batch)?;
        stage_block(&mut batch, &genesis_block, BlockStatus::Accepted)?;
        batch.set_last_accepted(&genesis_block.id());
        store.commit(batch)?;

        Ok(Self::with_ledger(ledger, genesis_block.id(), store))
    }

    /// Reopen a previously committed state.
    pub fn load(store: Arc<dyn BatchWriter>) -> Result<Self, PlatformError> {
        let store = ChainStore::new(store);
        let last_accepted = store
            .load_last_accepted()?
            .ok_or_else(|| PlatformError::not_found("last accepted block"))?;
        let ledger = Ledger::load(&store)?;
        Ok(Self::with_ledger(ledger, last_accepted, store))
    }

    pub fn last_accepted(&self) -> Result<Id, PlatformError> {
        Ok(*self.last_accepted.read()?)
    }

    /// Record a block, written at the next commit.
    pub fn add_block(&self, block: &Block, status: BlockStatus) -> Result<(), PlatformError> {
        self.unsaved_blocks
            .write()?
            .insert(block.id(), (block.clone(), status));
        Ok(())
    }

    /// Look up a block that has been added to the base state. Storage misses
    /// surface as the storage layer's not-found error.
    pub fn get_stateless_block(&self, id: &Id) -> Result<(Block, BlockStatus), PlatformError> {
        if let Some(entry) = self.unsaved_blocks.read()?.get(id) {
            return Ok(entry.clone());
        }
        let stored = self.store.load_block(id)?;
        let block = Block::parse(codec(), &stored.bytes)?;
        Ok((block, stored.status))
    }

    /// Persist a diff's changes, then write them into the ledger. The diff
    /// must be layered on the last accepted block.
    pub fn apply_diff(&self, diff: &Diff) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.write()?;
        let mut batch = ChainBatch::new();
        diff.stage(&ledger, &mut batch)?;
        self.store.commit(batch)?;
        diff.write_to(&mut ledger);
        Ok(())
    }

    /// Make `block` the last accepted block.
    ///
    /// The diff's changes, the block itself, the `rejected` blocks it
    /// conflicts with and the new last accepted id go out in one batch,
    /// committed by `shared_memory` together with `requests`. Nothing in
    /// memory changes unless that succeeds.
    pub fn accept_block(
        &self,
        block: &Block,
        diff: &Diff,
        rejected: &[Block],
        shared_memory: &dyn SharedMemory,
        requests: &BTreeMap<Id, AtomicRequests>,
    ) -> Result<(), PlatformError> {
        let mut ledger = self.ledger.write()?;
        let mut unsaved = self.unsaved_blocks.write()?;

        let mut batch = ChainBatch::new();
        diff.stage(&ledger, &mut batch)?;
        for (block, status) in unsaved.values() {
            stage_block(&mut batch, block, *status)?;
        }
        stage_block(&mut batch, block, BlockStatus::Accepted)?;
        for conflicting in rejected {
            stage_block(&mut batch, conflicting, BlockStatus::Rejected)?;
        }
        batch.set_last_accepted(&block.id());
        tracing::debug!(
            id = hex::encode(block.id()),
            writes = batch.len(),
            "committing accepted block"
        );

        let store = &self.store;
        shared_memory.apply(
            requests,
            Box::new(move || -> Result<(), PlatformError> {
                store.commit(batch)?;
                Ok(())
            }),
        )?;

        diff.write_to(&mut ledger);
        *self.last_accepted.write()? = block.id();
        unsaved.clear();
        Ok(())
    }

    /// Persist blocks recorded since the last commit.
    pub fn commit(&self) -> Result<(), PlatformError> {
        let mut unsaved = self.unsaved_blocks.write()?;
        let mut batch = ChainBatch::new();
        for (block, status) in unsaved.values() {
            stage_block(&mut batch, block, *status)?;
        }
        self.store.commit(batch)?;
        unsaved.clear();
        Ok(())
    }
}

impl Chain for State {
    fn timestamp(&self) -> Result<Timestamp, PlatformError> {
        Ok(self.ledger.read()?.timestamp)
    }

    fn current_supply(&self) -> Result<Amount, PlatformError> {
        Ok(self.ledger.read()?.current_supply)
    }

    fn get_current_validator(
        &self,
        subnet_id: &Id,
        node_id: &NodeId,
    ) -> Result<Staker, PlatformError> {
        self.ledger
            .read()?
            .current
            .validator(subnet_id, node_id)
            .cloned()
            .ok_or_else(|| validator_not_found(subnet_id, node_id))
    }

    fn get_pending_validator(
        &self,
        subnet_id: &Id,
        node_id: &NodeId,
    ) -> Result<Staker, PlatformError> {
        self.ledger
            .read()?
            .pending
            .validator(subnet_id, node_id)
            .cloned()
            .ok_or_else(|| validator_not_found(subnet_id, node_id))
    }

    fn current_delegators(&self, node_id: &NodeId) -> Result<Vec<Staker>, PlatformError> {
        Ok(self.ledger.read()?.current.delegators_of(node_id))
    }

    fn pending_delegators(&self, node_id: &NodeId) -> Result<Vec<Staker>, PlatformError> {
        Ok(self.ledger.read()?.pending.delegators_of(node_id))
    }

    fn current_stakers(&self) -> Result<Vec<Staker>, PlatformError> {
        let mut stakers = self.ledger.read()?.current.all();
        stakers.sort_by(Staker::cmp_removal);
        Ok(stakers)
    }

    fn pending_stakers(&self) -> Result<Vec<Staker>, PlatformError> {
        let mut stakers = self.ledger.read()?.pending.all();
        stakers.sort_by(Staker::cmp_promotion);
        Ok(stakers)
    }

    fn get_utxo(&self, utxo_id: &UtxoId) -> Result<Utxo, PlatformError> {
        self.ledger
            .read()?
            .utxos
            .get(utxo_id)
            .cloned()
            .ok_or_else(|| utxo_not_found(utxo_id))
    }

    fn get_subnet_owner(&self, subnet_id: &Id) -> Result<OutputOwners, PlatformError> {
        if *subnet_id == PRIMARY_NETWORK_ID {
            return Err(subnet_not_found(subnet_id));
        }
        self.ledger
            .read()?
            .subnets
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| subnet_not_found(subnet_id))
    }

    fn get_chains(&self, subnet_id: &Id) -> Result<Vec<Id>, PlatformError> {
        Ok(self
            .ledger
            .read()?
            .chains
            .get(subnet_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_tx(&self, tx_id: &Id) -> Result<TxRecord, PlatformError> {
        self.ledger
            .read()?
            .txs
            .get(tx_id)
            .cloned()
            .ok_or_else(|| tx_not_found(tx_id))
    }
}
