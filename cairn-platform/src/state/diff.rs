use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cairn_types::primitives::{Amount, Id, NodeId, Timestamp};
use cairn_types::staker::Staker;
use cairn_types::tx::{Tx, TxStatus};
use cairn_types::utxo::{OutputOwners, Utxo, UtxoId};

use cairn_storage::chain_store::{ChainBatch, Table};

use super::base::{delegator_key, stage_meta, utxo_key, validator_key, Ledger};
use super::{utxo_not_found, validator_not_found, Chain, StakerSet, TxRecord, Versions};
use crate::error::PlatformError;

/// Copy-on-write staker changes. `None` marks a removal.
#[derive(Debug, Clone, Default)]
struct StakerOverlay {
    validators: BTreeMap<(Id, NodeId), Option<Staker>>,
    delegators: BTreeMap<Id, Option<Staker>>,
}

impl StakerOverlay {
    fn put(&mut self, staker: Staker) {
        if staker.kind.is_validator() {
            self.validators
                .insert((staker.subnet_id, staker.node_id), Some(staker));
        } else {
            self.delegators.insert(staker.tx_id, Some(staker));
        }
    }

    fn delete(&mut self, staker: &Staker) {
        if staker.kind.is_validator() {
            self.validators
                .insert((staker.subnet_id, staker.node_id), None);
        } else {
            self.delegators.insert(staker.tx_id, None);
        }
    }

    fn touches(&self, staker: &Staker) -> bool {
        if staker.kind.is_validator() {
            self.validators
                .contains_key(&(staker.subnet_id, staker.node_id))
        } else {
            self.delegators.contains_key(&staker.tx_id)
        }
    }

    fn added(&self) -> impl Iterator<Item = &Staker> {
        self.validators
            .values()
            .chain(self.delegators.values())
            .flatten()
    }

    /// Replace entries of `parent` this overlay touches with the overlay's view.
    fn merge(&self, parent: Vec<Staker>) -> Vec<Staker> {
        let mut merged: Vec<Staker> = parent.into_iter().filter(|s| !self.touches(s)).collect();
        merged.extend(self.added().cloned());
        merged
    }

    fn lookup_validator(&self, subnet_id: &Id, node_id: &NodeId) -> Option<Option<&Staker>> {
        self.validators
            .get(&(*subnet_id, *node_id))
            .map(Option::as_ref)
    }

    fn stage(&self, table: Table, batch: &mut ChainBatch) -> Result<(), PlatformError> {
        for ((subnet_id, node_id), entry) in &self.validators {
            let key = validator_key(subnet_id, node_id);
            match entry {
                Some(staker) => batch.put_entry(table, &key, staker)?,
                None => batch.delete_entry(table, &key),
            }
        }
        for (tx_id, entry) in &self.delegators {
            let key = delegator_key(tx_id);
            match entry {
                Some(staker) => batch.put_entry(table, &key, staker)?,
                None => batch.delete_entry(table, &key),
            }
        }
        Ok(())
    }

    fn write_to(&self, set: &mut StakerSet) {
        for ((subnet_id, node_id), entry) in &self.validators {
            match entry {
                Some(staker) => set.put(staker.clone()),
                None => set.remove_validator(subnet_id, node_id),
            }
        }
        for (tx_id, entry) in &self.delegators {
            match entry {
                Some(staker) => set.put(staker.clone()),
                None => set.remove_delegator(tx_id),
            }
        }
    }
}

/// The ledger changes made by one block, layered on its parent.
///
/// The parent is referenced by block id and resolved through [`Versions`] on
/// every read that misses the overlay.
pub struct Diff {
    parent_id: Id,
    versions: Arc<dyn Versions>,

    timestamp: Timestamp,
    current_supply: Amount,
    current: StakerOverlay,
    pending: StakerOverlay,
    utxos: BTreeMap<UtxoId, Option<Utxo>>,
    subnets: BTreeMap<Id, OutputOwners>,
    chains: BTreeMap<Id, Vec<Id>>,
    txs: BTreeMap<Id, TxRecord>,
}

impl fmt::Debug for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diff")
            .field("parent_id", &hex::encode(self.parent_id))
            .field("timestamp", &self.timestamp)
            .field("current_supply", &self.current_supply)
            .field("utxos", &self.utxos.len())
            .field("txs", &self.txs.len())
            .finish()
    }
}

impl Diff {
    /// An empty diff on top of `parent_id`. Fails if that block has no state.
    pub fn new(parent_id: Id, versions: Arc<dyn Versions>) -> Result<Self, PlatformError> {
        let parent = versions
            .get_state(&parent_id)
            .ok_or(PlatformError::StateNotFound(parent_id))?;
        Ok(Self {
            parent_id,
            timestamp: parent.timestamp()?,
            current_supply: parent.current_supply()?,
            versions,
            current: StakerOverlay::default(),
            pending: StakerOverlay::default(),
            utxos: BTreeMap::new(),
            subnets: BTreeMap::new(),
            chains: BTreeMap::new(),
            txs: BTreeMap::new(),
        })
    }

    pub fn parent_id(&self) -> Id {
        self.parent_id
    }

    fn parent(&self) -> Result<Arc<dyn Chain>, PlatformError> {
        self.versions
            .get_state(&self.parent_id)
            .ok_or(PlatformError::StateNotFound(self.parent_id))
    }

    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    pub fn set_current_supply(&mut self, supply: Amount) {
        self.current_supply = supply;
    }

    pub fn put_current_staker(&mut self, staker: Staker) {
        self.current.put(staker);
    }

    pub fn delete_current_staker(&mut self, staker: &Staker) {
        self.current.delete(staker);
    }

    pub fn put_pending_staker(&mut self, staker: Staker) {
        self.pending.put(staker);
    }

    pub fn delete_pending_staker(&mut self, staker: &Staker) {
        self.pending.delete(staker);
    }

    pub fn add_utxo(&mut self, utxo: Utxo) {
        self.utxos.insert(utxo.utxo_id, Some(utxo));
    }

    pub fn delete_utxo(&mut self, utxo_id: UtxoId) {
        self.utxos.insert(utxo_id, None);
    }

    pub fn add_subnet(&mut self, subnet_id: Id, owner: OutputOwners) {
        self.subnets.insert(subnet_id, owner);
    }

    pub fn add_chain(&mut self, subnet_id: Id, chain_id: Id) {
        self.chains.entry(subnet_id).or_default().push(chain_id);
    }

    pub fn add_tx(&mut self, tx: &Tx, status: TxStatus) {
        self.txs.insert(
            tx.id(),
            TxRecord {
                tx: tx.clone(),
                status,
            },
        );
    }

    /// Stage the storage writes for this diff's own changes. `ledger` is the
    /// committed ledger the diff is about to be written into.
    pub(super) fn stage(&self, ledger: &Ledger, batch: &mut ChainBatch) -> Result<(), PlatformError> {
        stage_meta(batch, self.timestamp, self.current_supply)?;
        self.current.stage(Table::CurrentStaker, batch)?;
        self.pending.stage(Table::PendingStaker, batch)?;
        for (utxo_id, entry) in &self.utxos {
            let key = utxo_key(utxo_id);
            match entry {
                Some(utxo) => batch.put_entry(Table::Utxo, &key, utxo)?,
                None => batch.delete_entry(Table::Utxo, &key),
            }
        }
        for (subnet_id, owner) in &self.subnets {
            batch.put_entry(Table::Subnet, subnet_id, owner)?;
        }
        for (subnet_id, added) in &self.chains {
            let mut chains = ledger.chains.get(subnet_id).cloned().unwrap_or_default();
            chains.extend(added.iter().copied());
            batch.put_entry(Table::Chains, subnet_id, &chains)?;
        }
        for (tx_id, record) in &self.txs {
            batch.put_entry(Table::Tx, tx_id, record)?;
        }
        Ok(())
    }

    /// Write this diff's own changes into the committed ledger.
    pub(super) fn write_to(&self, ledger: &mut Ledger) {
        ledger.timestamp = self.timestamp;
        ledger.current_supply = self.current_supply;
        self.current.write_to(&mut ledger.current);
        self.pending.write_to(&mut ledger.pending);
        for (utxo_id, entry) in &self.utxos {
            match entry {
                Some(utxo) => {
                    ledger.utxos.insert(*utxo_id, utxo.clone());
                }
                None => {
                    ledger.utxos.remove(utxo_id);
                }
            }
        }
        for (subnet_id, owner) in &self.subnets {
            ledger.subnets.insert(*subnet_id, owner.clone());
        }
        for (subnet_id, chains) in &self.chains {
            ledger
                .chains
                .entry(*subnet_id)
                .or_default()
                .extend(chains.iter().copied());
        }
        for (tx_id, record) in &self.txs {
            ledger.txs.insert(*tx_id, record.clone());
        }
    }

    /// Persist this diff and write it into the committed base state.
    pub fn apply(&self, base: &super::State) -> Result<(), PlatformError> {
        base.apply_diff(self)
    }
}

impl Chain for Diff {
    fn timestamp(&self) -> Result<Timestamp, PlatformError> {
        Ok(self.timestamp)
    }

    fn current_supply(&self) -> Result<Amount, PlatformError> {
        Ok(self.current_supply)
    }

    fn get_current_validator(
        &self,
        subnet_id: &Id,
        node_id: &NodeId,
    ) -> Result<Staker, PlatformError> {
        match self.current.lookup_validator(subnet_id, node_id) {
            Some(Some(staker)) => Ok(staker.clone()),
            Some(None) => Err(validator_not_found(subnet_id, node_id)),
            None => self.parent()?.get_current_validator(subnet_id, node_id),
        }
    }

    fn get_pending_validator(
        &self,
        subnet_id: &Id,
        node_id: &NodeId,
    ) -> Result<Staker, PlatformError> {
        match self.pending.lookup_validator(subnet_id, node_id) {
            Some(Some(staker)) => Ok(staker.clone()),
            Some(None) => Err(validator_not_found(subnet_id, node_id)),
            None => self.parent()?.get_pending_validator(subnet_id, node_id),
        }
    }

    fn current_delegators(&self, node_id: &NodeId) -> Result<Vec<Staker>, PlatformError> {
        let parent = self.parent()?.current_delegators(node_id)?;
        Ok(self
            .current
            .merge(parent)
            .into_iter()
            .filter(|s| !s.kind.is_validator() && &s.node_id == node_id)
            .collect())
    }

    fn pending_delegators(&self, node_id: &NodeId) -> Result<Vec<Staker>, PlatformError> {
        let parent = self.parent()?.pending_delegators(node_id)?;
        Ok(self
            .pending
            .merge(parent)
            .into_iter()
            .filter(|s| !s.kind.is_validator() && &s.node_id == node_id)
            .collect())
    }

    fn current_stakers(&self) -> Result<Vec<Staker>, PlatformError> {
        let mut stakers = self.current.merge(self.parent()?.current_stakers()?);
        stakers.sort_by(Staker::cmp_removal);
        Ok(stakers)
    }

    fn pending_stakers(&self) -> Result<Vec<Staker>, PlatformError> {
        let mut stakers = self.pending.merge(self.parent()?.pending_stakers()?);
        stakers.sort_by(Staker::cmp_promotion);
        Ok(stakers)
    }

    fn get_utxo(&self, utxo_id: &UtxoId) -> Result<Utxo, PlatformError> {
        match self.utxos.get(utxo_id) {
            Some(Some(utxo)) => Ok(utxo.clone()),
            Some(None) => Err(utxo_not_found(utxo_id)),
            None => self.parent()?.get_utxo(utxo_id),
        }
    }

    fn get_subnet_owner(&self, subnet_id: &Id) -> Result<OutputOwners, PlatformError> {
        match self.subnets.get(subnet_id) {
            Some(owner) => Ok(owner.clone()),
            None => self.parent()?.get_subnet_owner(subnet_id),
        }
    }

    fn get_chains(&self, subnet_id: &Id) -> Result<Vec<Id>, PlatformError> {
        let mut chains = self.parent()?.get_chains(subnet_id)?;
        if let Some(added) = self.chains.get(subnet_id) {
            // Once this diff is applied the parent already lists them.
            for chain_id in added {
                if !chains.contains(chain_id) {
                    chains.push(*chain_id);
                }
            }
        }
        Ok(chains)
    }

    fn get_tx(&self, tx_id: &Id) -> Result<TxRecord, PlatformError> {
        match self.txs.get(tx_id) {
            Some(record) => Ok(record.clone()),
            None => self.parent()?.get_tx(tx_id),
        }
    }
}
