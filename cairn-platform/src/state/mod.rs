//! Ledger state: the committed base and the uncommitted diffs layered on it.
//!
//! Every processing block owns a [`Diff`] that refers to its parent by block
//! id. Reads that miss the diff's own overlay are resolved through
//! [`Versions`] at read time, so once the parent is accepted the lookup lands
//! on the committed [`State`] instead.

mod base;
mod diff;

use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};

use cairn_types::primitives::{Amount, Id, NodeId, Timestamp};
use cairn_types::staker::Staker;
use cairn_types::tx::{Tx, TxStatus};
use cairn_types::utxo::{OutputOwners, Utxo, UtxoId};

use crate::error::PlatformError;

pub use base::{Ledger, StakerSet, State};
pub use diff::Diff;

/// A transaction applied to the ledger and how it resolved.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TxRecord {
    pub tx: Tx,
    pub status: TxStatus,
}

/// Read access to ledger state as of some block.
pub trait Chain: Send + Sync {
    fn timestamp(&self) -> Result<Timestamp, PlatformError>;
    fn current_supply(&self) -> Result<Amount, PlatformError>;

    fn get_current_validator(&self, subnet_id: &Id, node_id: &NodeId)
        -> Result<Staker, PlatformError>;
    fn get_pending_validator(&self, subnet_id: &Id, node_id: &NodeId)
        -> Result<Staker, PlatformError>;
    /// Current delegators of a primary network validator.
    fn current_delegators(&self, node_id: &NodeId) -> Result<Vec<Staker>, PlatformError>;
    /// Pending delegators of a primary network validator.
    fn pending_delegators(&self, node_id: &NodeId) -> Result<Vec<Staker>, PlatformError>;
    /// All current stakers in removal order.
    fn current_stakers(&self) -> Result<Vec<Staker>, PlatformError>;
    /// All pending stakers in promotion order.
    fn pending_stakers(&self) -> Result<Vec<Staker>, PlatformError>;

    fn get_utxo(&self, utxo_id: &UtxoId) -> Result<Utxo, PlatformError>;
    fn get_subnet_owner(&self, subnet_id: &Id) -> Result<OutputOwners, PlatformError>;
    fn get_chains(&self, subnet_id: &Id) -> Result<Vec<Id>, PlatformError>;
    fn get_tx(&self, tx_id: &Id) -> Result<TxRecord, PlatformError>;
}

/// Resolves a block id to the state as of that block.
pub trait Versions: Send + Sync {
    fn get_state(&self, block_id: &Id) -> Option<Arc<dyn Chain>>;
}

pub(crate) fn validator_not_found(subnet_id: &Id, node_id: &NodeId) -> PlatformError {
    PlatformError::not_found(format!(
        "validator {} on subnet {}",
        hex::encode(node_id),
        hex::encode(subnet_id)
    ))
}

pub(crate) fn utxo_not_found(utxo_id: &UtxoId) -> PlatformError {
    PlatformError::not_found(format!(
        "utxo {}:{}",
        hex::encode(utxo_id.tx_id),
        utxo_id.output_index
    ))
}

pub(crate) fn subnet_not_found(subnet_id: &Id) -> PlatformError {
    PlatformError::not_found(format!("subnet {}", hex::encode(subnet_id)))
}

pub(crate) fn tx_not_found(tx_id: &Id) -> PlatformError {
    PlatformError::not_found(format!("tx {}", hex::encode(tx_id)))
}
