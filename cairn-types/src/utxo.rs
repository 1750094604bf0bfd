use borsh::{BorshDeserialize, BorshSerialize};

use crate::primitives::{Amount, Id, PublicKey, Signature, Timestamp};

/// Location of an unspent output: the producing transaction and output index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct UtxoId {
    pub tx_id: Id,
    pub output_index: u32,
}

impl UtxoId {
    pub fn new(tx_id: Id, output_index: u32) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }
}

/// A threshold multisig owner set with an optional time lock.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct OutputOwners {
    /// Outputs are unspendable before this time.
    pub locktime: Timestamp,
    pub threshold: u32,
    pub keys: Vec<PublicKey>,
}

impl OutputOwners {
    /// A single-key owner with no lock.
    pub fn single(key: PublicKey) -> Self {
        Self {
            locktime: 0,
            threshold: 1,
            keys: vec![key],
        }
    }
}

/// An unspent transaction output.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub amount: Amount,
    pub owners: OutputOwners,
}

/// An output created by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferableOutput {
    pub asset_id: Id,
    pub amount: Amount,
    pub owners: OutputOwners,
}

impl TransferableOutput {
    /// The UTXO this output becomes once `tx_id` is applied.
    pub fn to_utxo(&self, tx_id: Id, output_index: u32) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(tx_id, output_index),
            asset_id: self.asset_id,
            amount: self.amount,
            owners: self.owners.clone(),
        }
    }
}

/// A reference to a UTXO being spent, with the owner key indices that sign for it.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub amount: Amount,
    /// Strictly increasing indices into the spent output's owner keys.
    pub sig_indices: Vec<u32>,
}

/// Signatures authorizing one input (or the subnet auth of a transaction).
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct Credential {
    pub signatures: Vec<Signature>,
}
