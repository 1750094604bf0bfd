use std::cmp::Ordering;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::primitives::{Amount, Id, NodeId, Timestamp, PRIMARY_NETWORK_ID};
use crate::tx::{Tx, UnsignedTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub enum StakerKind {
    PrimaryValidator,
    PrimaryDelegator,
    SubnetValidator,
}

impl StakerKind {
    /// Tie-break among stakers leaving at the same time: delegators first,
    /// primary validators last.
    fn removal_rank(self) -> u8 {
        match self {
            StakerKind::PrimaryDelegator => 0,
            StakerKind::SubnetValidator => 1,
            StakerKind::PrimaryValidator => 2,
        }
    }

    /// Tie-break among stakers starting at the same time: primary validators
    /// first, so delegations and subnet validators always find them.
    fn promotion_rank(self) -> u8 {
        match self {
            StakerKind::PrimaryValidator => 0,
            StakerKind::PrimaryDelegator => 1,
            StakerKind::SubnetValidator => 2,
        }
    }

    pub fn is_validator(self) -> bool {
        !matches!(self, StakerKind::PrimaryDelegator)
    }

    pub fn earns_reward(self) -> bool {
        !matches!(self, StakerKind::SubnetValidator)
    }
}

/// A validator or delegator in the current or pending set.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Staker {
    pub tx_id: Id,
    pub node_id: NodeId,
    pub subnet_id: Id,
    pub weight: Amount,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub potential_reward: Amount,
    pub kind: StakerKind,
}

impl Staker {
    /// The staker a staker transaction adds, or `None` for other kinds.
    pub fn from_tx(tx: &Tx, potential_reward: Amount) -> Option<Self> {
        let (validator, subnet_id, kind) = match tx.unsigned() {
            UnsignedTx::AddValidator(t) => (
                &t.validator,
                PRIMARY_NETWORK_ID,
                StakerKind::PrimaryValidator,
            ),
            UnsignedTx::AddDelegator(t) => (
                &t.validator,
                PRIMARY_NETWORK_ID,
                StakerKind::PrimaryDelegator,
            ),
            UnsignedTx::AddSubnetValidator(t) => {
                (&t.validator, t.subnet_id, StakerKind::SubnetValidator)
            }
            _ => return None,
        };
        Some(Self {
            tx_id: tx.id(),
            node_id: validator.node_id,
            subnet_id,
            weight: validator.weight,
            start_time: validator.start,
            end_time: validator.end,
            potential_reward,
            kind,
        })
    }

    /// Order in which current stakers leave the set.
    pub fn cmp_removal(&self, other: &Self) -> Ordering {
        (self.end_time, self.kind.removal_rank(), self.tx_id).cmp(&(
            other.end_time,
            other.kind.removal_rank(),
            other.tx_id,
        ))
    }

    /// Order in which pending stakers join the current set.
    pub fn cmp_promotion(&self, other: &Self) -> Ordering {
        (self.start_time, self.kind.promotion_rank(), self.tx_id).cmp(&(
            other.start_time,
            other.kind.promotion_rank(),
            other.tx_id,
        ))
    }
}
