//! Chooses the next block to propose on top of a given parent.

use std::collections::BTreeSet;
use std::sync::Arc;

use cairn_types::block::{Block, BlockBody, BlockHeader};
use cairn_types::constants::MAX_BLOCK_SIZE;
use cairn_types::primitives::{Id, Timestamp};
use cairn_types::tx::{AdvanceTimeTx, RewardValidatorTx, Tx, UnsignedTx};
use cairn_types::utxo::UtxoId;

use super::backend::Backend;
use crate::error::PlatformError;
use crate::executor::{
    advance_time_to, next_staker_change_time, AtomicEffects, Context, ProposalTxExecutor,
    StandardTxExecutor,
};
use crate::mempool::Mempool;
use crate::state::{Chain, Diff, Versions};

/// Room left in a block for everything but the transactions.
const BLOCK_OVERHEAD: usize = 1024;

pub(crate) struct Builder<'a> {
    pub ctx: &'a Context,
    pub backend: &'a Arc<Backend>,
    pub mempool: &'a dyn Mempool,
}

struct Parent {
    id: Id,
    height: u64,
    time: Timestamp,
    timed: bool,
    state: Arc<dyn Chain>,
}

impl Parent {
    fn header(&self, time: Timestamp) -> BlockHeader {
        if self.timed {
            BlockHeader::Timed {
                parent: self.id,
                height: self.height + 1,
                time,
            }
        } else {
            BlockHeader::Legacy {
                parent: self.id,
                height: self.height + 1,
            }
        }
    }
}

impl Builder<'_> {
    /// Build, in order of preference: a standard block of decision
    /// transactions, a reward proposal for the staker due now, a time
    /// advance, or a proposal for the first executable staker transaction.
    pub fn build(&self, parent_id: Id, candidates: &[Id]) -> Result<Block, PlatformError> {
        let state = self
            .backend
            .get_state(&parent_id)
            .ok_or(PlatformError::StateNotFound(parent_id))?;
        let time = state.timestamp()?;
        let parent = Parent {
            id: parent_id,
            height: self.backend.get_block(&parent_id)?.height(),
            time,
            timed: self.ctx.config.timed_blocks_active(time),
            state,
        };

        let txs: Vec<Tx> = candidates
            .iter()
            .filter_map(|id| self.mempool.get(id))
            .collect();

        if let Some(block) = self.decision_block(&parent, &txs)? {
            return Ok(block);
        }
        if let Some(block) = self.reward_block(&parent)? {
            return Ok(block);
        }
        if let Some(block) = self.advance_time_block(&parent)? {
            return Ok(block);
        }
        if let Some(block) = self.staker_block(&parent, &txs)? {
            return Ok(block);
        }
        Err(PlatformError::NoPendingBlocks)
    }

    /// Header time for a timed block carrying decision transactions: local
    /// time, held between the parent time and the next staker change.
    fn decision_time(&self, parent: &Parent) -> Result<Timestamp, PlatformError> {
        let mut time = self.ctx.clock.now().max(parent.time);
        if let Some(next) = next_staker_change_time(parent.state.as_ref())? {
            time = time.min(next.max(parent.time));
        }
        Ok(time)
    }

    fn decision_block(&self, parent: &Parent, txs: &[Tx]) -> Result<Option<Block>, PlatformError> {
        let time = if parent.timed {
            self.decision_time(parent)?
        } else {
            parent.time
        };
        let versions: Arc<dyn Versions> = self.backend.clone();
        let mut diff = Diff::new(parent.id, versions)?;
        if parent.timed {
            advance_time_to(self.ctx, &mut diff, time)?;
        }

        let mut selected = Vec::new();
        let mut size = 0;
        let mut effects = AtomicEffects::default();
        for tx in txs.iter().filter(|tx| tx.unsigned().is_decision()) {
            if diff.get_tx(&tx.id()).is_ok() {
                self.mempool
                    .mark_dropped(tx.id(), "already included".to_string());
                continue;
            }
            let tx_size = tx.bytes()?.len();
            if size + tx_size > MAX_BLOCK_SIZE - BLOCK_OVERHEAD {
                break;
            }
            let imported: BTreeSet<UtxoId> = match tx.unsigned() {
                UnsignedTx::Import(import) => {
                    import.imported_inputs.iter().map(|i| i.utxo_id).collect()
                }
                _ => BTreeSet::new(),
            };
            if !effects.inputs.is_disjoint(&imported)
                || self.backend.conflicts_with_ancestors(&parent.id, &imported)?
            {
                // May become valid if the conflicting block is rejected.
                tracing::debug!(tx_id = hex::encode(tx.id()), "skipping conflicting import");
                continue;
            }
            // Executors check everything before writing, so a failure leaves
            // the scratch diff untouched.
            let tx_effects = match StandardTxExecutor::new(self.ctx, &mut diff, tx).execute() {
                Ok(tx_effects) => tx_effects,
                Err(e) => {
                    tracing::debug!(tx_id = hex::encode(tx.id()), error = %e, "dropping tx");
                    self.mempool.mark_dropped(tx.id(), e.to_string());
                    continue;
                }
            };
            effects.merge(tx_effects);
            size += tx_size;
            selected.push(tx.clone());
        }

        if selected.is_empty() {
            return Ok(None);
        }
        let block = Block::new(parent.header(time), BlockBody::Standard { txs: selected })?;
        Ok(Some(block))
    }

    fn reward_block(&self, parent: &Parent) -> Result<Option<Block>, PlatformError> {
        let Some(staker) = parent.state.current_stakers()?.into_iter().next() else {
            return Ok(None);
        };
        if staker.end_time != parent.time {
            return Ok(None);
        }
        let tx = Tx::new(
            UnsignedTx::RewardValidator(RewardValidatorTx {
                tx_id: staker.tx_id,
            }),
            vec![],
        )?;
        let block = Block::new(parent.header(parent.time), BlockBody::Proposal { tx })?;
        Ok(Some(block))
    }

    fn advance_time_block(&self, parent: &Parent) -> Result<Option<Block>, PlatformError> {
        let Some(next) = next_staker_change_time(parent.state.as_ref())? else {
            return Ok(None);
        };
        if next <= parent.time || next > self.ctx.clock.now() {
            return Ok(None);
        }
        let body = if parent.timed {
            BlockBody::Standard { txs: vec![] }
        } else {
            BlockBody::Proposal {
                tx: Tx::new(UnsignedTx::AdvanceTime(AdvanceTimeTx { time: next }), vec![])?,
            }
        };
        Ok(Some(Block::new(parent.header(next), body)?))
    }

    /// The first staker transaction that would execute now. Stakers whose
    /// start is still too far ahead stay in the mempool.
    fn staker_block(&self, parent: &Parent, txs: &[Tx]) -> Result<Option<Block>, PlatformError> {
        for tx in txs.iter().filter(|tx| tx.unsigned().staker().is_some()) {
            if parent.state.get_tx(&tx.id()).is_ok() {
                self.mempool
                    .mark_dropped(tx.id(), "already included".to_string());
                continue;
            }
            let result =
                ProposalTxExecutor::new(self.ctx, self.backend.clone(), parent.id, tx).execute();
            match result {
                Ok(_) => {
                    let body = BlockBody::Proposal { tx: tx.clone() };
                    return Ok(Some(Block::new(parent.header(parent.time), body)?));
                }
                Err(PlatformError::PrematureStake { .. }) => {
                    tracing::debug!(tx_id = hex::encode(tx.id()), "staker not yet executable");
                }
                Err(e) => {
                    tracing::debug!(tx_id = hex::encode(tx.id()), error = %e, "dropping tx");
                    self.mempool.mark_dropped(tx.id(), e.to_string());
                }
            }
        }
        Ok(None)
    }
}
