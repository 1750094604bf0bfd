use std::sync::Arc;

use cairn_types::block::{Block, BlockBody, BlockHeader, BlockVisitor};
use cairn_types::tx::Tx;

use super::backend::{Backend, BlockState, ProposalOptions};
use crate::error::PlatformError;
use crate::executor::{
    advance_time_to, verify_time_advance, AtomicEffects, AtomicTxExecutor, Context,
    ProposalTxExecutor, StandardTxExecutor,
};
use crate::state::{Chain, Diff, Versions};

/// Verifies a block against its parent's state and registers the result.
///
/// The parent must already have state: either it is processing and verified,
/// or it is the last accepted block.
pub(crate) struct Verifier<'a> {
    pub ctx: &'a Context,
    pub backend: &'a Arc<Backend>,
}

impl Verifier<'_> {
    fn versions(&self) -> Arc<dyn Versions> {
        self.backend.clone()
    }

    fn parent_state(&self, block: &Block) -> Result<Arc<dyn Chain>, PlatformError> {
        let parent_id = block.parent();
        self.backend
            .get_state(&parent_id)
            .ok_or(PlatformError::StateNotFound(parent_id))
    }

    /// Height continuity and whether the header must carry a time.
    fn verify_header(&self, block: &Block) -> Result<(), PlatformError> {
        let parent = self.backend.get_block(&block.parent())?;
        if block.height() != parent.height() + 1 {
            return Err(PlatformError::invalid_block(format!(
                "height {} does not follow parent height {}",
                block.height(),
                parent.height()
            )));
        }
        let parent_time = self.parent_state(block)?.timestamp()?;
        let timed = self.ctx.config.timed_blocks_active(parent_time);
        if block.header().is_timed() != timed {
            return Err(PlatformError::invalid_block(if timed {
                "block must carry a timestamp"
            } else {
                "timed blocks are not active yet"
            }));
        }
        Ok(())
    }

    /// A fresh diff on the parent, already moved to the header time if the
    /// block carries one.
    fn block_diff(&self, block: &Block) -> Result<Diff, PlatformError> {
        let mut diff = Diff::new(block.parent(), self.versions())?;
        if let Some(time) = block.timestamp() {
            verify_time_advance(self.ctx, &diff, time, true)?;
            advance_time_to(self.ctx, &mut diff, time)?;
        }
        Ok(diff)
    }

    fn check_ancestors(&self, block: &Block, effects: &AtomicEffects) -> Result<(), PlatformError> {
        if self
            .backend
            .conflicts_with_ancestors(&block.parent(), &effects.inputs)?
        {
            return Err(PlatformError::ConflictingAtomicInputs);
        }
        Ok(())
    }

    fn register(
        &self,
        block: &Block,
        diff: Diff,
        effects: AtomicEffects,
    ) -> Result<(), PlatformError> {
        let timestamp = diff.timestamp()?;
        self.backend.insert(BlockState {
            block: block.clone(),
            timestamp,
            on_accept_state: Some(Arc::new(diff)),
            effects,
        })
    }

    /// Build the commit and abort children of a verified proposal block.
    fn option_blocks(block: &Block) -> Result<(Block, Block), PlatformError> {
        let header = match block.header() {
            BlockHeader::Legacy { .. } => BlockHeader::Legacy {
                parent: block.id(),
                height: block.height() + 1,
            },
            BlockHeader::Timed { time, .. } => BlockHeader::Timed {
                parent: block.id(),
                height: block.height() + 1,
                time: *time,
            },
        };
        Ok((
            Block::new(header.clone(), BlockBody::Commit)?,
            Block::new(header, BlockBody::Abort)?,
        ))
    }

    fn propose(&self, block: &Block, tx: &Tx) -> Result<(), PlatformError> {
        let outcome =
            ProposalTxExecutor::new(self.ctx, self.versions(), block.id(), tx).execute()?;
        let (commit, abort) = Self::option_blocks(block)?;
        let on_commit = Arc::new(outcome.on_commit);
        let on_abort = Arc::new(outcome.on_abort);

        for (option, diff) in [(&commit, &on_commit), (&abort, &on_abort)] {
            self.backend.insert(BlockState {
                block: option.clone(),
                timestamp: diff.timestamp()?,
                on_accept_state: None,
                    effects: AtomicEffects::default(),
            })?;
        }
        self.backend.set_options(
            &block.id(),
            ProposalOptions {
                commit,
                abort,
                on_commit,
                on_abort,
                prefers_commit: outcome.prefers_commit,
            },
        )
    }

    fn option(&self, block: &Block, commit: bool) -> Result<(), PlatformError> {
        let options = self
            .backend
            .get_options(&block.parent())?
            .ok_or_else(|| {
                PlatformError::invalid_block("parent is not a verified proposal block")
            })?;
        let (expected, diff) = if commit {
            (&options.commit, &options.on_commit)
        } else {
            (&options.abort, &options.on_abort)
        };
        if expected.id() != block.id() {
            return Err(PlatformError::invalid_block(
                "option block does not match its proposal",
            ));
        }
        self.backend
            .set_on_accept_state(block, diff.clone(), diff.timestamp()?)
    }
}

impl BlockVisitor for Verifier<'_> {
    type Error = PlatformError;

    fn standard_block(&mut self, block: &Block, txs: &[Tx]) -> Result<(), PlatformError> {
        self.verify_header(block)?;
        if txs.is_empty() && !block.header().is_timed() {
            return Err(PlatformError::invalid_block("standard block has no transactions"));
        }

        let mut diff = self.block_diff(block)?;
        let mut effects = AtomicEffects::default();
        for tx in txs {
            let tx_effects = StandardTxExecutor::new(self.ctx, &mut diff, tx).execute()?;
            if !effects.inputs.is_disjoint(&tx_effects.inputs) {
                return Err(PlatformError::ConflictingAtomicInputs);
            }
            effects.merge(tx_effects);
        }
        self.check_ancestors(block, &effects)?;
        self.register(block, diff, effects)
    }

    fn proposal_block(&mut self, block: &Block, tx: &Tx) -> Result<(), PlatformError> {
        self.verify_header(block)?;
        let diff = self.block_diff(block)?;
        self.register(block, diff, AtomicEffects::default())?;

        // The executor resolves its parent through the block just registered.
        let result = self.propose(block, tx);
        if result.is_err() {
            self.backend.reject(&block.id())?;
        }
        result
    }

    fn commit_block(&mut self, block: &Block) -> Result<(), PlatformError> {
        self.option(block, true)
    }

    fn abort_block(&mut self, block: &Block) -> Result<(), PlatformError> {
        self.option(block, false)
    }

    fn atomic_block(&mut self, block: &Block, tx: &Tx) -> Result<(), PlatformError> {
        if block.header().is_timed() {
            return Err(PlatformError::invalid_block(
                "atomic blocks are replaced by standard blocks once timed blocks are active",
            ));
        }
        self.verify_header(block)?;

        let mut diff = self.block_diff(block)?;
        let effects = AtomicTxExecutor::new(self.ctx, &mut diff, tx).execute()?;
        self.check_ancestors(block, &effects)?;
        self.register(block, diff, effects)
    }
}
