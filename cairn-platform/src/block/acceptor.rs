use std::sync::Arc;

use cairn_types::block::{Block, BlockVisitor};
use cairn_types::tx::Tx;

use super::backend::Backend;
use crate::error::PlatformError;
use crate::executor::Context;

/// Writes a verified block's state into the base state and persists it.
///
/// The caller has already checked that the block's parent is the last
/// accepted block. Either every effect of the block lands or none does: the
/// ledger write, the shared memory requests and the block records all go
/// through one commit inside [`Backend::accept`].
pub(crate) struct Acceptor<'a> {
    pub ctx: &'a Context,
    pub backend: &'a Arc<Backend>,
}

impl Acceptor<'_> {
    fn accept(&self, block: &Block, kind: &'static str) -> Result<(), PlatformError> {
        let state = self.backend.state();
        let evicted = self.backend.accept(&block.id(), |entry, conflicting| {
            let diff = entry
                .on_accept_state
                .as_ref()
                .ok_or(PlatformError::StateNotFound(block.id()))?;
            state.accept_block(
                block,
                diff,
                conflicting,
                self.ctx.shared_memory.as_ref(),
                &entry.effects.requests,
            )
        })?;

        tracing::info!(
            id = hex::encode(block.id()),
            height = block.height(),
            kind,
            txs = block.txs().len(),
            evicted,
            "accepted block"
        );
        Ok(())
    }
}

impl BlockVisitor for Acceptor<'_> {
    type Error = PlatformError;

    fn standard_block(&mut self, block: &Block, _: &[Tx]) -> Result<(), PlatformError> {
        self.accept(block, "standard")
    }

    fn proposal_block(&mut self, block: &Block, _: &Tx) -> Result<(), PlatformError> {
        // Only the time advance, if any, lands now; the transaction's effect
        // waits for the commit or abort child.
        self.accept(block, "proposal")
    }

    fn commit_block(&mut self, block: &Block) -> Result<(), PlatformError> {
        self.accept(block, "commit")
    }

    fn abort_block(&mut self, block: &Block) -> Result<(), PlatformError> {
        self.accept(block, "abort")
    }

    fn atomic_block(&mut self, block: &Block, _: &Tx) -> Result<(), PlatformError> {
        self.accept(block, "atomic")
    }
}
