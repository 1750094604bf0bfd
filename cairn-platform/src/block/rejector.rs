use std::sync::Arc;

use cairn_types::block::{Block, BlockStatus, BlockVisitor};
use cairn_types::tx::Tx;

use super::backend::Backend;
use crate::error::PlatformError;

/// Drops a block and everything built on it. The rejected block is
/// persisted so it can still be served by id.
pub(crate) struct Rejector<'a> {
    pub backend: &'a Arc<Backend>,
}

impl Rejector<'_> {
    fn reject(&self, block: &Block, kind: &'static str) -> Result<(), PlatformError> {
        let evicted = self.backend.reject(&block.id())?;
        let state = self.backend.state();
        state.add_block(block, BlockStatus::Rejected)?;
        state.commit()?;
        tracing::debug!(
            id = hex::encode(block.id()),
            height = block.height(),
            kind,
            evicted,
            "rejected block"
        );
        Ok(())
    }
}

impl BlockVisitor for Rejector<'_> {
    type Error = PlatformError;

    fn standard_block(&mut self, block: &Block, _: &[Tx]) -> Result<(), PlatformError> {
        self.reject(block, "standard")
    }

    fn proposal_block(&mut self, block: &Block, _: &Tx) -> Result<(), PlatformError> {
        self.reject(block, "proposal")
    }

    fn commit_block(&mut self, block: &Block) -> Result<(), PlatformError> {
        self.reject(block, "commit")
    }

    fn abort_block(&mut self, block: &Block) -> Result<(), PlatformError> {
        self.reject(block, "abort")
    }

    fn atomic_block(&mut self, block: &Block, _: &Tx) -> Result<(), PlatformError> {
        self.reject(block, "atomic")
    }
}
