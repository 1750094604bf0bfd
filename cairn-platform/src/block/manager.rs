use std::sync::{Arc, Mutex};

use cairn_types::block::{Block, BlockStatus};
use cairn_types::codec::codec;
use cairn_types::primitives::Id;
use cairn_types::tx::Tx;

use super::acceptor::Acceptor;
use super::backend::Backend;
use super::builder::Builder;
use super::rejector::Rejector;
use super::verifier::Verifier;
use crate::error::PlatformError;
use crate::executor::{Context, MempoolTxVerifier};
use crate::mempool::Mempool;
use crate::state::{Chain, State, Versions};

/// Entry point for consensus and the block builder.
///
/// Verification, acceptance, rejection and building are serialized by one
/// lock so that at most one writer touches the block index at a time.
pub struct Manager {
    ctx: Arc<Context>,
    backend: Arc<Backend>,
    mempool: Arc<dyn Mempool>,
    lock: Mutex<()>,
}

impl Manager {
    pub fn new(ctx: Arc<Context>, state: Arc<State>, mempool: Arc<dyn Mempool>) -> Self {
        Self {
            ctx,
            backend: Arc::new(Backend::new(state)),
            mempool,
            lock: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn last_accepted(&self) -> Result<Id, PlatformError> {
        self.backend.state().last_accepted()
    }

    pub fn get_block(&self, id: &Id) -> Result<Block, PlatformError> {
        self.backend.get_block(id)
    }

    /// State as of `block_id`, if it is verified or last accepted.
    pub fn get_state(&self, block_id: &Id) -> Option<Arc<dyn Chain>> {
        self.backend.get_state(block_id)
    }

    /// Decode a block with the bounded codec and verify it.
    pub fn verify(&self, bytes: &[u8]) -> Result<Block, PlatformError> {
        let block = Block::parse(codec(), bytes)?;
        self.verify_block(&block)?;
        Ok(block)
    }

    pub fn verify_block(&self, block: &Block) -> Result<(), PlatformError> {
        let _guard = self.lock.lock()?;
        if self.backend.is_processing(&block.id())? {
            return Ok(());
        }

        let mut verifier = Verifier {
            ctx: &self.ctx,
            backend: &self.backend,
        };
        match block.visit(&mut verifier) {
            Ok(()) => {
                tracing::debug!(
                    id = hex::encode(block.id()),
                    height = block.height(),
                    "verified block"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    id = hex::encode(block.id()),
                    height = block.height(),
                    error = %e,
                    "block verification failed"
                );
                Err(e)
            }
        }
    }

    /// Accept a verified block whose parent is the last accepted block.
    pub fn accept(&self, id: &Id) -> Result<(), PlatformError> {
        let _guard = self.lock.lock()?;
        let entry = self
            .backend
            .get_block_state(id)?
            .filter(|entry| entry.on_accept_state.is_some())
            .ok_or_else(|| PlatformError::invalid_block("accepting a block that is not verified"))?;
        let last_accepted = self.backend.state().last_accepted()?;
        if entry.block.parent() != last_accepted {
            return Err(PlatformError::invalid_block(format!(
                "parent {} is not the last accepted block {}",
                hex::encode(entry.block.parent()),
                hex::encode(last_accepted)
            )));
        }

        entry.block.visit(&mut Acceptor {
            ctx: &self.ctx,
            backend: &self.backend,
        })
    }

    /// Reject a processing block along with its descendants.
    ///
    /// Blocks already rejected, including those evicted when a competing
    /// block was accepted, are left as they are.
    pub fn reject(&self, id: &Id) -> Result<(), PlatformError> {
        let _guard = self.lock.lock()?;
        let Some(entry) = self.backend.get_block_state(id)? else {
            let (_, status) = self.backend.state().get_stateless_block(id)?;
            return match status {
                BlockStatus::Rejected => {
                    tracing::debug!(id = hex::encode(id), "block already rejected");
                    Ok(())
                }
                _ => Err(PlatformError::invalid_block(format!(
                    "rejecting block {} with status {status:?}",
                    hex::encode(id)
                ))),
            };
        };
        entry.block.visit(&mut Rejector {
            backend: &self.backend,
        })
    }

    /// The commit and abort blocks of a verified proposal, preferred first.
    pub fn options(&self, id: &Id) -> Result<[Block; 2], PlatformError> {
        let options = self
            .backend
            .get_options(id)?
            .ok_or_else(|| PlatformError::invalid_block("not a verified proposal block"))?;
        Ok(if options.prefers_commit {
            [options.commit, options.abort]
        } else {
            [options.abort, options.commit]
        })
    }

    /// Mempool admission of `tx` on top of `parent_id`.
    pub fn verify_tx(&self, parent_id: &Id, tx: &Tx) -> Result<(), PlatformError> {
        MempoolTxVerifier::new(&self.ctx, self.backend.clone(), *parent_id, tx).verify()
    }

    /// Build the next block on `parent_id` from the given mempool candidates.
    /// The block is returned unverified.
    pub fn build_block(&self, parent_id: &Id, candidates: &[Id]) -> Result<Block, PlatformError> {
        let _guard = self.lock.lock()?;
        let block = Builder {
            ctx: &self.ctx,
            backend: &self.backend,
            mempool: self.mempool.as_ref(),
        }
        .build(*parent_id, candidates)?;
        tracing::debug!(
            id = hex::encode(block.id()),
            height = block.height(),
            txs = block.txs().len(),
            "built block"
        );
        Ok(block)
    }
}
