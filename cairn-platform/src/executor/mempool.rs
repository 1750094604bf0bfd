use std::sync::Arc;

use cairn_types::constants::MAX_MEMPOOL_START_TIME;
use cairn_types::primitives::Id;
use cairn_types::tx::{
    AddDelegatorTx, AddSubnetValidatorTx, AddValidatorTx, AdvanceTimeTx, CreateChainTx,
    CreateSubnetTx, ExportTx, ImportTx, RewardValidatorTx, Tx, TxVisitor,
};

use super::proposal::ProposalTxExecutor;
use super::standard::StandardTxExecutor;
use super::Context;
use crate::error::PlatformError;
use crate::state::{Diff, Versions};

/// Decides whether a transaction may enter the mempool.
///
/// Runs the strict executors against throwaway diffs on top of `parent_id`,
/// so no registered state is touched. A staker whose start time is too far
/// ahead of chain time is still admitted, as long as the start is within
/// [`MAX_MEMPOOL_START_TIME`] of the local clock. It becomes executable once
/// the chain catches up.
pub struct MempoolTxVerifier<'a> {
    ctx: &'a Context,
    versions: Arc<dyn Versions>,
    parent_id: Id,
    tx: &'a Tx,
}

impl<'a> MempoolTxVerifier<'a> {
    pub fn new(ctx: &'a Context, versions: Arc<dyn Versions>, parent_id: Id, tx: &'a Tx) -> Self {
        Self {
            ctx,
            versions,
            parent_id,
            tx,
        }
    }

    pub fn verify(mut self) -> Result<(), PlatformError> {
        let tx = self.tx;
        tx.visit(&mut self)
    }

    fn staker(&self) -> Result<(), PlatformError> {
        let result =
            ProposalTxExecutor::new(self.ctx, self.versions.clone(), self.parent_id, self.tx)
                .execute();
        match result {
            Ok(_) => Ok(()),
            Err(PlatformError::PrematureStake {
                start_time,
                max_start_time,
            }) => {
                let limit = self.ctx.clock.now().saturating_add(MAX_MEMPOOL_START_TIME);
                if start_time > limit {
                    return Err(PlatformError::rejected(format!(
                        "staker start time {start_time} is past the mempool limit {limit}"
                    )));
                }
                tracing::debug!(
                    tx_id = hex::encode(self.tx.id()),
                    start_time,
                    max_start_time,
                    "admitting staker ahead of its start window"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn decision(&self) -> Result<(), PlatformError> {
        let mut diff = Diff::new(self.parent_id, self.versions.clone())?;
        StandardTxExecutor::new(self.ctx, &mut diff, self.tx)
            .execute()
            .map(|_| ())
    }

    fn wrong_context(&self) -> Result<(), PlatformError> {
        Err(PlatformError::WrongTxContext {
            tx_type: self.tx.unsigned().name(),
        })
    }
}

impl TxVisitor for MempoolTxVerifier<'_> {
    type Output = ();
    type Error = PlatformError;

    fn add_validator_tx(&mut self, _: &AddValidatorTx) -> Result<(), PlatformError> {
        self.staker()
    }

    fn add_subnet_validator_tx(&mut self, _: &AddSubnetValidatorTx) -> Result<(), PlatformError> {
        self.staker()
    }

    fn add_delegator_tx(&mut self, _: &AddDelegatorTx) -> Result<(), PlatformError> {
        self.staker()
    }

    fn create_chain_tx(&mut self, _: &CreateChainTx) -> Result<(), PlatformError> {
        self.decision()
    }

    fn create_subnet_tx(&mut self, _: &CreateSubnetTx) -> Result<(), PlatformError> {
        self.decision()
    }

    fn import_tx(&mut self, _: &ImportTx) -> Result<(), PlatformError> {
        self.decision()
    }

    fn export_tx(&mut self, _: &ExportTx) -> Result<(), PlatformError> {
        self.decision()
    }

    fn advance_time_tx(&mut self, _: &AdvanceTimeTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }

    fn reward_validator_tx(&mut self, _: &RewardValidatorTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }
}
