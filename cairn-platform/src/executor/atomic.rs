use cairn_types::tx::{
    AddDelegatorTx, AddSubnetValidatorTx, AddValidatorTx, AdvanceTimeTx, CreateChainTx,
    CreateSubnetTx, ExportTx, ImportTx, RewardValidatorTx, Tx, TxVisitor,
};

use super::standard::StandardTxExecutor;
use super::{AtomicEffects, Context};
use crate::error::PlatformError;
use crate::state::Diff;

/// Executes the single import or export transaction of an atomic block.
pub struct AtomicTxExecutor<'a> {
    ctx: &'a Context,
    diff: &'a mut Diff,
    tx: &'a Tx,
}

impl<'a> AtomicTxExecutor<'a> {
    pub fn new(ctx: &'a Context, diff: &'a mut Diff, tx: &'a Tx) -> Self {
        Self { ctx, diff, tx }
    }

    pub fn execute(mut self) -> Result<AtomicEffects, PlatformError> {
        let tx = self.tx;
        tx.visit(&mut self)
    }

    fn standard(&mut self) -> Result<AtomicEffects, PlatformError> {
        StandardTxExecutor::new(self.ctx, self.diff, self.tx).execute()
    }

    fn wrong_context(&self) -> Result<AtomicEffects, PlatformError> {
        Err(PlatformError::WrongTxContext {
            tx_type: self.tx.unsigned().name(),
        })
    }
}

impl TxVisitor for AtomicTxExecutor<'_> {
    type Output = AtomicEffects;
    type Error = PlatformError;

    fn add_validator_tx(&mut self, _: &AddValidatorTx) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }

    fn add_subnet_validator_tx(
        &mut self,
        _: &AddSubnetValidatorTx,
    ) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }

    fn add_delegator_tx(&mut self, _: &AddDelegatorTx) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }

    fn create_chain_tx(&mut self, _: &CreateChainTx) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }

    fn create_subnet_tx(&mut self, _: &CreateSubnetTx) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }

    fn import_tx(&mut self, _: &ImportTx) -> Result<AtomicEffects, PlatformError> {
        self.standard()
    }

    fn export_tx(&mut self, _: &ExportTx) -> Result<AtomicEffects, PlatformError> {
        self.standard()
    }

    fn advance_time_tx(&mut self, _: &AdvanceTimeTx) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }

    fn reward_validator_tx(
        &mut self,
        _: &RewardValidatorTx,
    ) -> Result<AtomicEffects, PlatformError> {
        self.wrong_context()
    }
}
