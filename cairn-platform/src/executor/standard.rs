use cairn_types::primitives::PRIMARY_NETWORK_ID;
use cairn_types::tx::{
    AddDelegatorTx, AddSubnetValidatorTx, AddValidatorTx, AdvanceTimeTx, CreateChainTx,
    CreateSubnetTx, ExportTx, ImportTx, RewardValidatorTx, Tx, TxStatus, TxVisitor,
};
use cairn_types::utxo::TransferableInput;

use super::spend::{
    consume, local_utxos, produce, verify_base, verify_spend, verify_subnet_auth,
};
use super::{AtomicEffects, Context};
use crate::error::PlatformError;
use crate::state::Diff;

const MAX_CHAIN_NAME_LEN: usize = 128;

/// Applies a decision transaction directly to a diff.
pub struct StandardTxExecutor<'a> {
    ctx: &'a Context,
    diff: &'a mut Diff,
    tx: &'a Tx,
    effects: AtomicEffects,
}

impl<'a> StandardTxExecutor<'a> {
    pub fn new(ctx: &'a Context, diff: &'a mut Diff, tx: &'a Tx) -> Self {
        Self {
            ctx,
            diff,
            tx,
            effects: AtomicEffects::default(),
        }
    }

    /// Execute the transaction, returning the shared-memory effects it
    /// produces on accept.
    pub fn execute(mut self) -> Result<AtomicEffects, PlatformError> {
        let tx = self.tx;
        tx.visit(&mut self)?;
        Ok(self.effects)
    }

    fn wrong_context(&self) -> Result<(), PlatformError> {
        Err(PlatformError::WrongTxContext {
            tx_type: self.tx.unsigned().name(),
        })
    }
}

impl TxVisitor for StandardTxExecutor<'_> {
    type Output = ();
    type Error = PlatformError;

    fn add_validator_tx(&mut self, _: &AddValidatorTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }

    fn add_subnet_validator_tx(&mut self, _: &AddSubnetValidatorTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }

    fn add_delegator_tx(&mut self, _: &AddDelegatorTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }

    fn create_chain_tx(&mut self, tx: &CreateChainTx) -> Result<(), PlatformError> {
        verify_base(self.ctx, &tx.base)?;
        let name = &tx.chain_name;
        if name.is_empty()
            || name.len() > MAX_CHAIN_NAME_LEN
            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
        {
            return Err(PlatformError::rejected(format!(
                "invalid chain name {:?}",
                name
            )));
        }
        if !tx.fx_ids.windows(2).all(|w| w[0] < w[1]) {
            return Err(PlatformError::rejected("fx ids must be sorted and unique"));
        }

        let credentials =
            verify_subnet_auth(&*self.diff, self.tx, &tx.subnet_id, &tx.subnet_auth)?;
        let utxos = local_utxos(&*self.diff, &tx.base.ins)?;
        verify_spend(
            self.ctx,
            &*self.diff,
            self.tx,
            &tx.base.ins,
            &utxos,
            credentials,
            &tx.base.outs,
            self.ctx.config.fees.create_chain_fee,
        )?;

        consume(self.diff, &tx.base.ins);
        produce(self.diff, self.tx.id(), &tx.base.outs, 0);
        self.diff.add_chain(tx.subnet_id, self.tx.id());
        self.diff.add_tx(self.tx, TxStatus::Committed);
        Ok(())
    }

    fn create_subnet_tx(&mut self, tx: &CreateSubnetTx) -> Result<(), PlatformError> {
        verify_base(self.ctx, &tx.base)?;
        if tx.owner.threshold as usize > tx.owner.keys.len() {
            return Err(PlatformError::rejected(
                "subnet owner threshold exceeds its key count",
            ));
        }
        let utxos = local_utxos(&*self.diff, &tx.base.ins)?;
        verify_spend(
            self.ctx,
            &*self.diff,
            self.tx,
            &tx.base.ins,
            &utxos,
            self.tx.credentials(),
            &tx.base.outs,
            self.ctx.config.fees.create_subnet_fee,
        )?;

        consume(self.diff, &tx.base.ins);
        produce(self.diff, self.tx.id(), &tx.base.outs, 0);
        self.diff.add_subnet(self.tx.id(), tx.owner.clone());
        self.diff.add_tx(self.tx, TxStatus::Committed);
        Ok(())
    }

    fn import_tx(&mut self, tx: &ImportTx) -> Result<(), PlatformError> {
        verify_base(self.ctx, &tx.base)?;
        if tx.source_chain == self.ctx.config.chain_id || tx.source_chain == PRIMARY_NETWORK_ID
        {
            return Err(PlatformError::rejected("cannot import from this chain"));
        }
        if tx.imported_inputs.is_empty() {
            return Err(PlatformError::rejected("import has no imported inputs"));
        }

        let imported_ids: Vec<_> = tx.imported_inputs.iter().map(|i| i.utxo_id).collect();
        let mut utxos = local_utxos(&*self.diff, &tx.base.ins)?;
        utxos.extend(
            self.ctx
                .shared_memory
                .get(&tx.source_chain, &imported_ids)?,
        );
        let ins: Vec<TransferableInput> = tx
            .base
            .ins
            .iter()
            .chain(&tx.imported_inputs)
            .cloned()
            .collect();
        verify_spend(
            self.ctx,
            &*self.diff,
            self.tx,
            &ins,
            &utxos,
            self.tx.credentials(),
            &tx.base.outs,
            self.ctx.config.fees.tx_fee,
        )?;

        consume(self.diff, &tx.base.ins);
        produce(self.diff, self.tx.id(), &tx.base.outs, 0);
        self.diff.add_tx(self.tx, TxStatus::Committed);

        self.effects.inputs.extend(imported_ids.iter().copied());
        self.effects
            .requests
            .entry(tx.source_chain)
            .or_default()
            .remove
            .extend(imported_ids);
        Ok(())
    }

    fn export_tx(&mut self, tx: &ExportTx) -> Result<(), PlatformError> {
        verify_base(self.ctx, &tx.base)?;
        if tx.destination_chain == self.ctx.config.chain_id
            || tx.destination_chain == PRIMARY_NETWORK_ID
        {
            return Err(PlatformError::rejected("cannot export to this chain"));
        }
        if tx.exported_outputs.is_empty() {
            return Err(PlatformError::rejected("export has no exported outputs"));
        }

        let utxos = local_utxos(&*self.diff, &tx.base.ins)?;
        verify_spend(
            self.ctx,
            &*self.diff,
            self.tx,
            &tx.base.ins,
            &utxos,
            self.tx.credentials(),
            tx.base.outs.iter().chain(&tx.exported_outputs),
            self.ctx.config.fees.tx_fee,
        )?;

        consume(self.diff, &tx.base.ins);
        produce(self.diff, self.tx.id(), &tx.base.outs, 0);
        self.diff.add_tx(self.tx, TxStatus::Committed);

        // Exported outputs are numbered after the local ones.
        let first = tx.base.outs.len() as u32;
        let exported = tx
            .exported_outputs
            .iter()
            .enumerate()
            .map(|(i, out)| out.to_utxo(self.tx.id(), first + i as u32));
        self.effects
            .requests
            .entry(tx.destination_chain)
            .or_default()
            .put
            .extend(exported);
        Ok(())
    }

    fn advance_time_tx(&mut self, _: &AdvanceTimeTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }

    fn reward_validator_tx(&mut self, _: &RewardValidatorTx) -> Result<(), PlatformError> {
        self.wrong_context()
    }
}
