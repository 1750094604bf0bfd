use std::sync::Arc;

use cairn_types::constants::{
    MAX_FUTURE_START_TIME, MAX_VALIDATOR_WEIGHT_FACTOR, PERCENT_DENOMINATOR,
};
use cairn_types::primitives::{Amount, Id, PRIMARY_NETWORK_ID};
use cairn_types::staker::{Staker, StakerKind};
use cairn_types::tx::{
    AddDelegatorTx, AddSubnetValidatorTx, AddValidatorTx, AdvanceTimeTx, BaseTx, CreateChainTx,
    CreateSubnetTx, ExportTx, ImportTx, RewardValidatorTx, Tx, TxStatus, TxVisitor, UnsignedTx,
    Validator,
};
use cairn_types::utxo::{OutputOwners, TransferableOutput};

use super::spend::{
    consume, local_utxos, produce, verify_base, verify_spend, verify_subnet_auth,
};
use super::staker::{advance_time_to, verify_time_advance};
use super::Context;
use crate::error::PlatformError;
use crate::state::{Chain, Diff, Versions};

/// The two possible results of a proposal transaction, both layered on the
/// proposal block.
#[derive(Debug)]
pub struct ProposalOutcome {
    pub on_commit: Diff,
    pub on_abort: Diff,
    /// Whether this node would vote for the commit block.
    pub prefers_commit: bool,
}

/// Executes staker, advance-time and reward transactions.
pub struct ProposalTxExecutor<'a> {
    ctx: &'a Context,
    versions: Arc<dyn Versions>,
    /// The block both outcome diffs are layered on.
    parent_id: Id,
    tx: &'a Tx,
}

impl<'a> ProposalTxExecutor<'a> {
    pub fn new(
        ctx: &'a Context,
        versions: Arc<dyn Versions>,
        parent_id: Id,
        tx: &'a Tx,
    ) -> Self {
        Self {
            ctx,
            versions,
            parent_id,
            tx,
        }
    }

    pub fn execute(mut self) -> Result<ProposalOutcome, PlatformError> {
        let tx = self.tx;
        tx.visit(&mut self)
    }

    fn parent(&self) -> Result<Arc<dyn Chain>, PlatformError> {
        self.versions
            .get_state(&self.parent_id)
            .ok_or(PlatformError::StateNotFound(self.parent_id))
    }

    fn outcome_diffs(&self) -> Result<(Diff, Diff), PlatformError> {
        Ok((
            Diff::new(self.parent_id, self.versions.clone())?,
            Diff::new(self.parent_id, self.versions.clone())?,
        ))
    }

    fn wrong_context(&self) -> Result<ProposalOutcome, PlatformError> {
        Err(PlatformError::WrongTxContext {
            tx_type: self.tx.unsigned().name(),
        })
    }

    /// Start strictly after chain time and a duration within the configured bounds.
    fn verify_staking_period(
        &self,
        chain: &dyn Chain,
        validator: &Validator,
    ) -> Result<(), PlatformError> {
        let staking = &self.ctx.config.staking;
        if validator.end <= validator.start {
            return Err(PlatformError::InvalidStake {
                reason: "end time must be after start time".to_string(),
            });
        }
        let duration = validator.duration();
        if duration < staking.min_stake_duration || duration > staking.max_stake_duration {
            return Err(PlatformError::InvalidStake {
                reason: format!(
                    "duration {}s outside [{}, {}]",
                    duration, staking.min_stake_duration, staking.max_stake_duration
                ),
            });
        }
        let now = chain.timestamp()?;
        if validator.start <= now {
            return Err(PlatformError::InvalidStake {
                reason: format!(
                    "start time {} is not after chain time {}",
                    validator.start, now
                ),
            });
        }
        Ok(())
    }

    /// The last staker check, run only once everything else has passed so
    /// that callers tolerating it know the transaction is otherwise valid.
    fn verify_not_premature(
        &self,
        chain: &dyn Chain,
        validator: &Validator,
    ) -> Result<(), PlatformError> {
        let max_start_time = chain.timestamp()?.saturating_add(MAX_FUTURE_START_TIME);
        if validator.start > max_start_time {
            return Err(PlatformError::PrematureStake {
                start_time: validator.start,
                max_start_time,
            });
        }
        Ok(())
    }

    /// Commit adds the staker to the pending set; abort refunds the stake.
    fn staker_outcome(
        &self,
        base: &BaseTx,
        stake: &[TransferableOutput],
    ) -> Result<ProposalOutcome, PlatformError> {
        let staker = Staker::from_tx(self.tx, 0).ok_or(PlatformError::WrongTxContext {
            tx_type: self.tx.unsigned().name(),
        })?;
        let prefers_commit = staker.start_time > self.ctx.clock.now();
        let tx_id = self.tx.id();
        let (mut on_commit, mut on_abort) = self.outcome_diffs()?;

        for diff in [&mut on_commit, &mut on_abort] {
            consume(diff, &base.ins);
            produce(diff, tx_id, &base.outs, 0);
        }
        on_commit.put_pending_staker(staker);
        on_commit.add_tx(self.tx, TxStatus::Committed);

        produce(&mut on_abort, tx_id, stake, base.outs.len() as u32);
        on_abort.add_tx(self.tx, TxStatus::Aborted);

        Ok(ProposalOutcome {
            on_commit,
            on_abort,
            prefers_commit,
        })
    }

    /// The current or pending primary validator on `node_id`.
    fn primary_validator(
        &self,
        chain: &dyn Chain,
        validator: &Validator,
    ) -> Result<Staker, PlatformError> {
        chain
            .get_current_validator(&PRIMARY_NETWORK_ID, &validator.node_id)
            .or_else(|_| chain.get_pending_validator(&PRIMARY_NETWORK_ID, &validator.node_id))
            .map_err(|_| PlatformError::InvalidStake {
                reason: format!(
                    "{} is not a primary network validator",
                    hex::encode(validator.node_id)
                ),
            })
    }
}

fn stake_weight(stake: &[TransferableOutput]) -> Result<Amount, PlatformError> {
    stake.iter().try_fold(0u64, |acc, out| {
        acc.checked_add(out.amount)
            .ok_or_else(|| PlatformError::InvalidStake {
                reason: "stake total overflows".to_string(),
            })
    })
}

fn contains_period(staker: &Staker, validator: &Validator) -> bool {
    validator.start >= staker.start_time && validator.end <= staker.end_time
}

impl TxVisitor for ProposalTxExecutor<'_> {
    type Output = ProposalOutcome;
    type Error = PlatformError;

    fn add_validator_tx(&mut self, tx: &AddValidatorTx) -> Result<ProposalOutcome, PlatformError> {
        let staking = &self.ctx.config.staking;
        let parent = self.parent()?;
        verify_base(self.ctx, &tx.base)?;
        self.verify_staking_period(parent.as_ref(), &tx.validator)?;

        let weight = stake_weight(&tx.stake)?;
        if weight != tx.validator.weight {
            return Err(PlatformError::InvalidStake {
                reason: format!("staked {} but declared weight {}", weight, tx.validator.weight),
            });
        }
        if weight < staking.min_validator_stake || weight > staking.max_validator_stake {
            return Err(PlatformError::InvalidStake {
                reason: format!(
                    "validator weight {} outside [{}, {}]",
                    weight, staking.min_validator_stake, staking.max_validator_stake
                ),
            });
        }
        if tx.delegation_shares < staking.min_delegation_fee
            || u64::from(tx.delegation_shares) > PERCENT_DENOMINATOR
        {
            return Err(PlatformError::InvalidStake {
                reason: format!("delegation shares {} out of range", tx.delegation_shares),
            });
        }

        let node_id = &tx.validator.node_id;
        if parent
            .get_current_validator(&PRIMARY_NETWORK_ID, node_id)
            .is_ok()
            || parent
                .get_pending_validator(&PRIMARY_NETWORK_ID, node_id)
                .is_ok()
        {
            return Err(PlatformError::InvalidStake {
                reason: format!("{} is already a validator", hex::encode(node_id)),
            });
        }

        let utxos = local_utxos(parent.as_ref(), &tx.base.ins)?;
        verify_spend(
            self.ctx,
            parent.as_ref(),
            self.tx,
            &tx.base.ins,
            &utxos,
            self.tx.credentials(),
            tx.base.outs.iter().chain(&tx.stake),
            self.ctx.config.fees.add_primary_validator_fee,
        )?;
        self.verify_not_premature(parent.as_ref(), &tx.validator)?;

        self.staker_outcome(&tx.base, &tx.stake)
    }

    fn add_subnet_validator_tx(
        &mut self,
        tx: &AddSubnetValidatorTx,
    ) -> Result<ProposalOutcome, PlatformError> {
        let parent = self.parent()?;
        verify_base(self.ctx, &tx.base)?;
        self.verify_staking_period(parent.as_ref(), &tx.validator)?;
        if tx.validator.weight == 0 {
            return Err(PlatformError::InvalidStake {
                reason: "subnet validator weight must be positive".to_string(),
            });
        }

        let primary = self.primary_validator(parent.as_ref(), &tx.validator)?;
        if !contains_period(&primary, &tx.validator) {
            return Err(PlatformError::InvalidStake {
                reason: "subnet validation period exceeds primary validation period"
                    .to_string(),
            });
        }
        let node_id = &tx.validator.node_id;
        if parent.get_current_validator(&tx.subnet_id, node_id).is_ok()
            || parent.get_pending_validator(&tx.subnet_id, node_id).is_ok()
        {
            return Err(PlatformError::InvalidStake {
                reason: format!(
                    "{} already validates subnet {}",
                    hex::encode(node_id),
                    hex::encode(tx.subnet_id)
                ),
            });
        }

        let credentials =
            verify_subnet_auth(parent.as_ref(), self.tx, &tx.subnet_id, &tx.subnet_auth)?;
        let utxos = local_utxos(parent.as_ref(), &tx.base.ins)?;
        verify_spend(
            self.ctx,
            parent.as_ref(),
            self.tx,
            &tx.base.ins,
            &utxos,
            credentials,
            &tx.base.outs,
            self.ctx.config.fees.add_subnet_validator_fee,
        )?;
        self.verify_not_premature(parent.as_ref(), &tx.validator)?;

        self.staker_outcome(&tx.base, &[])
    }

    fn add_delegator_tx(&mut self, tx: &AddDelegatorTx) -> Result<ProposalOutcome, PlatformError> {
        let staking = &self.ctx.config.staking;
        let parent = self.parent()?;
        verify_base(self.ctx, &tx.base)?;
        self.verify_staking_period(parent.as_ref(), &tx.validator)?;

        let weight = stake_weight(&tx.stake)?;
        if weight != tx.validator.weight {
            return Err(PlatformError::InvalidStake {
                reason: format!("staked {} but declared weight {}", weight, tx.validator.weight),
            });
        }
        if weight < staking.min_delegator_stake {
            return Err(PlatformError::InvalidStake {
                reason: format!(
                    "delegation {} below minimum {}",
                    weight, staking.min_delegator_stake
                ),
            });
        }

        let primary = self.primary_validator(parent.as_ref(), &tx.validator)?;
        if !contains_period(&primary, &tx.validator) {
            return Err(PlatformError::InvalidStake {
                reason: "delegation period exceeds validation period".to_string(),
            });
        }

        let max_weight = staking
            .max_validator_stake
            .min(primary.weight.saturating_mul(MAX_VALIDATOR_WEIGHT_FACTOR));
        let node_id = &tx.validator.node_id;
        let delegated = parent
            .current_delegators(node_id)?
            .iter()
            .chain(parent.pending_delegators(node_id)?.iter())
            .fold(0u64, |acc, d| acc.saturating_add(d.weight));
        let total = primary
            .weight
            .saturating_add(delegated)
            .saturating_add(weight);
        if total > max_weight {
            return Err(PlatformError::InvalidStake {
                reason: format!(
                    "validator weight would reach {} over the limit {}",
                    total, max_weight
                ),
            });
        }

        let utxos = local_utxos(parent.as_ref(), &tx.base.ins)?;
        verify_spend(
            self.ctx,
            parent.as_ref(),
            self.tx,
            &tx.base.ins,
            &utxos,
            self.tx.credentials(),
            tx.base.outs.iter().chain(&tx.stake),
            self.ctx.config.fees.add_primary_delegator_fee,
        )?;
        self.verify_not_premature(parent.as_ref(), &tx.validator)?;

        self.staker_outcome(&tx.base, &tx.stake)
    }

    fn create_chain_tx(&mut self, _: &CreateChainTx) -> Result<ProposalOutcome, PlatformError> {
        self.wrong_context()
    }

    fn create_subnet_tx(&mut self, _: &CreateSubnetTx) -> Result<ProposalOutcome, PlatformError> {
        self.wrong_context()
    }

    fn import_tx(&mut self, _: &ImportTx) -> Result<ProposalOutcome, PlatformError> {
        self.wrong_context()
    }

    fn export_tx(&mut self, _: &ExportTx) -> Result<ProposalOutcome, PlatformError> {
        self.wrong_context()
    }

    fn advance_time_tx(&mut self, tx: &AdvanceTimeTx) -> Result<ProposalOutcome, PlatformError> {
        let parent = self.parent()?;
        verify_time_advance(self.ctx, parent.as_ref(), tx.time, false)?;

        let (mut on_commit, on_abort) = self.outcome_diffs()?;
        advance_time_to(self.ctx, &mut on_commit, tx.time)?;

        Ok(ProposalOutcome {
            on_commit,
            on_abort,
            prefers_commit: tx.time <= self.ctx.clock.now(),
        })
    }

    fn reward_validator_tx(
        &mut self,
        tx: &RewardValidatorTx,
    ) -> Result<ProposalOutcome, PlatformError> {
        let parent = self.parent()?;
        let staker = parent
            .current_stakers()?
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::rejected("no current stakers to reward"))?;
        if staker.tx_id != tx.tx_id {
            return Err(PlatformError::rejected(format!(
                "next staker to remove is {}, not {}",
                hex::encode(staker.tx_id),
                hex::encode(tx.tx_id)
            )));
        }
        let now = parent.timestamp()?;
        if staker.end_time != now {
            return Err(PlatformError::rejected(format!(
                "staker ends at {} but chain time is {}",
                staker.end_time, now
            )));
        }

        let staker_tx = parent.get_tx(&staker.tx_id)?.tx;
        let no_owner = OutputOwners::default();
        let (mut on_commit, mut on_abort) = self.outcome_diffs()?;
        on_commit.delete_current_staker(&staker);
        on_abort.delete_current_staker(&staker);

        // Stake comes back on either outcome, numbered after the staker tx's outputs.
        let (outs_len, stake, rewards_owner) = match staker_tx.unsigned() {
            UnsignedTx::AddValidator(t) => (t.base.outs.len(), &t.stake[..], &t.rewards_owner),
            UnsignedTx::AddDelegator(t) => (t.base.outs.len(), &t.stake[..], &t.rewards_owner),
            UnsignedTx::AddSubnetValidator(_) => (0, &[][..], &no_owner),
            other => {
                return Err(PlatformError::rejected(format!(
                    "{} is not a staker transaction",
                    other.name()
                )))
            }
        };
        for diff in [&mut on_commit, &mut on_abort] {
            produce(diff, staker.tx_id, stake, outs_len as u32);
        }

        let reward_index = (outs_len + stake.len()) as u32;
        if staker.potential_reward > 0 {
            match staker.kind {
                StakerKind::PrimaryValidator => {
                    on_commit.add_utxo(reward_utxo(
                        self.ctx,
                        staker.tx_id,
                        reward_index,
                        staker.potential_reward,
                        rewards_owner,
                    ));
                }
                StakerKind::PrimaryDelegator => {
                    let (validator_cut, validator_owner) =
                        self.delegation_cut(parent.as_ref(), &staker)?;
                    let delegator_cut = staker.potential_reward - validator_cut;
                    if delegator_cut > 0 {
                        on_commit.add_utxo(reward_utxo(
                            self.ctx,
                            staker.tx_id,
                            reward_index,
                            delegator_cut,
                            rewards_owner,
                        ));
                    }
                    if let Some(owner) = validator_owner.filter(|_| validator_cut > 0) {
                        on_commit.add_utxo(reward_utxo(
                            self.ctx,
                            staker.tx_id,
                            reward_index + 1,
                            validator_cut,
                            &owner,
                        ));
                    }
                }
                StakerKind::SubnetValidator => {}
            }

            // The potential reward was minted on promotion; an abort burns it.
            let supply = on_abort.current_supply()?;
            on_abort.set_current_supply(supply.saturating_sub(staker.potential_reward));
        }

        on_commit.add_tx(self.tx, TxStatus::Committed);
        on_abort.add_tx(self.tx, TxStatus::Aborted);

        Ok(ProposalOutcome {
            on_commit,
            on_abort,
            prefers_commit: true,
        })
    }
}

impl ProposalTxExecutor<'_> {
    /// The validator's share of a delegator's reward and where to pay it.
    fn delegation_cut(
        &self,
        chain: &dyn Chain,
        delegator: &Staker,
    ) -> Result<(Amount, Option<OutputOwners>), PlatformError> {
        let Ok(validator) = chain.get_current_validator(&PRIMARY_NETWORK_ID, &delegator.node_id)
        else {
            return Ok((0, None));
        };
        let UnsignedTx::AddValidator(add) = chain.get_tx(&validator.tx_id)?.tx.unsigned().clone()
        else {
            return Ok((0, None));
        };
        let cut = u128::from(delegator.potential_reward) * u128::from(add.delegation_shares)
            / u128::from(PERCENT_DENOMINATOR);
        Ok((cut as Amount, Some(add.rewards_owner)))
    }
}

fn reward_utxo(
    ctx: &Context,
    tx_id: Id,
    index: u32,
    amount: Amount,
    owner: &OutputOwners,
) -> cairn_types::utxo::Utxo {
    TransferableOutput {
        asset_id: ctx.config.asset_id,
        amount,
        owners: owner.clone(),
    }
    .to_utxo(tx_id, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{node, Fixture, GENESIS_VALIDATOR_END};
    use cairn_types::constants::{ONE_CAIRN, SECONDS_PER_DAY};
    use cairn_types::utxo::UtxoId;

    fn execute(fixture: &Fixture, parent_id: Id, tx: &Tx) -> Result<ProposalOutcome, PlatformError> {
        ProposalTxExecutor::new(&fixture.ctx, fixture.versions(), parent_id, tx).execute()
    }

    #[test]
    fn test_add_validator_commit_and_abort() {
        let fixture = Fixture::new();
        let start = fixture.genesis_time() + 60;
        let tx = fixture.add_validator_tx(0, node(2), start, start + 20 * SECONDS_PER_DAY);
        fixture.ctx.clock.set(fixture.genesis_time());
        let outcome = execute(&fixture, fixture.root, &tx).unwrap();
        assert!(outcome.prefers_commit);

        let pending = outcome
            .on_commit
            .get_pending_validator(&PRIMARY_NETWORK_ID, &node(2))
            .unwrap();
        assert_eq!(pending.potential_reward, 0);
        assert_eq!(outcome.on_commit.get_tx(&tx.id()).unwrap().status, TxStatus::Committed);

        // Abort returns the stake right after the change output.
        let refund = outcome.on_abort.get_utxo(&UtxoId::new(tx.id(), 1)).unwrap();
        assert_eq!(refund.amount, fixture.ctx.config.staking.min_validator_stake);
        assert!(outcome.on_commit.get_utxo(&UtxoId::new(tx.id(), 1)).is_err());
        assert!(outcome
            .on_abort
            .get_pending_validator(&PRIMARY_NETWORK_ID, &node(2))
            .is_err());
        assert_eq!(outcome.on_abort.get_tx(&tx.id()).unwrap().status, TxStatus::Aborted);
    }

    #[test]
    fn test_add_validator_rejections() {
        let fixture = Fixture::new();
        let now = fixture.genesis_time();

        let started = fixture.add_validator_tx(0, node(2), now, now + 20 * SECONDS_PER_DAY);
        assert!(matches!(
            execute(&fixture, fixture.root, &started),
            Err(PlatformError::InvalidStake { .. })
        ));

        let short = fixture.add_validator_tx(0, node(2), now + 10, now + 20);
        assert!(matches!(
            execute(&fixture, fixture.root, &short),
            Err(PlatformError::InvalidStake { .. })
        ));

        let duplicate = fixture.add_validator_tx(0, node(1), now + 10, now + 20 * SECONDS_PER_DAY);
        assert!(matches!(
            execute(&fixture, fixture.root, &duplicate),
            Err(PlatformError::InvalidStake { .. })
        ));
    }

    #[test]
    fn test_premature_stake_rejected_by_strict_executor() {
        let fixture = Fixture::new();
        let start = fixture.genesis_time() + MAX_FUTURE_START_TIME + 1;
        let tx = fixture.add_validator_tx(0, node(2), start, start + 20 * SECONDS_PER_DAY);
        assert!(matches!(
            execute(&fixture, fixture.root, &tx),
            Err(PlatformError::PrematureStake { start_time, .. }) if start_time == start
        ));
    }

    #[test]
    fn test_decision_tx_is_wrong_context() {
        let fixture = Fixture::new();
        let tx = fixture.create_subnet_tx(0);
        assert!(matches!(
            execute(&fixture, fixture.root, &tx),
            Err(PlatformError::WrongTxContext {
                tx_type: "CreateSubnetTx"
            })
        ));
    }

    #[test]
    fn test_delegation_weight_limit() {
        let fixture = Fixture::new();
        let now = fixture.genesis_time();
        let end = now + 20 * SECONDS_PER_DAY;
        let genesis_weight = fixture.genesis_validator_weight();

        let ok = fixture.add_delegator_tx(0, node(1), now + 10, end, genesis_weight);
        let outcome = execute(&fixture, fixture.root, &ok).unwrap();
        assert_eq!(
            outcome.on_commit.pending_delegators(&node(1)).unwrap().len(),
            1
        );

        let too_heavy =
            fixture.add_delegator_tx(0, node(1), now + 10, end, 4 * genesis_weight + ONE_CAIRN);
        assert!(matches!(
            execute(&fixture, fixture.root, &too_heavy),
            Err(PlatformError::InvalidStake { .. })
        ));

        let too_long = fixture.add_delegator_tx(
            0,
            node(1),
            now + 10,
            GENESIS_VALIDATOR_END + 1,
            25 * ONE_CAIRN,
        );
        assert!(execute(&fixture, fixture.root, &too_long).is_err());

        let unknown = fixture.add_delegator_tx(0, node(9), now + 10, end, 25 * ONE_CAIRN);
        assert!(execute(&fixture, fixture.root, &unknown).is_err());
    }

    #[test]
    fn test_advance_time_outcomes() {
        let fixture = Fixture::new();
        let now = fixture.genesis_time();
        fixture.ctx.clock.set(now + 5);

        let tx = fixture.advance_time_tx(now + 5);
        let outcome = execute(&fixture, fixture.root, &tx).unwrap();
        assert!(outcome.prefers_commit);
        assert_eq!(outcome.on_commit.timestamp().unwrap(), now + 5);
        assert_eq!(outcome.on_abort.timestamp().unwrap(), now);

        let ahead = fixture.advance_time_tx(now + 12);
        let outcome = execute(&fixture, fixture.root, &ahead).unwrap();
        assert!(!outcome.prefers_commit);

        let too_far = fixture.advance_time_tx(now + 16);
        assert!(execute(&fixture, fixture.root, &too_far).is_err());
    }

    #[test]
    fn test_reward_validator_pays_on_commit_burns_on_abort() {
        let fixture = Fixture::new();
        let end = GENESIS_VALIDATOR_END;
        fixture.ctx.clock.set(end);

        let advance = fixture.advance_time_tx(end);
        let advanced = execute(&fixture, fixture.root, &advance).unwrap();
        let at_end = [30u8; 32];
        fixture.register(at_end, advanced.on_commit);

        let genesis_validator = fixture.state().current_stakers().unwrap()[0].clone();
        let reward_tx = fixture.reward_validator_tx(genesis_validator.tx_id);
        // Not yet at the staker's end time.
        assert!(execute(&fixture, fixture.root, &reward_tx).is_err());

        let wrong = fixture.reward_validator_tx([4u8; 32]);
        assert!(execute(&fixture, at_end, &wrong).is_err());

        let outcome = execute(&fixture, at_end, &reward_tx).unwrap();
        assert!(outcome.prefers_commit);
        let reward = genesis_validator.potential_reward;
        assert!(reward > 0);

        // Genesis validator txs have no change outputs, so the stake is output 0
        // and the reward follows it.
        for diff in [&outcome.on_commit, &outcome.on_abort] {
            assert!(diff
                .get_current_validator(&PRIMARY_NETWORK_ID, &node(1))
                .is_err());
            assert_eq!(
                diff.get_utxo(&UtxoId::new(genesis_validator.tx_id, 0))
                    .unwrap()
                    .amount,
                genesis_validator.weight
            );
        }
        assert_eq!(
            outcome
                .on_commit
                .get_utxo(&UtxoId::new(genesis_validator.tx_id, 1))
                .unwrap()
                .amount,
            reward
        );
        assert!(outcome
            .on_abort
            .get_utxo(&UtxoId::new(genesis_validator.tx_id, 1))
            .is_err());

        let supply = fixture.state().current_supply().unwrap();
        assert_eq!(outcome.on_commit.current_supply().unwrap(), supply);
        assert_eq!(outcome.on_abort.current_supply().unwrap(), supply - reward);
    }
}
