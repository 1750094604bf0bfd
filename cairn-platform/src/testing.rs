//! Unit-test fixtures: a funded genesis, a key that owns every genesis output
//! and builders for signed transactions spending them.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use cairn_crypto::hash::blake3_hash;
use cairn_crypto::keys::{sign_tx, Keypair};
use cairn_storage::memory::MemoryStore;
use cairn_storage::traits::BatchWriter;
use cairn_types::constants::{KILO_CAIRN, ONE_CAIRN, SECONDS_PER_DAY};
use cairn_types::genesis::Genesis;
use cairn_types::primitives::{Amount, Id, NodeId, Timestamp};
use cairn_types::tx::{
    AddDelegatorTx, AddSubnetValidatorTx, AddValidatorTx, AdvanceTimeTx, BaseTx, CreateChainTx,
    CreateSubnetTx, ExportTx, ImportTx, RewardValidatorTx, SubnetAuth, Tx, UnsignedTx, Validator,
};
use cairn_types::utxo::{OutputOwners, TransferableInput, TransferableOutput, Utxo, UtxoId};

use crate::atomic::MemorySharedMemory;
use crate::config::Config;
use crate::executor::Context;
use crate::state::{Chain, Diff, State, Versions};

pub(crate) const GENESIS_TIME: Timestamp = 1_700_000_000;
pub(crate) const GENESIS_VALIDATOR_END: Timestamp = GENESIS_TIME + 180 * SECONDS_PER_DAY;
pub(crate) const GENESIS_VALIDATOR_WEIGHT: Amount = 10 * KILO_CAIRN;
pub(crate) const FUNDED_AMOUNT: Amount = 100 * KILO_CAIRN;
pub(crate) const FUNDED_UTXOS: u32 = 8;
pub(crate) const PEER_CHAIN: Id = [7u8; 32];

pub(crate) fn funder() -> Keypair {
    Keypair::from_seed(&[1u8; 32])
}

pub(crate) fn node(n: u8) -> NodeId {
    [n; 20]
}

/// Versions backed by the base state plus explicitly registered diffs.
pub(crate) struct TestVersions {
    base: Arc<State>,
    diffs: RwLock<BTreeMap<Id, Arc<Diff>>>,
}

impl Versions for TestVersions {
    fn get_state(&self, block_id: &Id) -> Option<Arc<dyn Chain>> {
        if let Some(diff) = self.diffs.read().ok()?.get(block_id) {
            return Some(diff.clone() as Arc<dyn Chain>);
        }
        if self.base.last_accepted().ok()? == *block_id {
            return Some(self.base.clone() as Arc<dyn Chain>);
        }
        None
    }
}

pub(crate) struct Fixture {
    pub ctx: Arc<Context>,
    pub shared: Arc<MemorySharedMemory>,
    pub root: Id,
    pub genesis_bytes: Vec<u8>,
    versions: Arc<TestVersions>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let shared = Arc::new(MemorySharedMemory::new());
        let ctx = Context::new(config, shared.clone());
        ctx.clock.set(GENESIS_TIME);

        let genesis_bytes = genesis(&ctx.config).to_bytes().unwrap();
        let store: Arc<dyn BatchWriter> = Arc::new(MemoryStore::new());
        let state = Arc::new(State::from_genesis(&genesis_bytes, store, &ctx.rewards).unwrap());
        let root = state.last_accepted().unwrap();

        Self {
            ctx: Arc::new(ctx),
            shared,
            root,
            genesis_bytes,
            versions: Arc::new(TestVersions {
                base: state,
                diffs: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn state(&self) -> Arc<State> {
        self.versions.base.clone()
    }

    pub fn versions(&self) -> Arc<dyn Versions> {
        self.versions.clone()
    }

    /// A fresh diff on the genesis block.
    pub fn diff(&self) -> Diff {
        self.diff_on(self.root)
    }

    pub fn diff_on(&self, parent_id: Id) -> Diff {
        Diff::new(parent_id, self.versions()).unwrap()
    }

    pub fn register(&self, block_id: Id, diff: Diff) {
        self.versions
            .diffs
            .write()
            .unwrap()
            .insert(block_id, Arc::new(diff));
    }

    pub fn genesis_time(&self) -> Timestamp {
        GENESIS_TIME
    }

    pub fn genesis_validator_weight(&self) -> Amount {
        GENESIS_VALIDATOR_WEIGHT
    }

    pub fn genesis_utxo(&self, index: u32) -> Utxo {
        funded_utxo(&self.ctx.config, index)
    }

    pub fn input(&self, index: u32) -> TransferableInput {
        let utxo = self.genesis_utxo(index);
        TransferableInput {
            utxo_id: utxo.utxo_id,
            asset_id: utxo.asset_id,
            amount: utxo.amount,
            sig_indices: vec![0],
        }
    }

    pub fn output(&self, amount: Amount) -> TransferableOutput {
        output(&self.ctx.config, amount)
    }

    pub fn base_tx(&self, ins: Vec<TransferableInput>, outs: Vec<TransferableOutput>) -> BaseTx {
        BaseTx {
            network_id: self.ctx.config.network_id,
            blockchain_id: self.ctx.config.chain_id,
            outs,
            ins,
            memo: Vec::new(),
        }
    }

    /// Spend genesis output `index`, keeping `spent` plus the fee out of the change.
    fn spend(&self, index: u32, spent: Amount, fee: Amount) -> BaseTx {
        let change = FUNDED_AMOUNT - spent - fee;
        let outs = if change > 0 {
            vec![self.output(change)]
        } else {
            vec![]
        };
        self.base_tx(vec![self.input(index)], outs)
    }

    /// Sign with the funding key, producing `credentials` identical credentials.
    pub fn sign(&self, unsigned: UnsignedTx, credentials: usize) -> Tx {
        let key = funder();
        sign_tx(unsigned, &vec![vec![&key]; credentials]).unwrap()
    }

    pub fn subnet_owner(&self) -> OutputOwners {
        OutputOwners::single(funder().public_key())
    }

    pub fn create_subnet_tx(&self, index: u32) -> Tx {
        self.create_subnet_tx_with_memo(index, b"")
    }

    pub fn create_subnet_tx_with_memo(&self, index: u32, memo: &[u8]) -> Tx {
        let mut base = self.spend(index, 0, self.ctx.config.fees.create_subnet_fee);
        base.memo = memo.to_vec();
        self.sign(
            UnsignedTx::CreateSubnet(CreateSubnetTx {
                base,
                owner: self.subnet_owner(),
            }),
            1,
        )
    }

    pub fn create_chain_tx(&self, index: u32, subnet_id: Id, name: &str) -> Tx {
        self.sign(
            UnsignedTx::CreateChain(CreateChainTx {
                base: self.spend(index, 0, self.ctx.config.fees.create_chain_fee),
                subnet_id,
                chain_name: name.to_string(),
                vm_id: [5u8; 32],
                fx_ids: vec![],
                genesis_data: b"{}".to_vec(),
                subnet_auth: SubnetAuth {
                    sig_indices: vec![0],
                },
            }),
            2,
        )
    }

    pub fn add_validator_tx(&self, index: u32, node_id: NodeId, start: Timestamp, end: Timestamp) -> Tx {
        let weight = self.ctx.config.staking.min_validator_stake;
        self.add_validator_tx_with_weight(index, node_id, start, end, weight)
    }

    pub fn add_validator_tx_with_weight(
        &self,
        index: u32,
        node_id: NodeId,
        start: Timestamp,
        end: Timestamp,
        weight: Amount,
    ) -> Tx {
        self.sign(
            UnsignedTx::AddValidator(AddValidatorTx {
                base: self.spend(index, weight, self.ctx.config.fees.add_primary_validator_fee),
                validator: Validator {
                    node_id,
                    start,
                    end,
                    weight,
                },
                stake: vec![self.output(weight)],
                rewards_owner: self.subnet_owner(),
                delegation_shares: self.ctx.config.staking.min_delegation_fee,
            }),
            1,
        )
    }

    pub fn add_delegator_tx(
        &self,
        index: u32,
        node_id: NodeId,
        start: Timestamp,
        end: Timestamp,
        weight: Amount,
    ) -> Tx {
        self.sign(
            UnsignedTx::AddDelegator(AddDelegatorTx {
                base: self.spend(index, weight, self.ctx.config.fees.add_primary_delegator_fee),
                validator: Validator {
                    node_id,
                    start,
                    end,
                    weight,
                },
                stake: vec![self.output(weight)],
                rewards_owner: self.subnet_owner(),
            }),
            1,
        )
    }

    pub fn add_subnet_validator_tx(
        &self,
        index: u32,
        subnet_id: Id,
        node_id: NodeId,
        start: Timestamp,
        end: Timestamp,
    ) -> Tx {
        self.sign(
            UnsignedTx::AddSubnetValidator(AddSubnetValidatorTx {
                base: self.spend(index, 0, self.ctx.config.fees.add_subnet_validator_fee),
                validator: Validator {
                    node_id,
                    start,
                    end,
                    weight: 1,
                },
                subnet_id,
                subnet_auth: SubnetAuth {
                    sig_indices: vec![0],
                },
            }),
            2,
        )
    }

    /// A UTXO the peer chain could export to us. Not yet in shared memory.
    pub fn shared_utxo(&self, index: u32, amount: Amount) -> Utxo {
        Utxo {
            utxo_id: UtxoId::new(blake3_hash(b"peer exports"), index),
            asset_id: self.ctx.config.asset_id,
            amount,
            owners: self.subnet_owner(),
        }
    }

    pub fn insert_shared_utxo(&self, index: u32, amount: Amount) -> Utxo {
        let utxo = self.shared_utxo(index, amount);
        self.shared.insert_inbound(PEER_CHAIN, utxo.clone()).unwrap();
        utxo
    }

    pub fn import_tx(&self, utxo: &Utxo) -> Tx {
        self.sign(
            UnsignedTx::Import(ImportTx {
                base: self.base_tx(
                    vec![],
                    vec![self.output(utxo.amount - self.ctx.config.fees.tx_fee)],
                ),
                source_chain: PEER_CHAIN,
                imported_inputs: vec![TransferableInput {
                    utxo_id: utxo.utxo_id,
                    asset_id: utxo.asset_id,
                    amount: utxo.amount,
                    sig_indices: vec![0],
                }],
            }),
            1,
        )
    }

    pub fn export_tx(&self, index: u32, amount: Amount) -> Tx {
        self.sign(
            UnsignedTx::Export(ExportTx {
                base: self.spend(index, amount, self.ctx.config.fees.tx_fee),
                destination_chain: PEER_CHAIN,
                exported_outputs: vec![self.output(amount)],
            }),
            1,
        )
    }

    pub fn advance_time_tx(&self, time: Timestamp) -> Tx {
        Tx::new(UnsignedTx::AdvanceTime(AdvanceTimeTx { time }), vec![]).unwrap()
    }

    pub fn reward_validator_tx(&self, tx_id: Id) -> Tx {
        Tx::new(
            UnsignedTx::RewardValidator(RewardValidatorTx { tx_id }),
            vec![],
        )
        .unwrap()
    }
}

fn output(config: &Config, amount: Amount) -> TransferableOutput {
    TransferableOutput {
        asset_id: config.asset_id,
        amount,
        owners: OutputOwners::single(funder().public_key()),
    }
}

fn funded_utxo(config: &Config, index: u32) -> Utxo {
    output(config, FUNDED_AMOUNT).to_utxo(blake3_hash(b"genesis funds"), index)
}

/// Eight funded outputs and one primary validator on `node(1)`.
pub(crate) fn genesis(config: &Config) -> Genesis {
    let validator = Tx::new(
        UnsignedTx::AddValidator(AddValidatorTx {
            base: BaseTx {
                network_id: config.network_id,
                blockchain_id: config.chain_id,
                ..BaseTx::default()
            },
            validator: Validator {
                node_id: node(1),
                start: GENESIS_TIME,
                end: GENESIS_VALIDATOR_END,
                weight: GENESIS_VALIDATOR_WEIGHT,
            },
            stake: vec![output(config, GENESIS_VALIDATOR_WEIGHT)],
            rewards_owner: OutputOwners::single(funder().public_key()),
            delegation_shares: config.staking.min_delegation_fee,
        }),
        vec![],
    )
    .unwrap();

    Genesis {
        utxos: (0..FUNDED_UTXOS).map(|i| funded_utxo(config, i)).collect(),
        validators: vec![validator],
        chains: vec![],
        timestamp: GENESIS_TIME,
        initial_supply: u64::from(FUNDED_UTXOS) * FUNDED_AMOUNT
            + GENESIS_VALIDATOR_WEIGHT
            + ONE_CAIRN,
        message: "cairn unit tests".to_string(),
    }
}
