//! End-to-end run of the platform chain: genesis, subnet creation, staking
//! through proposal blocks, time advancement and reopening the stored state.

use std::sync::Arc;

use cairn_crypto::hash::blake3_hash;
use cairn_crypto::keys::{sign_tx, Keypair};
use cairn_platform::atomic::MemorySharedMemory;
use cairn_platform::config::Config;
use cairn_platform::executor::Context;
use cairn_platform::mempool::TxPool;
use cairn_platform::state::{Chain, State};
use cairn_platform::{Manager, PlatformError};
use cairn_storage::memory::MemoryStore;
use cairn_storage::traits::BatchWriter;
use cairn_types::block::{Block, BlockBody};
use cairn_types::constants::{KILO_CAIRN, SECONDS_PER_DAY};
use cairn_types::genesis::Genesis;
use cairn_types::primitives::{Amount, Id, NodeId, Timestamp, PRIMARY_NETWORK_ID};
use cairn_types::tx::{
    AddSubnetValidatorTx, AddValidatorTx, BaseTx, CreateSubnetTx, SubnetAuth, Tx, UnsignedTx,
    Validator,
};
use cairn_types::utxo::{OutputOwners, TransferableInput, TransferableOutput, Utxo};

const T0: Timestamp = 1_650_000_000;
const FUNDS: Amount = 50 * KILO_CAIRN;
const NODE_A: NodeId = [0xa; 20];
const NODE_B: NodeId = [0xb; 20];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Node {
    key: Keypair,
    ctx: Arc<Context>,
    store: Arc<MemoryStore>,
    pool: Arc<TxPool>,
    manager: Manager,
}

impl Node {
    fn start() -> Self {
        init_tracing();
        let key = Keypair::from_seed(&[3u8; 32]);
        let shared = Arc::new(MemorySharedMemory::new());
        let ctx = Arc::new(Context::new(Config::default(), shared));
        ctx.clock.set(T0);

        let genesis = genesis(&ctx.config, &key).to_bytes().unwrap();
        let store = Arc::new(MemoryStore::new());
        let writer: Arc<dyn BatchWriter> = store.clone();
        let state = Arc::new(State::from_genesis(&genesis, writer, &ctx.rewards).unwrap());
        let pool = Arc::new(TxPool::new(128));
        let manager = Manager::new(ctx.clone(), state, pool.clone());
        Self {
            key,
            ctx,
            store,
            pool,
            manager,
        }
    }

    fn tip(&self) -> Id {
        self.manager.last_accepted().unwrap()
    }

    fn owner(&self) -> OutputOwners {
        OutputOwners::single(self.key.public_key())
    }

    fn output(&self, amount: Amount) -> TransferableOutput {
        TransferableOutput {
            asset_id: self.ctx.config.asset_id,
            amount,
            owners: self.owner(),
        }
    }

    /// Spend funded output `index`, returning what is left after `spent` and `fee`.
    fn spend(&self, index: u32, spent: Amount, fee: Amount) -> BaseTx {
        let utxo = funded(&self.ctx.config, &self.key, index);
        BaseTx {
            network_id: self.ctx.config.network_id,
            blockchain_id: self.ctx.config.chain_id,
            outs: vec![self.output(FUNDS - spent - fee)],
            ins: vec![TransferableInput {
                utxo_id: utxo.utxo_id,
                asset_id: utxo.asset_id,
                amount: utxo.amount,
                sig_indices: vec![0],
            }],
            memo: Vec::new(),
        }
    }

    fn sign(&self, unsigned: UnsignedTx, credentials: usize) -> Tx {
        sign_tx(unsigned, &vec![vec![&self.key]; credentials]).unwrap()
    }

    /// Submit through mempool admission, build on the tip, verify the block
    /// from its bytes and accept it. Proposals are followed by their
    /// preferred option.
    fn produce(&self, txs: &[Tx]) -> Result<Block, PlatformError> {
        let tip = self.tip();
        for tx in txs {
            self.manager.verify_tx(&tip, tx)?;
            self.pool.add(tx.clone());
        }
        let ids: Vec<Id> = txs.iter().map(|tx| tx.id()).collect();
        let block = self.manager.build_block(&tip, &ids)?;
        self.manager.verify(block.bytes())?;
        self.manager.accept(&block.id())?;
        if let BlockBody::Proposal { .. } = block.body() {
            let [preferred, _] = self.manager.options(&block.id())?;
            self.manager.verify(preferred.bytes())?;
            self.manager.accept(&preferred.id())?;
            return Ok(preferred);
        }
        Ok(block)
    }

    fn state(&self) -> Arc<dyn Chain> {
        self.manager.get_state(&self.tip()).unwrap()
    }
}

fn funded(config: &Config, key: &Keypair, index: u32) -> Utxo {
    TransferableOutput {
        asset_id: config.asset_id,
        amount: FUNDS,
        owners: OutputOwners::single(key.public_key()),
    }
    .to_utxo(blake3_hash(b"integration funds"), index)
}

fn genesis(config: &Config, key: &Keypair) -> Genesis {
    let weight = 5 * KILO_CAIRN;
    let validator = Tx::new(
        UnsignedTx::AddValidator(AddValidatorTx {
            base: BaseTx {
                network_id: config.network_id,
                blockchain_id: config.chain_id,
                ..BaseTx::default()
            },
            validator: Validator {
                node_id: NODE_A,
                start: T0,
                end: T0 + 90 * SECONDS_PER_DAY,
                weight,
            },
            stake: vec![TransferableOutput {
                asset_id: config.asset_id,
                amount: weight,
                owners: OutputOwners::single(key.public_key()),
            }],
            rewards_owner: OutputOwners::single(key.public_key()),
            delegation_shares: config.staking.min_delegation_fee,
        }),
        vec![],
    )
    .unwrap();

    Genesis {
        utxos: (0..4).map(|i| funded(config, key, i)).collect(),
        validators: vec![validator],
        chains: vec![],
        timestamp: T0,
        initial_supply: 4 * FUNDS + weight,
        message: "integration".to_string(),
    }
}

#[test]
fn test_subnet_staking_lifecycle() {
    let node = Node::start();
    let fees = node.ctx.config.fees.clone();

    let create_subnet = node.sign(
        UnsignedTx::CreateSubnet(CreateSubnetTx {
            base: node.spend(0, 0, fees.create_subnet_fee),
            owner: node.owner(),
        }),
        1,
    );
    let subnet_id = create_subnet.id();
    node.produce(&[create_subnet]).unwrap();
    assert!(node.state().get_subnet_owner(&subnet_id).is_ok());

    let stake = node.ctx.config.staking.min_validator_stake;
    let b_start = T0 + 100;
    let b_end = b_start + 30 * SECONDS_PER_DAY;
    let add_b = node.sign(
        UnsignedTx::AddValidator(AddValidatorTx {
            base: node.spend(1, stake, fees.add_primary_validator_fee),
            validator: Validator {
                node_id: NODE_B,
                start: b_start,
                end: b_end,
                weight: stake,
            },
            stake: vec![node.output(stake)],
            rewards_owner: node.owner(),
            delegation_shares: node.ctx.config.staking.min_delegation_fee,
        }),
        1,
    );
    let commit = node.produce(&[add_b]).unwrap();
    assert!(matches!(commit.body(), BlockBody::Commit));
    assert!(node
        .state()
        .get_pending_validator(&PRIMARY_NETWORK_ID, &NODE_B)
        .is_ok());

    // Nothing to do until the clock reaches the next staker change.
    assert!(matches!(
        node.produce(&[]),
        Err(PlatformError::NoPendingBlocks)
    ));
    node.ctx.clock.set(b_start);
    let advance = node.produce(&[]).unwrap();
    assert_eq!(advance.timestamp(), Some(b_start));
    assert!(node
        .state()
        .get_current_validator(&PRIMARY_NETWORK_ID, &NODE_B)
        .is_ok());

    let sv_start = b_start + 100;
    let sv_end = sv_start + 2 * SECONDS_PER_DAY;
    let add_sv = node.sign(
        UnsignedTx::AddSubnetValidator(AddSubnetValidatorTx {
            base: node.spend(2, 0, fees.add_subnet_validator_fee),
            validator: Validator {
                node_id: NODE_B,
                start: sv_start,
                end: sv_end,
                weight: 1,
            },
            subnet_id,
            subnet_auth: SubnetAuth {
                sig_indices: vec![0],
            },
        }),
        2,
    );
    node.produce(&[add_sv]).unwrap();
    assert!(node
        .state()
        .get_pending_validator(&subnet_id, &NODE_B)
        .is_ok());

    node.ctx.clock.set(sv_start);
    node.produce(&[]).unwrap();
    assert!(node
        .state()
        .get_current_validator(&subnet_id, &NODE_B)
        .is_ok());

    // Subnet validators leave as soon as time reaches their end.
    node.ctx.clock.set(sv_end);
    node.produce(&[]).unwrap();
    assert!(node.state().get_current_validator(&subnet_id, &NODE_B).is_err());
    assert_eq!(node.state().timestamp().unwrap(), sv_end);

    // Everything accepted so far survives a restart.
    let tip = node.tip();
    let writer: Arc<dyn BatchWriter> = node.store.clone();
    let reopened = State::load(writer).unwrap();
    assert_eq!(reopened.last_accepted().unwrap(), tip);
    assert_eq!(reopened.timestamp().unwrap(), sv_end);
    assert!(reopened
        .get_current_validator(&PRIMARY_NETWORK_ID, &NODE_B)
        .is_ok());
    assert!(reopened.get_subnet_owner(&subnet_id).is_ok());
    assert!(reopened.get_stateless_block(&tip).is_ok());
}

#[test]
fn test_competing_blocks_resolve_to_one_branch() {
    let node = Node::start();
    let fees = node.ctx.config.fees.clone();
    let subnet = |index: u32| {
        node.sign(
            UnsignedTx::CreateSubnet(CreateSubnetTx {
                base: node.spend(index, 0, fees.create_subnet_fee),
                owner: node.owner(),
            }),
            1,
        )
    };

    let root = node.tip();
    let left_tx = subnet(0);
    let right_tx = subnet(1);
    node.pool.add(left_tx.clone());
    node.pool.add(right_tx.clone());
    let left = node.manager.build_block(&root, &[left_tx.id()]).unwrap();
    let right = node.manager.build_block(&root, &[right_tx.id()]).unwrap();
    node.manager.verify(left.bytes()).unwrap();
    node.manager.verify(right.bytes()).unwrap();
    let left_child_tx = subnet(2);
    node.pool.add(left_child_tx.clone());
    let left_child = node
        .manager
        .build_block(&left.id(), &[left_child_tx.id()])
        .unwrap();
    node.manager.verify(left_child.bytes()).unwrap();

    node.manager.accept(&right.id()).unwrap();
    assert!(node.manager.get_state(&left.id()).is_none());
    assert!(node.manager.get_state(&left_child.id()).is_none());

    let state = node.state();
    assert!(state.get_subnet_owner(&right_tx.id()).is_ok());
    assert!(state.get_subnet_owner(&left_tx.id()).is_err());
    // The losing branch's spend is available again.
    assert!(state
        .get_utxo(&funded(&node.ctx.config, &node.key, 0).utxo_id)
        .is_ok());
}
