//! Transaction executors.
//!
//! Every executor is a [`TxVisitor`](cairn_types::tx::TxVisitor) over one
//! signed transaction. The standard and atomic executors mutate a single
//! [`Diff`](crate::state::Diff); the proposal executor produces a commit and
//! an abort diff; the mempool verifier runs the strict executors on throwaway
//! diffs and relaxes exactly one check.

mod atomic;
mod mempool;
mod proposal;
mod spend;
mod staker;
mod standard;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cairn_types::primitives::Id;
use cairn_types::utxo::UtxoId;

use crate::atomic::{AtomicRequests, SharedMemory};
use crate::clock::Clock;
use crate::config::Config;
use crate::reward::Calculator;

pub use atomic::AtomicTxExecutor;
pub use mempool::MempoolTxVerifier;
pub use proposal::{ProposalOutcome, ProposalTxExecutor};
pub use staker::{advance_time_to, next_staker_change_time, verify_time_advance};
pub use standard::StandardTxExecutor;

/// Everything an executor needs besides the state it runs against.
pub struct Context {
    pub config: Config,
    pub clock: Clock,
    pub rewards: Calculator,
    pub shared_memory: Arc<dyn SharedMemory>,
}

impl Context {
    pub fn new(config: Config, shared_memory: Arc<dyn SharedMemory>) -> Self {
        Self {
            rewards: Calculator::new(&config.reward),
            config,
            clock: Clock::new(),
            shared_memory,
        }
    }
}

/// Cross-chain effects of decision transactions, applied only on accept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicEffects {
    /// Shared-memory writes keyed by peer chain.
    pub requests: BTreeMap<Id, AtomicRequests>,
    /// Imported UTXOs consumed from shared memory.
    pub inputs: BTreeSet<UtxoId>,
}

impl AtomicEffects {
    pub fn merge(&mut self, other: AtomicEffects) {
        crate::atomic::merge_requests(&mut self.requests, other.requests);
        self.inputs.extend(other.inputs);
    }
}
