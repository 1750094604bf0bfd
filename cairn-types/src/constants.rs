use crate::primitives::Amount;

// ─── Token Units ─────────────────────────────────────────────────────────────

/// Smallest unit.
pub const NANO_CAIRN: Amount = 1;

/// 10^3 nano.
pub const MICRO_CAIRN: Amount = 1_000 * NANO_CAIRN;

/// 10^6 nano.
pub const MILLI_CAIRN: Amount = 1_000 * MICRO_CAIRN;

/// One full token in base units (10^9).
pub const ONE_CAIRN: Amount = 1_000 * MILLI_CAIRN;

pub const KILO_CAIRN: Amount = 1_000 * ONE_CAIRN;

pub const MEGA_CAIRN: Amount = 1_000 * KILO_CAIRN;

// ─── Rates ───────────────────────────────────────────────────────────────────

/// Denominator for all rate and percentage parameters (1_000_000 = 100%).
pub const PERCENT_DENOMINATOR: u64 = 1_000_000;

// ─── Time ────────────────────────────────────────────────────────────────────

pub const SECONDS_PER_HOUR: u64 = 3_600;

pub const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// How far past the chain time a staker's start time may be.
pub const MAX_FUTURE_START_TIME: u64 = 14 * SECONDS_PER_DAY;

/// How far past the local clock a staker's start time may be for the staker
/// to wait in the mempool.
pub const MAX_MEMPOOL_START_TIME: u64 = 2 * MAX_FUTURE_START_TIME;

/// How far ahead of the local clock a proposed chain time may be.
pub const SYNC_BOUND: u64 = 10;

// ─── Staking ─────────────────────────────────────────────────────────────────

/// A validator's total weight (own stake plus delegations) may not exceed this
/// multiple of its own stake.
pub const MAX_VALIDATOR_WEIGHT_FACTOR: u64 = 5;

// ─── Codec ───────────────────────────────────────────────────────────────────

/// Codec version written by this release.
pub const CODEC_VERSION: u16 = 0;

/// Maximum encoded size of a block or transaction.
pub const MAX_BLOCK_SIZE: usize = 256 * 1024;

/// Maximum encoded size of the genesis payload.
pub const GENESIS_MAX_SIZE: usize = i32::MAX as usize;

/// Maximum memo length in bytes.
pub const MAX_MEMO_SIZE: usize = 256;
