use thiserror::Error;

use cairn_crypto::error::CryptoError;
use cairn_storage::error::StorageError;
use cairn_types::error::CodecError;
use cairn_types::primitives::{Amount, Id, Timestamp};

/// Errors raised while verifying, executing, accepting or building blocks.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),

    /// Storage failures, including misses, are passed through unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{tx_type} is not valid in this context")]
    WrongTxContext { tx_type: &'static str },

    #[error("staker start time {start_time} is after the maximum allowed start time {max_start_time}")]
    PrematureStake {
        start_time: Timestamp,
        max_start_time: Timestamp,
    },

    #[error("no state available for block {}", hex::encode(.0))]
    StateNotFound(Id),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("insufficient funds: consumed {consumed}, need {required}")]
    InsufficientFunds { consumed: Amount, required: Amount },

    #[error("invalid stake: {reason}")]
    InvalidStake { reason: String },

    #[error("execution rejected: {reason}")]
    ExecutionRejected { reason: String },

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] CryptoError),

    #[error("invalid block: {reason}")]
    InvalidBlock { reason: String },

    #[error("conflicting atomic inputs")]
    ConflictingAtomicInputs,

    #[error("no pending blocks to build")]
    NoPendingBlocks,

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("config error: {reason}")]
    Config { reason: String },
}

impl PlatformError {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        PlatformError::ExecutionRejected {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_block(reason: impl Into<String>) -> Self {
        PlatformError::InvalidBlock {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        PlatformError::NotFound { what: what.into() }
    }
}

impl<T> From<std::sync::PoisonError<T>> for PlatformError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        PlatformError::LockPoisoned(err.to_string())
    }
}
