use thiserror::Error;

use crate::codec::TypeTag;

/// Errors raised while encoding or decoding consensus-critical values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown codec version {version}")]
    UnknownVersion { version: u16 },

    #[error("codec version {version} is already registered")]
    DuplicateVersion { version: u16 },

    #[error("type {tag:?} is already registered")]
    DuplicateType { tag: TypeTag },

    #[error("type {tag:?} is not registered for codec version {version}")]
    UnregisteredType { tag: TypeTag, version: u16 },

    #[error("encoded size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    #[error("input too short: {len} bytes")]
    Truncated { len: usize },

    #[error("malformed payload: {reason}")]
    Malformed { reason: String },
}
