//! Versioned, size-bounded binary codec.
//!
//! Wire format: `[2-byte BE codec version][borsh payload]`
//!
//! Every block body and transaction kind carries a [`TypeTag`]. A codec only
//! encodes or decodes values whose tags are all registered for the version in
//! use, and rejects payloads of an unknown version outright.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::constants::{CODEC_VERSION, GENESIS_MAX_SIZE, MAX_BLOCK_SIZE};
use crate::error::CodecError;

/// Registered concrete type of a block body or transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    ProposalBlock,
    AbortBlock,
    CommitBlock,
    StandardBlock,
    AtomicBlock,
    AddValidatorTx,
    AddSubnetValidatorTx,
    AddDelegatorTx,
    CreateChainTx,
    CreateSubnetTx,
    ImportTx,
    ExportTx,
    AdvanceTimeTx,
    RewardValidatorTx,
}

/// Values that report the concrete types they are built from.
pub trait Tagged {
    fn collect_tags(&self, tags: &mut Vec<TypeTag>);
}

impl<T: Tagged> Tagged for Vec<T> {
    fn collect_tags(&self, tags: &mut Vec<TypeTag>) {
        for item in self {
            item.collect_tags(tags);
        }
    }
}

/// The set of types one codec version understands.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    tags: BTreeSet<TypeTag>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Registering the same type twice is an error.
    pub fn register(&mut self, tag: TypeTag) -> Result<(), CodecError> {
        if !self.tags.insert(tag) {
            return Err(CodecError::DuplicateType { tag });
        }
        Ok(())
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.tags.contains(&tag)
    }

    fn check<T: Tagged>(&self, version: u16, value: &T) -> Result<(), CodecError> {
        let mut tags = Vec::new();
        value.collect_tags(&mut tags);
        match tags.into_iter().find(|tag| !self.contains(*tag)) {
            Some(tag) => Err(CodecError::UnregisteredType { tag, version }),
            None => Ok(()),
        }
    }
}

/// A codec manager: one type registry per version plus a size bound.
#[derive(Debug, Clone)]
pub struct Codec {
    max_size: usize,
    versions: BTreeMap<u16, TypeRegistry>,
}

impl Codec {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            versions: BTreeMap::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Register the type registry for a codec version.
    pub fn register_version(
        &mut self,
        version: u16,
        registry: TypeRegistry,
    ) -> Result<(), CodecError> {
        if self.versions.contains_key(&version) {
            return Err(CodecError::DuplicateVersion { version });
        }
        self.versions.insert(version, registry);
        Ok(())
    }

    fn registry(&self, version: u16) -> Result<&TypeRegistry, CodecError> {
        self.versions
            .get(&version)
            .ok_or(CodecError::UnknownVersion { version })
    }

    /// Encode `value` under `version`.
    pub fn marshal<T: BorshSerialize + Tagged>(
        &self,
        version: u16,
        value: &T,
    ) -> Result<Vec<u8>, CodecError> {
        self.registry(version)?.check(version, value)?;

        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(&version.to_be_bytes());
        value
            .serialize(&mut bytes)
            .map_err(|e| CodecError::Malformed {
                reason: e.to_string(),
            })?;

        if bytes.len() > self.max_size {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }
        Ok(bytes)
    }

    /// Decode a value, returning the version it was encoded with.
    ///
    /// Trailing bytes after the payload are rejected.
    pub fn unmarshal<T: BorshDeserialize + Tagged>(
        &self,
        bytes: &[u8],
    ) -> Result<(u16, T), CodecError> {
        if bytes.len() > self.max_size {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }
        if bytes.len() < 2 {
            return Err(CodecError::Truncated { len: bytes.len() });
        }

        let version = u16::from_be_bytes([bytes[0], bytes[1]]);
        let registry = self.registry(version)?;
        let value = T::try_from_slice(&bytes[2..]).map_err(|e| CodecError::Malformed {
            reason: e.to_string(),
        })?;
        registry.check(version, &value)?;
        Ok((version, value))
    }
}

fn build_codec(max_size: usize) -> Result<Codec, CodecError> {
    let mut registry = TypeRegistry::new();
    crate::block::register_block_types(&mut registry)?;
    crate::tx::register_tx_types(&mut registry)?;

    let mut codec = Codec::new(max_size);
    codec.register_version(CODEC_VERSION, registry)?;
    Ok(codec)
}

static CODEC: LazyLock<Codec> = LazyLock::new(|| match build_codec(MAX_BLOCK_SIZE) {
    Ok(codec) => codec,
    Err(e) => panic!("failed to build block codec: {e}"),
});

static GENESIS_CODEC: LazyLock<Codec> = LazyLock::new(|| match build_codec(GENESIS_MAX_SIZE) {
    Ok(codec) => codec,
    Err(e) => panic!("failed to build genesis codec: {e}"),
});

/// The bounded codec used for blocks and transactions.
pub fn codec() -> &'static Codec {
    &CODEC
}

/// The codec used only for parsing genesis bytes.
pub fn genesis_codec() -> &'static Codec {
    &GENESIS_CODEC
}
