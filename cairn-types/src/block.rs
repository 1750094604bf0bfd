use borsh::{BorshDeserialize, BorshSerialize};

use crate::codec::{codec, Codec, Tagged, TypeRegistry, TypeTag};
use crate::constants::CODEC_VERSION;
use crate::error::CodecError;
use crate::primitives::{Id, Timestamp};
use crate::tx::Tx;

/// Block header. Legacy headers predate timed blocks and carry no time;
/// their timestamp is whatever the chain time was after applying them.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum BlockHeader {
    Legacy {
        parent: Id,
        height: u64,
    },
    Timed {
        parent: Id,
        height: u64,
        time: Timestamp,
    },
}

impl BlockHeader {
    pub fn parent(&self) -> Id {
        match self {
            BlockHeader::Legacy { parent, .. } | BlockHeader::Timed { parent, .. } => *parent,
        }
    }

    pub fn height(&self) -> u64 {
        match self {
            BlockHeader::Legacy { height, .. } | BlockHeader::Timed { height, .. } => *height,
        }
    }

    pub fn time(&self) -> Option<Timestamp> {
        match self {
            BlockHeader::Legacy { .. } => None,
            BlockHeader::Timed { time, .. } => Some(*time),
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, BlockHeader::Timed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum BlockBody {
    /// Carries one staker, advance-time or reward transaction whose effect is
    /// decided by the Commit or Abort child that consensus accepts.
    Proposal { tx: Tx },
    Abort,
    Commit,
    Standard { txs: Vec<Tx> },
    Atomic { tx: Tx },
}

impl BlockBody {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            BlockBody::Proposal { .. } => TypeTag::ProposalBlock,
            BlockBody::Abort => TypeTag::AbortBlock,
            BlockBody::Commit => TypeTag::CommitBlock,
            BlockBody::Standard { .. } => TypeTag::StandardBlock,
            BlockBody::Atomic { .. } => TypeTag::AtomicBlock,
        }
    }

    pub fn txs(&self) -> &[Tx] {
        match self {
            BlockBody::Proposal { tx } | BlockBody::Atomic { tx } => std::slice::from_ref(tx),
            BlockBody::Standard { txs } => txs,
            BlockBody::Abort | BlockBody::Commit => &[],
        }
    }
}

/// The encoded form of a block.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UnsignedBlock {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Tagged for UnsignedBlock {
    fn collect_tags(&self, tags: &mut Vec<TypeTag>) {
        tags.push(self.body.type_tag());
        for tx in self.body.txs() {
            tx.collect_tags(tags);
        }
    }
}

/// Processing status of a block as recorded in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum BlockStatus {
    Processing,
    Accepted,
    Rejected,
}

/// An initialized, immutable block.
///
/// The only constructors are [`Block::new`] and [`Block::parse`], both of
/// which compute the id from the encoded bytes exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: Id,
    bytes: Vec<u8>,
    inner: UnsignedBlock,
}

/// One method per block kind. Dispatch is an exhaustive match in [`Block::visit`].
pub trait BlockVisitor {
    type Error;

    fn standard_block(&mut self, block: &Block, txs: &[Tx]) -> Result<(), Self::Error>;
    fn proposal_block(&mut self, block: &Block, tx: &Tx) -> Result<(), Self::Error>;
    fn commit_block(&mut self, block: &Block) -> Result<(), Self::Error>;
    fn abort_block(&mut self, block: &Block) -> Result<(), Self::Error>;
    fn atomic_block(&mut self, block: &Block, tx: &Tx) -> Result<(), Self::Error>;
}

impl Block {
    /// Build and encode a new block with the bounded codec.
    pub fn new(header: BlockHeader, body: BlockBody) -> Result<Self, CodecError> {
        let inner = UnsignedBlock { header, body };
        let bytes = codec().marshal(CODEC_VERSION, &inner)?;
        Ok(Self::from_parts(bytes, inner))
    }

    /// Decode a block. Embedded transactions get their ids while decoding.
    pub fn parse(codec: &Codec, bytes: &[u8]) -> Result<Self, CodecError> {
        let (_, inner): (u16, UnsignedBlock) = codec.unmarshal(bytes)?;
        Ok(Self::from_parts(bytes.to_vec(), inner))
    }

    fn from_parts(bytes: Vec<u8>, inner: UnsignedBlock) -> Self {
        let id = *blake3::hash(&bytes).as_bytes();
        Self { id, bytes, inner }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn parent(&self) -> Id {
        self.inner.header.parent()
    }

    pub fn height(&self) -> u64 {
        self.inner.header.height()
    }

    /// The header time, present only on timed blocks.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.inner.header.time()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> &BlockHeader {
        &self.inner.header
    }

    pub fn body(&self) -> &BlockBody {
        &self.inner.body
    }

    pub fn txs(&self) -> &[Tx] {
        self.inner.body.txs()
    }

    pub fn visit<V: BlockVisitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        match &self.inner.body {
            BlockBody::Standard { txs } => visitor.standard_block(self, txs),
            BlockBody::Proposal { tx } => visitor.proposal_block(self, tx),
            BlockBody::Commit => visitor.commit_block(self),
            BlockBody::Abort => visitor.abort_block(self),
            BlockBody::Atomic { tx } => visitor.atomic_block(self, tx),
        }
    }
}

pub fn register_block_types(registry: &mut TypeRegistry) -> Result<(), CodecError> {
    for tag in [
        TypeTag::ProposalBlock,
        TypeTag::AbortBlock,
        TypeTag::CommitBlock,
        TypeTag::StandardBlock,
        TypeTag::AtomicBlock,
    ] {
        registry.register(tag)?;
    }
    Ok(())
}
