use borsh::{BorshDeserialize, BorshSerialize};

use crate::codec::{Codec, Tagged, TypeRegistry, TypeTag};
use crate::constants::CODEC_VERSION;
use crate::error::CodecError;
use crate::primitives::{Amount, Hash, Id, NodeId, Timestamp};
use crate::utxo::{Credential, OutputOwners, TransferableInput, TransferableOutput};

/// Fields shared by every transaction that moves funds.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct BaseTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub outs: Vec<TransferableOutput>,
    pub ins: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

/// The staking period and weight of a validator or delegator.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Validator {
    pub node_id: NodeId,
    pub start: Timestamp,
    pub end: Timestamp,
    pub weight: Amount,
}

impl Validator {
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether this period lies entirely within `other`.
    pub fn bounded_by(&self, other: &Validator) -> bool {
        self.start >= other.start && self.end <= other.end
    }
}

/// Owner key indices authorizing an action on a subnet. The matching
/// signatures are the last credential of the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct SubnetAuth {
    pub sig_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
    /// Share of delegator rewards paid to this validator, over `PERCENT_DENOMINATOR`.
    pub delegation_shares: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddSubnetValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddDelegatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateChainTx {
    pub base: BaseTx,
    pub subnet_id: Id,
    pub chain_name: String,
    pub vm_id: Id,
    pub fx_ids: Vec<Id>,
    pub genesis_data: Vec<u8>,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateSubnetTx {
    pub base: BaseTx,
    pub owner: OutputOwners,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ImportTx {
    pub base: BaseTx,
    pub source_chain: Id,
    pub imported_inputs: Vec<TransferableInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ExportTx {
    pub base: BaseTx,
    pub destination_chain: Id,
    pub exported_outputs: Vec<TransferableOutput>,
}

/// Proposes moving the chain time forward.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AdvanceTimeTx {
    pub time: Timestamp,
}

/// Proposes removing the staker added by `tx_id` and paying its reward.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RewardValidatorTx {
    pub tx_id: Id,
}

/// The unsigned body of every transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum UnsignedTx {
    AddValidator(AddValidatorTx),
    AddSubnetValidator(AddSubnetValidatorTx),
    AddDelegator(AddDelegatorTx),
    CreateChain(CreateChainTx),
    CreateSubnet(CreateSubnetTx),
    Import(ImportTx),
    Export(ExportTx),
    AdvanceTime(AdvanceTimeTx),
    RewardValidator(RewardValidatorTx),
}

/// One method per transaction kind. Dispatch is an exhaustive match in
/// [`UnsignedTx::visit`].
pub trait TxVisitor {
    type Output;
    type Error;

    fn add_validator_tx(&mut self, tx: &AddValidatorTx) -> Result<Self::Output, Self::Error>;
    fn add_subnet_validator_tx(
        &mut self,
        tx: &AddSubnetValidatorTx,
    ) -> Result<Self::Output, Self::Error>;
    fn add_delegator_tx(&mut self, tx: &AddDelegatorTx) -> Result<Self::Output, Self::Error>;
    fn create_chain_tx(&mut self, tx: &CreateChainTx) -> Result<Self::Output, Self::Error>;
    fn create_subnet_tx(&mut self, tx: &CreateSubnetTx) -> Result<Self::Output, Self::Error>;
    fn import_tx(&mut self, tx: &ImportTx) -> Result<Self::Output, Self::Error>;
    fn export_tx(&mut self, tx: &ExportTx) -> Result<Self::Output, Self::Error>;
    fn advance_time_tx(&mut self, tx: &AdvanceTimeTx) -> Result<Self::Output, Self::Error>;
    fn reward_validator_tx(
        &mut self,
        tx: &RewardValidatorTx,
    ) -> Result<Self::Output, Self::Error>;
}

impl UnsignedTx {
    pub fn visit<V: TxVisitor>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        match self {
            UnsignedTx::AddValidator(tx) => visitor.add_validator_tx(tx),
            UnsignedTx::AddSubnetValidator(tx) => visitor.add_subnet_validator_tx(tx),
            UnsignedTx::AddDelegator(tx) => visitor.add_delegator_tx(tx),
            UnsignedTx::CreateChain(tx) => visitor.create_chain_tx(tx),
            UnsignedTx::CreateSubnet(tx) => visitor.create_subnet_tx(tx),
            UnsignedTx::Import(tx) => visitor.import_tx(tx),
            UnsignedTx::Export(tx) => visitor.export_tx(tx),
            UnsignedTx::AdvanceTime(tx) => visitor.advance_time_tx(tx),
            UnsignedTx::RewardValidator(tx) => visitor.reward_validator_tx(tx),
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            UnsignedTx::AddValidator(_) => TypeTag::AddValidatorTx,
            UnsignedTx::AddSubnetValidator(_) => TypeTag::AddSubnetValidatorTx,
            UnsignedTx::AddDelegator(_) => TypeTag::AddDelegatorTx,
            UnsignedTx::CreateChain(_) => TypeTag::CreateChainTx,
            UnsignedTx::CreateSubnet(_) => TypeTag::CreateSubnetTx,
            UnsignedTx::Import(_) => TypeTag::ImportTx,
            UnsignedTx::Export(_) => TypeTag::ExportTx,
            UnsignedTx::AdvanceTime(_) => TypeTag::AdvanceTimeTx,
            UnsignedTx::RewardValidator(_) => TypeTag::RewardValidatorTx,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnsignedTx::AddValidator(_) => "AddValidatorTx",
            UnsignedTx::AddSubnetValidator(_) => "AddSubnetValidatorTx",
            UnsignedTx::AddDelegator(_) => "AddDelegatorTx",
            UnsignedTx::CreateChain(_) => "CreateChainTx",
            UnsignedTx::CreateSubnet(_) => "CreateSubnetTx",
            UnsignedTx::Import(_) => "ImportTx",
            UnsignedTx::Export(_) => "ExportTx",
            UnsignedTx::AdvanceTime(_) => "AdvanceTimeTx",
            UnsignedTx::RewardValidator(_) => "RewardValidatorTx",
        }
    }

    pub fn base(&self) -> Option<&BaseTx> {
        match self {
            UnsignedTx::AddValidator(tx) => Some(&tx.base),
            UnsignedTx::AddSubnetValidator(tx) => Some(&tx.base),
            UnsignedTx::AddDelegator(tx) => Some(&tx.base),
            UnsignedTx::CreateChain(tx) => Some(&tx.base),
            UnsignedTx::CreateSubnet(tx) => Some(&tx.base),
            UnsignedTx::Import(tx) => Some(&tx.base),
            UnsignedTx::Export(tx) => Some(&tx.base),
            UnsignedTx::AdvanceTime(_) | UnsignedTx::RewardValidator(_) => None,
        }
    }

    /// The staking period of a staker transaction.
    pub fn staker(&self) -> Option<&Validator> {
        match self {
            UnsignedTx::AddValidator(tx) => Some(&tx.validator),
            UnsignedTx::AddSubnetValidator(tx) => Some(&tx.validator),
            UnsignedTx::AddDelegator(tx) => Some(&tx.validator),
            _ => None,
        }
    }

    /// Decision transactions are applied directly by standard and atomic blocks.
    pub fn is_decision(&self) -> bool {
        matches!(
            self,
            UnsignedTx::CreateChain(_)
                | UnsignedTx::CreateSubnet(_)
                | UnsignedTx::Import(_)
                | UnsignedTx::Export(_)
        )
    }

    /// The message credentials sign: BLAKE3 of the borsh-encoded unsigned tx.
    pub fn signing_hash(&self) -> Result<Hash, CodecError> {
        let bytes = borsh::to_vec(self).map_err(|e| CodecError::Malformed {
            reason: e.to_string(),
        })?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

impl Tagged for UnsignedTx {
    fn collect_tags(&self, tags: &mut Vec<TypeTag>) {
        tags.push(self.type_tag());
    }
}

/// A signed transaction.
///
/// The id is the BLAKE3 hash of the versioned encoding of the signed
/// transaction. It is computed whenever a value is constructed or decoded,
/// so every reachable `Tx` carries its id.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct Tx {
    unsigned: UnsignedTx,
    credentials: Vec<Credential>,
    #[borsh(skip)]
    id: Id,
}

impl Tx {
    pub fn new(unsigned: UnsignedTx, credentials: Vec<Credential>) -> Result<Self, CodecError> {
        let mut tx = Self {
            unsigned,
            credentials,
            id: [0u8; 32],
        };
        tx.initialize()?;
        Ok(tx)
    }

    /// Decode a standalone transaction.
    pub fn parse(codec: &Codec, bytes: &[u8]) -> Result<Self, CodecError> {
        let (_, tx): (u16, Tx) = codec.unmarshal(bytes)?;
        Ok(tx)
    }

    fn initialize(&mut self) -> Result<(), CodecError> {
        let bytes = self.bytes()?;
        self.id = *blake3::hash(&bytes).as_bytes();
        Ok(())
    }

    /// The versioned encoding of the signed transaction.
    pub fn bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut bytes = CODEC_VERSION.to_be_bytes().to_vec();
        self.serialize(&mut bytes)
            .map_err(|e| CodecError::Malformed {
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn unsigned(&self) -> &UnsignedTx {
        &self.unsigned
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn visit<V: TxVisitor>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        self.unsigned.visit(visitor)
    }
}

impl BorshDeserialize for Tx {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let unsigned = UnsignedTx::deserialize_reader(reader)?;
        let credentials = Vec::<Credential>::deserialize_reader(reader)?;
        let mut tx = Self {
            unsigned,
            credentials,
            id: [0u8; 32],
        };
        tx.initialize()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(tx)
    }
}

impl Tagged for Tx {
    fn collect_tags(&self, tags: &mut Vec<TypeTag>) {
        self.unsigned.collect_tags(tags);
    }
}

/// Outcome recorded for every transaction applied to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum TxStatus {
    Committed,
    Aborted,
}

pub fn register_tx_types(registry: &mut TypeRegistry) -> Result<(), CodecError> {
    for tag in [
        TypeTag::AddValidatorTx,
        TypeTag::AddSubnetValidatorTx,
        TypeTag::AddDelegatorTx,
        TypeTag::CreateChainTx,
        TypeTag::CreateSubnetTx,
        TypeTag::ImportTx,
        TypeTag::ExportTx,
        TypeTag::AdvanceTimeTx,
        TypeTag::RewardValidatorTx,
    ] {
        registry.register(tag)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::codec;

    fn create_subnet(memo: &[u8]) -> UnsignedTx {
        UnsignedTx::CreateSubnet(CreateSubnetTx {
            base: BaseTx {
                network_id: 12345,
                memo: memo.to_vec(),
                ..BaseTx::default()
            },
            owner: OutputOwners::single([3u8; 32]),
        })
    }

    #[test]
    fn test_id_depends_on_credentials() {
        let unsigned = create_subnet(b"");
        let a = Tx::new(unsigned.clone(), vec![]).unwrap();
        let b = Tx::new(
            unsigned,
            vec![Credential {
                signatures: vec![[1u8; 64]],
            }],
        )
        .unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(
            a.unsigned().signing_hash().unwrap(),
            b.unsigned().signing_hash().unwrap()
        );
    }

    #[test]
    fn test_parse_restores_id() {
        let tx = Tx::new(create_subnet(b"memo"), vec![Credential::default()]).unwrap();
        let bytes = codec().marshal(CODEC_VERSION, &tx).unwrap();
        assert_eq!(bytes, tx.bytes().unwrap());
        assert_eq!(
            Tx::try_from_slice(&bytes[2..]).unwrap().id(),
            tx.id()
        );

        let parsed = Tx::parse(codec(), &bytes).unwrap();
        assert_eq!(parsed.id(), tx.id());
        assert_eq!(parsed, tx);
    }

    #[test]
    fn test_classification() {
        let advance = UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 5 });
        assert!(!advance.is_decision());
        assert!(advance.base().is_none());
        assert!(advance.staker().is_none());
        assert!(create_subnet(b"").is_decision());

        let delegator = UnsignedTx::AddDelegator(AddDelegatorTx {
            base: BaseTx::default(),
            validator: Validator {
                node_id: [1u8; 20],
                start: 10,
                end: 30,
                weight: 5,
            },
            stake: vec![],
            rewards_owner: OutputOwners::default(),
        });
        assert_eq!(delegator.staker().map(Validator::duration), Some(20));
        assert_eq!(delegator.name(), "AddDelegatorTx");
    }

    struct NameVisitor;

    impl TxVisitor for NameVisitor {
        type Output = &'static str;
        type Error = ();

        fn add_validator_tx(&mut self, _: &AddValidatorTx) -> Result<&'static str, ()> {
            Ok("add_validator")
        }
        fn add_subnet_validator_tx(
            &mut self,
            _: &AddSubnetValidatorTx,
        ) -> Result<&'static str, ()> {
            Ok("add_subnet_validator")
        }
        fn add_delegator_tx(&mut self, _: &AddDelegatorTx) -> Result<&'static str, ()> {
            Ok("add_delegator")
        }
        fn create_chain_tx(&mut self, _: &CreateChainTx) -> Result<&'static str, ()> {
            Ok("create_chain")
        }
        fn create_subnet_tx(&mut self, _: &CreateSubnetTx) -> Result<&'static str, ()> {
            Ok("create_subnet")
        }
        fn import_tx(&mut self, _: &ImportTx) -> Result<&'static str, ()> {
            Ok("import")
        }
        fn export_tx(&mut self, _: &ExportTx) -> Result<&'static str, ()> {
            Ok("export")
        }
        fn advance_time_tx(&mut self, _: &AdvanceTimeTx) -> Result<&'static str, ()> {
            Err(())
        }
        fn reward_validator_tx(&mut self, _: &RewardValidatorTx) -> Result<&'static str, ()> {
            Ok("reward_validator")
        }
    }

    #[test]
    fn test_visit_dispatches_by_kind() {
        let tx = Tx::new(create_subnet(b""), vec![]).unwrap();
        assert_eq!(tx.visit(&mut NameVisitor), Ok("create_subnet"));
        let advance = UnsignedTx::AdvanceTime(AdvanceTimeTx { time: 1 });
        assert_eq!(advance.visit(&mut NameVisitor), Err(()));
    }
}
