use borsh::{BorshDeserialize, BorshSerialize};

use crate::codec::{genesis_codec, Tagged, TypeTag};
use crate::constants::CODEC_VERSION;
use crate::error::CodecError;
use crate::primitives::{Amount, Timestamp};
use crate::tx::Tx;
use crate::utxo::Utxo;

/// Initial ledger contents of a chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Genesis {
    pub utxos: Vec<Utxo>,
    /// `AddValidator` transactions for the initial validator set.
    pub validators: Vec<Tx>,
    /// `CreateChain` transactions for chains that exist from genesis.
    pub chains: Vec<Tx>,
    pub timestamp: Timestamp,
    pub initial_supply: Amount,
    pub message: String,
}

impl Tagged for Genesis {
    fn collect_tags(&self, tags: &mut Vec<TypeTag>) {
        self.validators.collect_tags(tags);
        self.chains.collect_tags(tags);
    }
}

impl Genesis {
    /// Decode genesis bytes with the genesis codec.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let (_, genesis): (u16, Genesis) = genesis_codec().unmarshal(bytes)?;
        Ok(genesis)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        genesis_codec().marshal(CODEC_VERSION, self)
    }
}
