use std::path::Path;

use serde::{Deserialize, Serialize};

use cairn_crypto::hash::blake3_hash;
use cairn_types::constants::{
    KILO_CAIRN, MEGA_CAIRN, MILLI_CAIRN, ONE_CAIRN, PERCENT_DENOMINATOR, SECONDS_PER_DAY,
};
use cairn_types::primitives::{Amount, Id, Timestamp, PRIMARY_NETWORK_ID};

use crate::error::PlatformError;
use crate::reward::RewardConfig;

/// Chain parameters. Loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub network_id: u32,
    /// Id of this chain, as referenced by import and export transactions.
    #[serde(with = "hex_id")]
    pub chain_id: Id,
    /// The native staking and fee asset.
    #[serde(with = "hex_id")]
    pub asset_id: Id,
    /// Blocks whose parent chain time is at or after this carry their own timestamp.
    pub timed_blocks_time: Timestamp,
    pub fees: FeeConfig,
    pub staking: StakingConfig,
    pub reward: RewardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub tx_fee: Amount,
    pub create_subnet_fee: Amount,
    pub create_chain_fee: Amount,
    pub add_primary_validator_fee: Amount,
    pub add_primary_delegator_fee: Amount,
    pub add_subnet_validator_fee: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    pub min_validator_stake: Amount,
    pub max_validator_stake: Amount,
    pub min_delegator_stake: Amount,
    /// Minimum delegation shares a validator may charge, over `PERCENT_DENOMINATOR`.
    pub min_delegation_fee: u32,
    /// Seconds.
    pub min_stake_duration: u64,
    /// Seconds.
    pub max_stake_duration: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_id: 12345,
            chain_id: PRIMARY_NETWORK_ID,
            asset_id: blake3_hash(b"CAIRN"),
            timed_blocks_time: 0,
            fees: FeeConfig {
                tx_fee: MILLI_CAIRN,
                create_subnet_fee: 100 * MILLI_CAIRN,
                create_chain_fee: 100 * MILLI_CAIRN,
                add_primary_validator_fee: 0,
                add_primary_delegator_fee: 0,
                add_subnet_validator_fee: MILLI_CAIRN,
            },
            staking: StakingConfig {
                min_validator_stake: 2 * KILO_CAIRN,
                max_validator_stake: 3 * MEGA_CAIRN,
                min_delegator_stake: 25 * ONE_CAIRN,
                min_delegation_fee: 20_000,
                min_stake_duration: SECONDS_PER_DAY,
                max_stake_duration: 365 * SECONDS_PER_DAY,
            },
            reward: RewardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlatformError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PlatformError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PlatformError> {
        let config: Config = toml::from_str(contents).map_err(|e| PlatformError::Config {
            reason: format!("failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, PlatformError> {
        toml::to_string_pretty(self).map_err(|e| PlatformError::Config {
            reason: format!("failed to serialize config: {}", e),
        })
    }

    /// Check that the parameters are internally consistent.
    pub fn validate(&self) -> Result<(), PlatformError> {
        let fail = |reason: &str| {
            Err(PlatformError::Config {
                reason: reason.to_string(),
            })
        };
        let staking = &self.staking;
        let reward = &self.reward;

        if staking.min_validator_stake > staking.max_validator_stake {
            return fail("min_validator_stake exceeds max_validator_stake");
        }
        if staking.min_stake_duration == 0
            || staking.min_stake_duration > staking.max_stake_duration
        {
            return fail("stake duration bounds are empty");
        }
        if u64::from(staking.min_delegation_fee) > PERCENT_DENOMINATOR {
            return fail("min_delegation_fee exceeds 100%");
        }
        if reward.min_consumption_rate > reward.max_consumption_rate {
            return fail("min_consumption_rate exceeds max_consumption_rate");
        }
        if reward.max_consumption_rate > PERCENT_DENOMINATOR {
            return fail("max_consumption_rate exceeds 100%");
        }
        if reward.minting_period == 0 {
            return fail("minting_period must be positive");
        }
        if reward.supply_cap == 0 {
            return fail("supply_cap must be positive");
        }
        Ok(())
    }

    /// Whether a block built on a parent with `parent_time` must be timed.
    pub fn timed_blocks_active(&self, parent_time: Timestamp) -> bool {
        parent_time >= self.timed_blocks_time
    }
}

/// Serde helper storing 32-byte ids as hex strings.
mod hex_id {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes for id"))
    }
}
