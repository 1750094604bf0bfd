//! Staking reward calculation.
//!
//! ```text
//! remaining_supply    = supply_cap - current_supply
//! portion_of_supply   = staked_amount / current_supply
//! portion_of_duration = staked_duration / minting_period
//! minting_rate        = min_rate + (max_rate - min_rate) * portion_of_duration
//! reward = remaining_supply * portion_of_supply * minting_rate * portion_of_duration
//! ```
//!
//! Everything is multiplied out in 512-bit integers and divided once at the
//! end, so the result is exact up to a single floor.

use primitive_types::U512;
use serde::{Deserialize, Serialize};

use cairn_types::constants::{MEGA_CAIRN, PERCENT_DENOMINATOR, SECONDS_PER_DAY};
use cairn_types::primitives::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Minting rate for a stake lasting the whole minting period, over `PERCENT_DENOMINATOR`.
    pub max_consumption_rate: u64,
    /// Minting rate for a vanishingly short stake, over `PERCENT_DENOMINATOR`.
    pub min_consumption_rate: u64,
    /// Seconds.
    pub minting_period: u64,
    pub supply_cap: Amount,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            max_consumption_rate: 12 * PERCENT_DENOMINATOR / 100,
            min_consumption_rate: 10 * PERCENT_DENOMINATOR / 100,
            minting_period: 365 * SECONDS_PER_DAY,
            supply_cap: 720 * MEGA_CAIRN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Calculator {
    max_sub_min_rate: U512,
    min_rate: U512,
    minting_period: U512,
    supply_cap: Amount,
}

impl Calculator {
    pub fn new(config: &RewardConfig) -> Self {
        Self {
            max_sub_min_rate: U512::from(
                config
                    .max_consumption_rate
                    .saturating_sub(config.min_consumption_rate),
            ),
            min_rate: U512::from(config.min_consumption_rate),
            minting_period: U512::from(config.minting_period),
            supply_cap: config.supply_cap,
        }
    }

    /// Reward for staking `staked_amount` for `staked_duration` seconds when
    /// `current_supply` is in circulation. Never exceeds the remaining supply.
    ///
    /// # Panics
    ///
    /// Panics if `current_supply` is zero.
    pub fn calculate(
        &self,
        staked_duration: u64,
        staked_amount: Amount,
        current_supply: Amount,
    ) -> Amount {
        assert!(
            current_supply > 0,
            "reward calculation requires a non-zero current supply"
        );
        let remaining = self.supply_cap.saturating_sub(current_supply);
        let duration = U512::from(staked_duration);

        // minting_rate * minting_period * PERCENT_DENOMINATOR
        let rate = self.min_rate * self.minting_period + self.max_sub_min_rate * duration;

        let numerator = U512::from(remaining) * U512::from(staked_amount) * rate * duration;
        let denominator = self.minting_period
            * self.minting_period
            * U512::from(PERCENT_DENOMINATOR)
            * U512::from(current_supply);
        let reward = numerator / denominator;

        if reward > U512::from(remaining) {
            remaining
        } else {
            reward.low_u64()
        }
    }
}
