//! Chain-time transitions: promoting pending stakers and retiring subnet
//! validators as time moves forward.

use cairn_types::constants::SYNC_BOUND;
use cairn_types::primitives::Timestamp;
use cairn_types::staker::StakerKind;

use super::Context;
use crate::error::PlatformError;
use crate::state::{Chain, Diff};

/// The earliest time at which the staker sets change: the next pending start
/// or the next current end, whichever comes first.
pub fn next_staker_change_time(chain: &dyn Chain) -> Result<Option<Timestamp>, PlatformError> {
    let next_end = chain.current_stakers()?.first().map(|s| s.end_time);
    let next_start = chain.pending_stakers()?.first().map(|s| s.start_time);
    Ok(match (next_end, next_start) {
        (Some(end), Some(start)) => Some(end.min(start)),
        (end, start) => end.or(start),
    })
}

/// Check that the chain may move to `time`.
///
/// Proposed times must move forward strictly; a timed block header may repeat
/// its parent's time.
pub fn verify_time_advance(
    ctx: &Context,
    chain: &dyn Chain,
    time: Timestamp,
    allow_equal: bool,
) -> Result<(), PlatformError> {
    let now = chain.timestamp()?;
    if time < now || (time == now && !allow_equal) {
        return Err(PlatformError::rejected(format!(
            "proposed time {} does not move past chain time {}",
            time, now
        )));
    }
    let bound = ctx.clock.now().saturating_add(SYNC_BOUND);
    if time > bound {
        return Err(PlatformError::rejected(format!(
            "proposed time {} is beyond local time bound {}",
            time, bound
        )));
    }
    if let Some(next) = next_staker_change_time(chain)? {
        if time > next {
            return Err(PlatformError::rejected(format!(
                "proposed time {} skips the staker change at {}",
                time, next
            )));
        }
    }
    Ok(())
}

/// Move `diff` to `time`: promote every pending staker due by then, drop
/// ended subnet validators and mint the promoted stakers' potential rewards
/// into the supply.
///
/// Primary network stakers that end at `time` stay current until a reward
/// proposal removes them.
pub fn advance_time_to(
    ctx: &Context,
    diff: &mut Diff,
    time: Timestamp,
) -> Result<(), PlatformError> {
    let mut supply = diff.current_supply()?;

    for staker in diff.pending_stakers()? {
        if staker.start_time > time {
            break;
        }
        let mut promoted = staker.clone();
        if staker.kind.earns_reward() {
            if supply == 0 {
                return Err(PlatformError::rejected(
                    "cannot compute rewards with zero supply",
                ));
            }
            let reward = ctx.rewards.calculate(
                staker.end_time.saturating_sub(staker.start_time),
                staker.weight,
                supply,
            );
            supply = supply
                .checked_add(reward)
                .ok_or_else(|| PlatformError::rejected("supply overflow"))?;
            promoted.potential_reward = reward;
        }
        diff.delete_pending_staker(&staker);
        diff.put_current_staker(promoted);
    }

    for staker in diff.current_stakers()? {
        if staker.end_time > time {
            break;
        }
        if staker.kind == StakerKind::SubnetValidator {
            diff.delete_current_staker(&staker);
        }
    }

    diff.set_current_supply(supply);
    diff.set_timestamp(time);
    Ok(())
}
