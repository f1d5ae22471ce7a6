//! Proof targets and difficulty retargeting
//!
//! Targets travel in headers as compact `bits` (a base-256 float: one byte of
//! exponent, three bytes of mantissa). A target is a CEILING: a lower target
//! is harder to meet, and contributes more work.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Retarget algorithm parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetargetParams {
    /// Easiest allowed target.
    pub pow_limit: U256,
    /// Time one retarget interval is expected to take (seconds).
    pub target_timespan_secs: u64,
    /// Expected time between blocks (seconds).
    pub target_spacing_secs: u64,
    /// Keep every block at its parent's target (regtest).
    pub no_retargeting: bool,
}

impl RetargetParams {
    /// Number of blocks between retargets.
    pub fn interval(&self) -> u64 {
        (self.target_timespan_secs / self.target_spacing_secs.max(1)).max(1)
    }

    /// Whether a header at `height` starts a new retarget interval.
    pub fn is_retarget_height(&self, height: u64) -> bool {
        !self.no_retargeting && height % self.interval() == 0
    }
}

/// Decode compact `bits` into a full target.
///
/// Returns `None` for negative or overflowing encodings.
pub fn compact_to_target(bits: u32) -> Option<U256> {
    let size = (bits >> 24) as usize;
    let mut word = bits & 0x007f_ffff;
    let negative = word != 0 && (bits & 0x0080_0000) != 0;
    let overflow =
        word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    if negative || overflow {
        return None;
    }
    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        U256::from(word) << (8 * (size - 3))
    };
    Some(target)
}

/// Encode a target as compact `bits`, rounding the mantissa down.
pub fn target_to_compact(target: U256) -> u32 {
    let mut size = (target.bits() + 7) / 8;
    let mut compact: u64 = if size <= 3 {
        target.low_u64() << (8 * (3 - size))
    } else {
        (target >> (8 * (size - 3))).low_u64()
    };
    // The 0x00800000 bit is the sign; shift it out of the mantissa.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    (compact as u32) | ((size as u32) << 24)
}

/// Work represented by meeting `target`: `2^256 / (target + 1)`.
///
/// Computed as `!target / (target + 1) + 1` since `2^256` does not fit.
pub fn work_for_target(target: U256) -> U256 {
    let (denominator, overflow) = target.overflowing_add(U256::one());
    if overflow {
        return U256::one();
    }
    (!target / denominator) + U256::one()
}

/// Compute the target for a retarget boundary.
///
/// `actual_timespan_secs` is the time the previous interval actually took.
/// It is clamped to a factor of 4 either way, as in Bitcoin.
pub fn calculate_next_target(
    parent_bits: u32,
    actual_timespan_secs: u64,
    params: &RetargetParams,
) -> u32 {
    let expected = params.target_timespan_secs.max(1);
    let clamped = actual_timespan_secs.clamp((expected / 4).max(1), expected * 4);

    let Some(current) = compact_to_target(parent_bits) else {
        return target_to_compact(params.pow_limit);
    };

    // new = current * actual / expected, split to stay inside 256 bits
    let quotient = current / U256::from(expected);
    let remainder = current % U256::from(expected);
    let next = quotient
        .saturating_mul(U256::from(clamped))
        .saturating_add(remainder.saturating_mul(U256::from(clamped)) / U256::from(expected));

    target_to_compact(next.min(params.pow_limit))
}
