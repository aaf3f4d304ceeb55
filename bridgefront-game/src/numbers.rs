//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a collection length to u32, saturating at `u32::MAX`.
#[must_use]
pub fn usize_to_u32(value: usize) -> u32 {
    cast::<usize, u32>(value).unwrap_or(u32::MAX)
}

/// Convert a u32 index into a usize (lossless on every supported target).
#[must_use]
pub fn u32_to_usize(value: u32) -> usize {
    cast::<u32, usize>(value).unwrap_or(usize::MAX)
}

/// Narrow a u64 into u32, saturating at `u32::MAX`.
#[must_use]
pub fn u64_to_u32(value: u64) -> u32 {
    cast::<u64, u32>(value).unwrap_or(u32::MAX)
}

/// Apply a signed delta to an unsigned value, clamped to `[0, max]`.
#[must_use]
pub fn apply_delta(value: u32, delta: i32, max: u32) -> u32 {
    let shifted = i64::from(value) + i64::from(delta);
    let clamped = shifted.clamp(0, i64::from(max));
    cast::<i64, u32>(clamped).unwrap_or(0)
}
