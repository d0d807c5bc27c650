//! Power-of-two helpers and work partitioning.
//!
//! All functions are pure. Inputs are expected to be in
//! `1..=MAX_POWER_OF_TWO`; zero and larger values are accepted and mapped
//! to fixed values instead of panicking.

use std::ops::Range;

/// Largest power of two representable in `usize`.
pub const MAX_POWER_OF_TWO: usize = 1 << (usize::BITS - 1);

/// Smallest power of two `>= x`. Returns 1 for `x <= 1` and 0 for
/// `x > MAX_POWER_OF_TWO`, where the answer does not fit in `usize`.
#[inline]
pub fn next_power_of_two(x: usize) -> usize {
    x.checked_next_power_of_two().unwrap_or(0)
}

/// Largest power of two `<= x`. Returns 0 for `x == 0`.
#[inline]
pub fn prev_power_of_two(x: usize) -> usize {
    if x == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - x.leading_zeros())
}

#[inline]
pub fn is_power_of_two(x: usize) -> bool {
    x.is_power_of_two()
}

/// Next transform length usable by the kernels for a dimension of size `x`.
#[inline]
pub fn extend_dimension(x: usize) -> usize {
    next_power_of_two(x)
}

/// Exponent `e` with `2^e == next_power_of_two(n)`.
///
/// For `n > MAX_POWER_OF_TWO` this is `usize::BITS`, the exponent of the
/// power of two that `next_power_of_two` cannot represent.
#[inline]
pub fn next_exponent(n: usize) -> u32 {
    match n.checked_next_power_of_two() {
        Some(power) => power.trailing_zeros(),
        None => usize::BITS,
    }
}

/// Splits `0..len` into at most `parts` contiguous, non-empty ranges.
///
/// Range sizes differ by at most one and the larger ranges come first.
/// Returns an empty vector when `len == 0`; `parts == 0` is treated as 1.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1).min(len);
    if parts == 0 {
        return Vec::new();
    }

    let base = len / parts;
    let extra = len % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;

    for i in 0..parts {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }

    ranges
}
