//! Bit twiddling for capacity shaping.

use num_traits::{PrimInt, Unsigned};

/// Fill all trailing zeroes after the leading 1.
///
/// Returns the smallest value of the form `2^n - 1` that is greater than or
/// equal to `u` (`ftz(0) == 0`). Storage capacities are rounded with this so
/// a perfectly balanced tree always fits exactly.
///
/// The or-shift cascade runs `log2(width)` steps regardless of input.
#[inline]
pub fn ftz<U: PrimInt + Unsigned>(u: U) -> U {
    let bits = U::zero().count_zeros();
    let mut u = u;
    let mut shift = 1;
    while shift < bits {
        u = u | u.unsigned_shr(shift);
        shift <<= 1;
    }
    u
}
