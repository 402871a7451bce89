//! 256-bit arithmetic kernel.
//!
//! Words are unsigned `U256`; the signed view is two's-complement over 256
//! bits, taken on demand (`S(x) = x` if `x < 2^255`, else `x - 2^256`).
//! Every operation reduces modulo 2^256 before returning. ADDMOD/MULMOD
//! widen to `U512` so the intermediate sum/product never truncates.

use primitive_types::{U256, U512};

/// Two's-complement sign bit.
pub fn is_negative(x: U256) -> bool {
    x.bit(255)
}

/// Two's-complement negation, `-x mod 2^256`.
pub fn negate(x: U256) -> U256 {
    (!x).overflowing_add(U256::one()).0
}

fn abs(x: U256) -> U256 {
    if is_negative(x) {
        negate(x)
    } else {
        x
    }
}

/// Truncated signed division. `b = 0` yields 0.
/// `SDIV(-2^255, -1)` wraps back to `-2^255`, which falls out of the
/// magnitude/sign split without a special case.
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let q = abs(a) / abs(b);
    if is_negative(a) != is_negative(b) {
        negate(q)
    } else {
        q
    }
}

/// Signed remainder; the result takes the sign of `a`. `b = 0` yields 0.
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let r = abs(a) % abs(b);
    if is_negative(a) {
        negate(r)
    } else {
        r
    }
}

/// `(a + b) mod n` over the full 257-bit sum. `n = 0` yields 0.
pub fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let sum = U512::from(a) + U512::from(b);
    low_256(sum % U512::from(n))
}

/// `(a * b) mod n` over the full 512-bit product. `n = 0` yields 0.
pub fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let product = U512::from(a) * U512::from(b);
    low_256(product % U512::from(n))
}

// The remainder is < n <= U256::MAX, so the high limbs are zero.
fn low_256(x: U512) -> U256 {
    U256([x.0[0], x.0[1], x.0[2], x.0[3]])
}

/// Sign-extend `x` from its low `k + 1` bytes. `k >= 31` leaves `x` intact.
pub fn sign_extend(k: U256, x: U256) -> U256 {
    if k >= U256::from(31) {
        return x;
    }
    let bit_position = (k.low_u64() * 8 + 7) as usize;
    let mask = (U256::one() << bit_position) - U256::one();
    if x.bit(bit_position) {
        x | !mask
    } else {
        x & mask
    }
}

/// Byte `i` of `x`, counting from the most significant. `i >= 32` yields 0.
pub fn byte(i: U256, x: U256) -> U256 {
    if i >= U256::from(32) {
        return U256::zero();
    }
    U256::from(x.byte(31 - i.low_u64() as usize))
}

/// Logical left shift; `shift >= 256` yields 0.
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value << shift.low_u64() as usize
    }
}

/// Logical right shift; `shift >= 256` yields 0.
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value >> shift.low_u64() as usize
    }
}

/// Arithmetic right shift over the signed view of `value`.
/// `shift >= 256` saturates to all-zeros or all-ones by sign.
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let s = shift.low_u64() as usize;
    if s == 0 {
        return value;
    }
    let shifted = value >> s;
    if negative {
        shifted | (U256::MAX << (256 - s))
    } else {
        shifted
    }
}

/// Signed less-than on the two's-complement view.
pub fn slt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Signed greater-than on the two's-complement view.
pub fn sgt(a: U256, b: U256) -> bool {
    slt(b, a)
}
