//! Fixed point helpers.
//!
//! Suffix is the bit size of the integer part: Q8.24 values are `i32`
//! with 24 fractional bits, Q16.16 values have 16. Integer-part
//! extraction uses division, which truncates toward zero for negative
//! values (shifts would floor instead, changing envelope arithmetic).

/// Number to Q8.24.
#[inline]
pub fn fx8(x: i32) -> i32 {
    x * (1 << 24)
}

/// Q8.24 integer part, truncated toward zero.
#[inline]
pub fn ix8(x: i32) -> i32 {
    x / (1 << 24)
}

/// Q8.24 integer part of an unsigned phase accumulator.
#[inline]
pub fn ix8u(x: u32) -> u32 {
    x / (1 << 24)
}

/// Number to Q16.16.
#[inline]
pub fn fx16(x: i32) -> i32 {
    x * (1 << 16)
}

/// Q16.16 integer part, truncated toward zero.
#[inline]
pub fn ix16(x: i32) -> i32 {
    x / (1 << 16)
}

/// Q16.16 integer part of a 64-bit intermediate.
#[inline]
pub fn lix16(x: i64) -> i64 {
    x / (1 << 16)
}

#[inline]
pub fn clamp_i32(x: i32, min: i32, max: i32) -> i32 {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_part_truncates_toward_zero() {
        assert_eq!(ix8(fx8(3) + 1), 3);
        assert_eq!(ix8(fx8(-3) - 1), -3);
        assert_eq!(ix8(-1), 0);
        assert_eq!(ix16(fx16(-2) - 1), -2);
    }

    #[test]
    fn clamp_limits() {
        assert_eq!(clamp_i32(200, 0, 127), 127);
        assert_eq!(clamp_i32(-5, 0, 127), 0);
        assert_eq!(clamp_i32(64, 0, 127), 64);
    }
}
