// SPDX-License-Identifier: Apache-2.0

//! Conversion between engine numerals and host integers.
//!
//! Engines hand back bit-vector literals as unsigned numerals; signedness is a
//! property of how the bits are read. The decoders here reinterpret the
//! numeral as two's complement where asked, and narrow it into 64-bit host
//! integers with a fast path that avoids arbitrary-precision arithmetic for
//! the common small widths.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};

use crate::backend::Backend;
use crate::expr::BV;

/// Result of decoding a literal into a fixed-width host integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Narrowed<T> {
    /// The expression is symbolic; there is no value to decode.
    NotLiteral,
    Value(T),
    /// The expression is a literal whose value does not fit in `T`.
    OutOfRange,
}

impl<T> Narrowed<T> {
    pub fn is_literal(&self) -> bool {
        !matches!(self, Narrowed::NotLiteral)
    }

    pub fn fits(&self) -> bool {
        matches!(self, Narrowed::Value(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Narrowed::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Narrowed<U> {
        match self {
            Narrowed::NotLiteral => Narrowed::NotLiteral,
            Narrowed::Value(v) => Narrowed::Value(f(v)),
            Narrowed::OutOfRange => Narrowed::OutOfRange,
        }
    }

    /// Flattens into `(value, is_literal, fits)`, with `T::default()` standing
    /// in for the value when there is none.
    pub fn into_parts(self) -> (T, bool, bool)
    where
        T: Default,
    {
        match self {
            Narrowed::NotLiteral => (T::default(), false, false),
            Narrowed::Value(v) => (v, true, true),
            Narrowed::OutOfRange => (T::default(), true, false),
        }
    }
}

/// Reads the `width`-bit unsigned `value` as a two's complement number.
///
/// `value` must be below `2^width`.
pub fn signed_from_unsigned(width: u32, value: &BigUint) -> BigInt {
    debug_assert!(width > 0);
    debug_assert!(value.bits() <= u64::from(width));
    let unsigned = BigInt::from(value.clone());
    if value.bit(u64::from(width - 1)) {
        unsigned - (BigInt::one() << width as usize)
    } else {
        unsigned
    }
}

/// Sign-extends the low `width` bits of `pattern` to a full `i64`.
///
/// Exact only when `pattern` has no bits set at or above `width`, which holds
/// for any numeral of a `width`-bit sort.
pub fn sign_extend_u64(width: u32, pattern: u64) -> i64 {
    debug_assert!((1..64).contains(&width));
    let shift = 64 - width;
    ((pattern << shift) as i64) >> shift
}

/// Narrows a `width`-bit literal to an `i64`.
///
/// `pattern` is the engine's unsigned 64-bit reading of the literal, `None`
/// when the numeral does not fit in 64 bits. `slow` produces the exact
/// unsigned numeral and is only consulted when the 64-bit pattern cannot
/// settle the sign: the pattern overflowed, or it has bit 63 set on a sort at
/// least 64 bits wide.
pub fn narrow_signed64<F>(width: u32, pattern: Option<u64>, slow: F) -> Narrowed<i64>
where
    F: FnOnce() -> Option<BigUint>,
{
    if let Some(uval) = pattern {
        if width < 64 {
            return Narrowed::Value(sign_extend_u64(width, uval));
        }
        if uval < 1 << 63 {
            return Narrowed::Value(uval as i64);
        }
    }
    log::trace!(
        "falling back to arbitrary-precision decode of a {}-bit literal",
        width
    );
    let unsigned = match slow() {
        Some(v) => v,
        None => return Narrowed::NotLiteral,
    };
    match signed_from_unsigned(width, &unsigned).to_i64() {
        Some(v) => Narrowed::Value(v),
        None => Narrowed::OutOfRange,
    }
}

/// All ones in the low `width` bits.
pub(crate) fn mask(width: u32) -> BigUint {
    (BigUint::one() << width as usize) - 1u32
}

/// Reduces `value` modulo `2^width`.
pub(crate) fn truncate_unsigned(value: &BigUint, width: u32) -> BigUint {
    value & &mask(width)
}

/// Two's complement encoding of `value` in `width` bits, i.e. `value` reduced
/// modulo `2^width` into `[0, 2^width)`.
pub(crate) fn encode_signed(value: &BigInt, width: u32) -> BigUint {
    let modulus = BigInt::one() << width as usize;
    let reduced = ((value % &modulus) + &modulus) % &modulus;
    reduced.into_parts().1
}

impl<'ctx, B: Backend> BV<'ctx, B> {
    /// Whether the expression is a numeral rather than a variable or a
    /// compound formula.
    pub fn is_literal(&self) -> bool {
        self.ctx.backend().is_numeral_literal(&self.term)
    }

    /// The literal's value read as unsigned, in `[0, 2^width)`, or `None` if
    /// the expression is not a literal.
    pub fn as_big_unsigned(&self) -> Option<BigUint> {
        let backend = self.ctx.backend();
        if !backend.is_numeral_literal(&self.term) {
            return None;
        }
        let value = backend.numeral_big(&self.term)?;
        debug_assert!(value.bits() <= u64::from(self.width()));
        Some(value)
    }

    /// The literal's value read as two's complement, or `None` if the
    /// expression is not a literal.
    pub fn as_big_signed(&self) -> Option<BigInt> {
        let unsigned = self.as_big_unsigned()?;
        Some(signed_from_unsigned(self.width(), &unsigned))
    }

    /// Like `as_big_unsigned`, narrowed to a `u64`.
    pub fn as_u64(&self) -> Narrowed<u64> {
        let backend = self.ctx.backend();
        if !backend.is_numeral_literal(&self.term) {
            return Narrowed::NotLiteral;
        }
        match backend.numeral_u64(&self.term) {
            Some(v) => Narrowed::Value(v),
            None => Narrowed::OutOfRange,
        }
    }

    /// Like `as_big_signed`, narrowed to an `i64`.
    pub fn as_i64(&self) -> Narrowed<i64> {
        let pattern = match self.as_u64() {
            Narrowed::NotLiteral => return Narrowed::NotLiteral,
            Narrowed::Value(v) => Some(v),
            Narrowed::OutOfRange => None,
        };
        narrow_signed64(self.width(), pattern, || self.as_big_unsigned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn big(v: u128) -> BigUint {
        BigUint::from(v)
    }

    #[test_case(8, 200, -56; "byte with msb set")]
    #[test_case(8, 127, 127; "byte max positive")]
    #[test_case(8, 128, -128; "byte min negative")]
    #[test_case(1, 1, -1; "single bit set")]
    #[test_case(1, 0, 0; "single bit clear")]
    #[test_case(64, u64::MAX as u128, -1; "u64 all ones")]
    #[test_case(65, 1 << 64, -(1i128 << 64); "65 bit min")]
    #[test_case(128, 1 << 127, i128::MIN; "128 bit min")]
    #[test_case(128, u128::MAX, -1; "128 bit all ones")]
    fn test_signed_from_unsigned(width: u32, value: u128, want: i128) {
        assert_eq!(signed_from_unsigned(width, &big(value)), BigInt::from(want));
    }

    #[test]
    fn test_signed_from_unsigned_beyond_machine_words() {
        let width = 300;
        let all_ones = mask(width);
        assert_eq!(signed_from_unsigned(width, &all_ones), BigInt::from(-1));
        let min = BigUint::one() << 299usize;
        let want = -(BigInt::one() << 299usize);
        assert_eq!(signed_from_unsigned(width, &min), want);
    }

    #[test_case(32, 0xFFFF_FFFF, -1; "32 bit all ones")]
    #[test_case(32, 0x7FFF_FFFF, i32::MAX as i64; "32 bit max")]
    #[test_case(1, 1, -1; "1 bit set")]
    #[test_case(4, 0b1000, -8; "nibble min")]
    #[test_case(63, 1 << 62, -(1 << 62); "63 bit min")]
    fn test_sign_extend_u64(width: u32, pattern: u64, want: i64) {
        assert_eq!(sign_extend_u64(width, pattern), want);
    }

    fn no_slow_path() -> Option<BigUint> {
        panic!("slow path must not be taken");
    }

    #[test]
    fn test_narrow_signed64_fast_paths() {
        assert_eq!(
            narrow_signed64(32, Some(0xFFFF_FFFF), no_slow_path),
            Narrowed::Value(-1)
        );
        assert_eq!(
            narrow_signed64(64, Some(0x7FFF_FFFF_FFFF_FFFF), no_slow_path),
            Narrowed::Value(i64::MAX)
        );
        assert_eq!(narrow_signed64(128, Some(5), no_slow_path), Narrowed::Value(5));
    }

    #[test]
    fn test_narrow_signed64_minimum_is_inclusive() {
        let pattern = 0x8000_0000_0000_0000u64;
        let got = narrow_signed64(64, Some(pattern), || Some(BigUint::from(pattern)));
        assert_eq!(got, Narrowed::Value(i64::MIN));
        assert_eq!(got.into_parts(), (i64::MIN, true, true));
    }

    #[test]
    fn test_narrow_signed64_sign_bits_overflow_u64() {
        // All ones at 65 bits does not fit a u64 but is -1.
        let got = narrow_signed64(65, None, || Some(mask(65)));
        assert_eq!(got, Narrowed::Value(-1));

        // -2^63 at 128 bits: the raw pattern is far beyond u64.
        let pattern = mask(128) ^ mask(63);
        let got = narrow_signed64(128, None, || Some(pattern.clone()));
        assert_eq!(got, Narrowed::Value(i64::MIN));
    }

    #[test]
    fn test_narrow_signed64_out_of_range() {
        // 2^64 - 1 at 65 bits is positive and too large.
        let got = narrow_signed64(65, Some(u64::MAX), || Some(big(u64::MAX as u128)));
        assert_eq!(got, Narrowed::OutOfRange);
        assert_eq!(got.into_parts(), (0, true, false));

        // -2^63 - 1 at 128 bits.
        let pattern = encode_signed(&(BigInt::from(i64::MIN) - 1), 128);
        let got = narrow_signed64(128, None, || Some(pattern.clone()));
        assert_eq!(got, Narrowed::OutOfRange);

        // 2^63 at 128 bits.
        let got = narrow_signed64(128, Some(1 << 63), || Some(big(1 << 63)));
        assert_eq!(got, Narrowed::OutOfRange);
    }

    #[test]
    fn test_narrowed_helpers() {
        let not_literal: Narrowed<u64> = Narrowed::NotLiteral;
        assert!(!not_literal.is_literal());
        assert!(!not_literal.fits());
        assert_eq!(not_literal.into_parts(), (0, false, false));
        assert_eq!(Narrowed::Value(3u64).map(|v| v * 2), Narrowed::Value(6));
        assert_eq!(Narrowed::Value(3u64).value(), Some(3));
        assert_eq!(Narrowed::<u64>::OutOfRange.value(), None);
    }

    #[test]
    fn test_encode_signed() {
        assert_eq!(encode_signed(&BigInt::from(-1), 8), big(0xFF));
        assert_eq!(encode_signed(&BigInt::from(-56), 8), big(200));
        assert_eq!(encode_signed(&BigInt::from(300), 8), big(44));
        assert_eq!(encode_signed(&BigInt::from(-1), 1), big(1));
        assert_eq!(truncate_unsigned(&big(0x1FF), 8), big(0xFF));
        assert_eq!(mask(4), big(0xF));
    }
}
