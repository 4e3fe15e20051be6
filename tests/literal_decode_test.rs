// SPDX-License-Identifier: Apache-2.0

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smt_bv::{Context, Narrowed};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn expected_signed(width: u32, value: &BigUint) -> BigInt {
    if value.bit(u64::from(width - 1)) {
        BigInt::from(value.clone()) - (BigInt::one() << width as usize)
    } else {
        BigInt::from(value.clone())
    }
}

/// Boundary values of a `width`-bit sort plus a seeded random sample.
fn sample_values(width: u32, rng: &mut StdRng) -> Vec<BigUint> {
    let modulus = BigUint::one() << width as usize;
    let max = &modulus - 1u32;
    let half = BigUint::one() << (width - 1) as usize;
    let mut values = vec![BigUint::zero(), BigUint::one() & &max, max.clone(), half.clone()];
    if width > 1 {
        values.push(&half - 1u32);
        values.push(&half + 1u32);
    }
    for _ in 0..16 {
        let mut v = BigUint::zero();
        for _ in 0..(width as usize + 63) / 64 {
            v = (v << 64usize) | BigUint::from(rng.gen::<u64>());
        }
        values.push(v % &modulus);
    }
    values
}

#[test]
fn test_width_sweep_unsigned_and_signed() {
    init_logger();
    let ctx = Context::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for width in 1..=128u32 {
        for value in sample_values(width, &mut rng) {
            let bv = ctx.bv_from_big_uint(&value, width).unwrap();
            assert!(bv.is_literal());
            assert_eq!(bv.as_big_unsigned().as_ref(), Some(&value), "width {}", width);

            let want_signed = expected_signed(width, &value);
            assert_eq!(bv.as_big_signed().as_ref(), Some(&want_signed), "width {}", width);

            let want_u64 = match value.to_u64() {
                Some(v) => Narrowed::Value(v),
                None => Narrowed::OutOfRange,
            };
            assert_eq!(bv.as_u64(), want_u64, "width {} value {}", width, value);

            let want_i64 = match want_signed.to_i64() {
                Some(v) => Narrowed::Value(v),
                None => Narrowed::OutOfRange,
            };
            assert_eq!(bv.as_i64(), want_i64, "width {} value {}", width, value);
        }
    }
}

#[test]
fn test_small_widths_every_value() {
    init_logger();
    let ctx = Context::new();
    for width in 1..=10u32 {
        let modulus = 1u64 << width;
        for value in 0..modulus {
            let bv = ctx.bv_from_u64(value, width).unwrap();
            let signed = if value >= modulus / 2 {
                value as i64 - modulus as i64
            } else {
                value as i64
            };
            assert_eq!(bv.as_big_unsigned(), Some(BigUint::from(value)), "width {}", width);
            assert_eq!(bv.as_big_signed(), Some(BigInt::from(signed)), "width {}", width);
            assert_eq!(bv.as_u64(), Narrowed::Value(value), "width {}", width);
            assert_eq!(bv.as_i64(), Narrowed::Value(signed), "width {} value {}", width, value);
        }
    }
}

#[test]
fn test_decode_is_idempotent() {
    let ctx = Context::new();
    let bv = ctx.bv_from_u64(0xDEAD_BEEF, 32).unwrap();
    let first = (bv.as_big_unsigned(), bv.as_big_signed(), bv.as_u64(), bv.as_i64());
    for _ in 0..3 {
        assert_eq!(
            (bv.as_big_unsigned(), bv.as_big_signed(), bv.as_u64(), bv.as_i64()),
            first
        );
    }
}

#[test]
fn test_byte_with_msb_set() {
    let ctx = Context::new();
    let bv = ctx.bv_from_u64(200, 8).unwrap();
    assert_eq!(bv.as_big_signed(), Some(BigInt::from(-56)));
    assert_eq!(bv.as_i64(), Narrowed::Value(-56));
}

#[test]
fn test_32_bit_all_ones_is_minus_one() {
    let ctx = Context::new();
    let bv = ctx.bv_from_u64(0xFFFF_FFFF, 32).unwrap();
    assert_eq!(bv.as_i64().into_parts(), (-1, true, true));
}

#[test]
fn test_64_bit_signed_minimum_fits() {
    let ctx = Context::new();
    let bv = ctx.bv_from_u64(0x8000_0000_0000_0000, 64).unwrap();
    assert_eq!(bv.as_u64(), Narrowed::Value(0x8000_0000_0000_0000));
    assert_eq!(bv.as_i64().into_parts(), (i64::MIN, true, true));
    assert_eq!(bv.as_big_signed(), Some(BigInt::from(i64::MIN)));
}

#[test]
fn test_one_bit() {
    let ctx = Context::new();
    let set = ctx.bv_from_u64(1, 1).unwrap();
    let clear = ctx.bv_from_u64(0, 1).unwrap();
    assert_eq!(set.as_big_signed(), Some(BigInt::from(-1)));
    assert_eq!(set.as_i64(), Narrowed::Value(-1));
    assert_eq!(clear.as_i64(), Narrowed::Value(0));
}

#[test]
fn test_wide_values_beyond_i64() {
    let ctx = Context::new();
    // 2^63 in 65 bits is positive and too large for an i64.
    let bv = ctx
        .bv_from_big_uint(&(BigUint::one() << 63usize), 65)
        .unwrap();
    assert_eq!(bv.as_u64(), Narrowed::Value(1 << 63));
    assert_eq!(bv.as_i64(), Narrowed::OutOfRange);
    assert_eq!(bv.as_i64().into_parts(), (0, true, false));

    // -1 in 200 bits: neither the pattern nor the u64 path fits, the signed
    // value does.
    let minus_one = ctx.bv_from_i64(-1, 200).unwrap();
    assert_eq!(minus_one.as_u64(), Narrowed::OutOfRange);
    assert_eq!(minus_one.as_i64(), Narrowed::Value(-1));
    assert_eq!(minus_one.as_big_signed(), Some(BigInt::from(-1)));
}

#[test]
fn test_free_variable_is_not_a_literal() {
    let ctx = Context::new();
    let x = ctx.bv_const("x", 32).unwrap();
    assert!(!x.is_literal());
    assert_eq!(x.as_big_unsigned(), None);
    assert_eq!(x.as_big_signed(), None);
    assert_eq!(x.as_u64().into_parts(), (0, false, false));
    assert_eq!(x.as_i64().into_parts(), (0, false, false));
}
