// SPDX-License-Identifier: Apache-2.0

//! Ground evaluation of operators over exact numerals, following the QF_BV
//! definitions (division by zero, sign conventions of the signed remainders,
//! saturating shifts).

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};

use crate::literal::{encode_signed, mask, signed_from_unsigned, truncate_unsigned};
use crate::op::Op;
use crate::smt_bv_error::SmtBvError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Bv { width: u32, value: BigUint },
    Bool(bool),
    Int(BigInt),
}

impl Value {
    fn bv(&self) -> Result<(u32, &BigUint), SmtBvError> {
        match self {
            Value::Bv { width, value } => Ok((*width, value)),
            other => Err(SmtBvError(format!(
                "expected a bit-vector value, got {:?}",
                other
            ))),
        }
    }

    fn boolean(&self) -> Result<bool, SmtBvError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(SmtBvError(format!("expected a Bool value, got {:?}", other))),
        }
    }
}

fn bv(width: u32, value: BigUint) -> Value {
    Value::Bv { width, value }
}

fn signed_in_range(width: u32, value: &BigInt) -> bool {
    let half = BigInt::one() << (width - 1) as usize;
    *value >= -half.clone() && *value < half
}

/// Two's complement magnitude; `2^(w-1)` for the minimum, which still fits
/// unsigned in `w` bits.
fn magnitude(width: u32, value: &BigUint) -> (bool, BigUint) {
    let negative = value.bit(u64::from(width - 1));
    if negative {
        (true, negate(width, value))
    } else {
        (false, value.clone())
    }
}

fn negate(width: u32, value: &BigUint) -> BigUint {
    truncate_unsigned(&((BigUint::one() << width as usize) - value), width)
}

fn udiv(width: u32, lhs: &BigUint, rhs: &BigUint) -> BigUint {
    if rhs.is_zero() {
        mask(width)
    } else {
        lhs / rhs
    }
}

fn urem(lhs: &BigUint, rhs: &BigUint) -> BigUint {
    if rhs.is_zero() {
        lhs.clone()
    } else {
        lhs % rhs
    }
}

/// Shift amount as a `usize` when it is below `width`.
fn shift_amount(width: u32, amount: &BigUint) -> Option<usize> {
    amount
        .to_u32()
        .filter(|a| *a < width)
        .map(|a| a as usize)
}

pub(crate) fn apply(op: Op, args: &[Value]) -> Result<Value, SmtBvError> {
    if args.len() != op.arity() {
        return Err(SmtBvError(format!(
            "{} expects {} operand(s), got {}",
            op.name(),
            op.arity(),
            args.len()
        )));
    }
    let value = match op {
        Op::Not => {
            let (w, a) = args[0].bv()?;
            bv(w, a ^ &mask(w))
        }
        Op::Neg => {
            let (w, a) = args[0].bv()?;
            bv(w, negate(w, a))
        }
        Op::And | Op::Or | Op::Xor | Op::Nand | Op::Nor | Op::Xnor => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let r = match op {
                Op::And => a & b,
                Op::Or => a | b,
                Op::Xor => a ^ b,
                Op::Nand => (a & b) ^ mask(w),
                Op::Nor => (a | b) ^ mask(w),
                _ => (a ^ b) ^ mask(w),
            };
            bv(w, r)
        }
        Op::Add => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            bv(w, truncate_unsigned(&(a + b), w))
        }
        Op::Sub => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            bv(w, truncate_unsigned(&(a + negate(w, b)), w))
        }
        Op::Mul => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            bv(w, truncate_unsigned(&(a * b), w))
        }
        Op::UDiv => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            bv(w, udiv(w, a, b))
        }
        Op::URem => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            bv(w, urem(a, b))
        }
        Op::SDiv => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let (neg_a, abs_a) = magnitude(w, a);
            let (neg_b, abs_b) = magnitude(w, b);
            let q = udiv(w, &abs_a, &abs_b);
            bv(w, if neg_a != neg_b { negate(w, &q) } else { q })
        }
        Op::SRem => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let (neg_a, abs_a) = magnitude(w, a);
            let (_, abs_b) = magnitude(w, b);
            let r = urem(&abs_a, &abs_b);
            bv(w, if neg_a { negate(w, &r) } else { r })
        }
        Op::SMod => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let (neg_a, abs_a) = magnitude(w, a);
            let (neg_b, abs_b) = magnitude(w, b);
            let u = urem(&abs_a, &abs_b);
            let r = if u.is_zero() {
                u
            } else {
                match (neg_a, neg_b) {
                    (false, false) => u,
                    (true, false) => truncate_unsigned(&(negate(w, &u) + b), w),
                    (false, true) => truncate_unsigned(&(u + b), w),
                    (true, true) => negate(w, &u),
                }
            };
            bv(w, r)
        }
        Op::Shl => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let r = match shift_amount(w, b) {
                Some(s) => truncate_unsigned(&(a << s), w),
                None => BigUint::zero(),
            };
            bv(w, r)
        }
        Op::LShr => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let r = match shift_amount(w, b) {
                Some(s) => a >> s,
                None => BigUint::zero(),
            };
            bv(w, r)
        }
        Op::AShr => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let negative = a.bit(u64::from(w - 1));
            let r = match shift_amount(w, b) {
                Some(s) if negative => (a >> s) | (mask(w) ^ (mask(w) >> s)),
                Some(s) => a >> s,
                None if negative => mask(w),
                None => BigUint::zero(),
            };
            bv(w, r)
        }
        Op::RotateLeft | Op::RotateRight => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let by = (b % BigUint::from(w)).to_usize().unwrap_or(0);
            let left = if op == Op::RotateLeft { by } else { (w as usize - by) % w as usize };
            let r = truncate_unsigned(&(a << left), w) | (a >> (w as usize - left));
            bv(w, r)
        }
        Op::Ult | Op::Ule | Op::Ugt | Op::Uge => {
            let (_, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            Value::Bool(match op {
                Op::Ult => a < b,
                Op::Ule => a <= b,
                Op::Ugt => a > b,
                _ => a >= b,
            })
        }
        Op::Slt | Op::Sle | Op::Sgt | Op::Sge => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let a = signed_from_unsigned(w, a);
            let b = signed_from_unsigned(w, b);
            Value::Bool(match op {
                Op::Slt => a < b,
                Op::Sle => a <= b,
                Op::Sgt => a > b,
                _ => a >= b,
            })
        }
        Op::AddOverflow { signed } | Op::SubOverflow { signed } | Op::MulOverflow { signed } => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let overflows = if signed {
                let a = signed_from_unsigned(w, a);
                let b = signed_from_unsigned(w, b);
                let exact = match op {
                    Op::AddOverflow { .. } => a + b,
                    Op::SubOverflow { .. } => a - b,
                    _ => a * b,
                };
                !signed_in_range(w, &exact)
            } else {
                match op {
                    Op::AddOverflow { .. } => (a + b).bits() > u64::from(w),
                    Op::SubOverflow { .. } => a < b,
                    _ => (a * b).bits() > u64::from(w),
                }
            };
            Value::Bool(overflows)
        }
        Op::SDivOverflow => {
            let (w, a) = args[0].bv()?;
            let (_, b) = args[1].bv()?;
            let min = BigUint::one() << (w - 1) as usize;
            Value::Bool(*a == min && *b == mask(w))
        }
        Op::NegOverflow => {
            let (w, a) = args[0].bv()?;
            Value::Bool(*a == BigUint::one() << (w - 1) as usize)
        }
        Op::Concat => {
            let (wa, a) = args[0].bv()?;
            let (wb, b) = args[1].bv()?;
            bv(wa + wb, (a << wb as usize) | b)
        }
        Op::Extract { high, low } => {
            let (_, a) = args[0].bv()?;
            let width = high - low + 1;
            bv(width, truncate_unsigned(&(a >> low as usize), width))
        }
        Op::SignExtend(extra) => {
            let (w, a) = args[0].bv()?;
            let width = w + extra;
            bv(width, encode_signed(&signed_from_unsigned(w, a), width))
        }
        Op::ZeroExtend(extra) => {
            let (w, a) = args[0].bv()?;
            bv(w + extra, a.clone())
        }
        Op::Repeat(count) => {
            let (w, a) = args[0].bv()?;
            let mut r = BigUint::zero();
            for _ in 0..count {
                r = (r << w as usize) | a;
            }
            bv(w * count, r)
        }
        Op::ToInt { signed } => {
            let (w, a) = args[0].bv()?;
            Value::Int(if signed {
                signed_from_unsigned(w, a)
            } else {
                BigInt::from(a.clone())
            })
        }
        Op::Eq => Value::Bool(args[0] == args[1]),
        Op::Ite => {
            if args[0].boolean()? {
                args[1].clone()
            } else {
                args[2].clone()
            }
        }
        Op::BoolNot => Value::Bool(!args[0].boolean()?),
        Op::BoolAnd => Value::Bool(args[0].boolean()? && args[1].boolean()?),
        Op::BoolOr => Value::Bool(args[0].boolean()? || args[1].boolean()?),
        Op::BoolXor => Value::Bool(args[0].boolean()? != args[1].boolean()?),
        Op::Implies => Value::Bool(!args[0].boolean()? || args[1].boolean()?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn v(width: u32, value: u64) -> Value {
        bv(width, BigUint::from(value))
    }

    fn run(op: Op, args: &[Value]) -> Value {
        apply(op, args).unwrap()
    }

    #[test_case(Op::UDiv, 8, 7, 0, 0xFF; "udiv by zero is all ones")]
    #[test_case(Op::URem, 8, 7, 0, 7; "urem by zero is dividend")]
    #[test_case(Op::SDiv, 8, 0xF9, 2, 0xFD; "sdiv truncates toward zero")]
    #[test_case(Op::SDiv, 8, 0x80, 0xFF, 0x80; "sdiv min by minus one wraps")]
    #[test_case(Op::SDiv, 8, 0xF9, 0, 1; "sdiv negative by zero is one")]
    #[test_case(Op::SDiv, 8, 7, 0, 0xFF; "sdiv positive by zero is minus one")]
    #[test_case(Op::SRem, 8, 0xF9, 2, 0xFF; "srem takes dividend sign")]
    #[test_case(Op::SRem, 8, 7, 0xFE, 1; "srem positive dividend")]
    #[test_case(Op::SMod, 8, 0xF9, 2, 1; "smod takes divisor sign")]
    #[test_case(Op::SMod, 8, 7, 0xFE, 0xFF; "smod negative divisor")]
    #[test_case(Op::SMod, 8, 0xF9, 0xFE, 0xFF; "smod both negative")]
    #[test_case(Op::SMod, 8, 0xF8, 2, 0; "smod exact")]
    #[test_case(Op::SMod, 8, 0xF9, 0, 0xF9; "smod by zero is dividend")]
    #[test_case(Op::Shl, 8, 0x81, 1, 0x02; "shl drops msb")]
    #[test_case(Op::Shl, 8, 1, 8, 0; "shl by width")]
    #[test_case(Op::LShr, 8, 0x80, 200, 0; "lshr saturates")]
    #[test_case(Op::AShr, 8, 0x80, 3, 0xF0; "ashr copies sign")]
    #[test_case(Op::AShr, 8, 0x80, 9, 0xFF; "ashr saturates to sign")]
    #[test_case(Op::AShr, 8, 0x40, 9, 0; "ashr positive saturates to zero")]
    #[test_case(Op::RotateLeft, 8, 0x81, 1, 0x03; "rotate left")]
    #[test_case(Op::RotateRight, 8, 0x81, 1, 0xC0; "rotate right")]
    #[test_case(Op::RotateLeft, 8, 0x81, 9, 0x03; "rotate amount mod width")]
    #[test_case(Op::RotateRight, 8, 0x81, 0, 0x81; "rotate by zero")]
    #[test_case(Op::Sub, 8, 1, 2, 0xFF; "sub wraps")]
    #[test_case(Op::Mul, 8, 16, 17, 0x10; "mul truncates")]
    #[test_case(Op::Xnor, 4, 0b1010, 0b0110, 0b0011; "xnor")]
    fn test_binary(op: Op, width: u32, a: u64, b: u64, want: u64) {
        assert_eq!(run(op, &[v(width, a), v(width, b)]), v(width, want));
    }

    #[test_case(Op::AddOverflow { signed: false }, 0xFF, 1, true; "uadd overflows")]
    #[test_case(Op::AddOverflow { signed: false }, 0xFE, 1, false; "uadd fits")]
    #[test_case(Op::AddOverflow { signed: true }, 0x7F, 1, true; "sadd overflows")]
    #[test_case(Op::AddOverflow { signed: true }, 0xFF, 1, false; "sadd minus one plus one")]
    #[test_case(Op::SubOverflow { signed: false }, 0, 1, true; "usub underflows")]
    #[test_case(Op::SubOverflow { signed: true }, 0x80, 1, true; "ssub underflows")]
    #[test_case(Op::MulOverflow { signed: false }, 16, 16, true; "umul overflows")]
    #[test_case(Op::MulOverflow { signed: true }, 0xF0, 8, false; "smul minus sixteen by eight")]
    #[test_case(Op::MulOverflow { signed: true }, 0xF0, 9, true; "smul too negative")]
    #[test_case(Op::SDivOverflow, 0x80, 0xFF, true; "sdiv min by minus one")]
    #[test_case(Op::SDivOverflow, 0x80, 0xFE, false; "sdiv min by minus two")]
    fn test_overflow(op: Op, a: u64, b: u64, want: bool) {
        assert_eq!(run(op, &[v(8, a), v(8, b)]), Value::Bool(want));
    }

    #[test]
    fn test_unary() {
        assert_eq!(run(Op::Neg, &[v(8, 1)]), v(8, 0xFF));
        assert_eq!(run(Op::Neg, &[v(8, 0)]), v(8, 0));
        assert_eq!(run(Op::Not, &[v(4, 0b1010)]), v(4, 0b0101));
        assert_eq!(run(Op::NegOverflow, &[v(8, 0x80)]), Value::Bool(true));
        assert_eq!(run(Op::NegOverflow, &[v(8, 0x81)]), Value::Bool(false));
    }

    #[test]
    fn test_structural() {
        assert_eq!(run(Op::Concat, &[v(4, 0xA), v(8, 0x5B)]), v(12, 0xA5B));
        assert_eq!(run(Op::Extract { high: 11, low: 4 }, &[v(16, 0xABCD)]), v(8, 0xBC));
        assert_eq!(run(Op::SignExtend(4), &[v(4, 0b1001)]), v(8, 0xF9));
        assert_eq!(run(Op::ZeroExtend(4), &[v(4, 0b1001)]), v(8, 0x09));
        assert_eq!(run(Op::Repeat(3), &[v(2, 0b10)]), v(6, 0b101010));
        assert_eq!(
            run(Op::ToInt { signed: true }, &[v(8, 0xFF)]),
            Value::Int(BigInt::from(-1))
        );
        assert_eq!(
            run(Op::ToInt { signed: false }, &[v(8, 0xFF)]),
            Value::Int(BigInt::from(255))
        );
    }

    #[test]
    fn test_core() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        assert_eq!(run(Op::Eq, &[v(8, 3), v(8, 3)]), t);
        assert_eq!(run(Op::Ite, &[f.clone(), v(8, 1), v(8, 2)]), v(8, 2));
        assert_eq!(run(Op::Implies, &[f.clone(), f.clone()]), t);
        assert_eq!(run(Op::BoolXor, &[t.clone(), t.clone()]), f);
        assert_eq!(run(Op::Slt, &[v(8, 0xFF), v(8, 0)]), t);
        assert_eq!(run(Op::Ult, &[v(8, 0xFF), v(8, 0)]), f);
    }

    #[test]
    fn test_sort_confusion_is_an_error() {
        assert!(apply(Op::Add, &[Value::Bool(true), v(8, 1)]).is_err());
        assert!(apply(Op::Add, &[v(8, 1)]).is_err());
    }
}
