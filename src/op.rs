// SPDX-License-Identifier: Apache-2.0

//! The operator table: every operator the expression layer can build, its
//! SMT-LIB name, its arity and the rule computing its result sort.
//!
//! Result sorts are computed here rather than asked of the engine, so the same
//! rule doubles as operand validation: mismatched widths and out-of-range
//! extract bounds are reported before any engine call is made.

use std::fmt;

use crate::smt_bv_error::SmtBvError;
use crate::sort::{BvSort, Sort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // Bitwise and arithmetic, same width in and out.
    Not,
    Neg,
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    SMod,
    /// The shift and rotate amounts are bit-vectors of the shiftee's width,
    /// not plain integers.
    Shl,
    LShr,
    AShr,
    RotateLeft,
    RotateRight,

    // Comparisons.
    Ult,
    Slt,
    Ule,
    Sle,
    Uge,
    Sge,
    Ugt,
    Sgt,

    // Overflow predicates; true when the operation overflows.
    AddOverflow { signed: bool },
    SubOverflow { signed: bool },
    MulOverflow { signed: bool },
    SDivOverflow,
    NegOverflow,

    // Width-changing.
    Concat,
    Extract { high: u32, low: u32 },
    SignExtend(u32),
    ZeroExtend(u32),
    Repeat(u32),
    ToInt { signed: bool },

    // Core theory.
    Eq,
    Ite,
    BoolNot,
    BoolAnd,
    BoolOr,
    BoolXor,
    Implies,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    BvUnary,
    BvBinary,
    BvPredicate,
    BvUnaryPredicate,
    Concat,
    Extract { high: u32, low: u32 },
    Extend(u32),
    Repeat(u32),
    ToInt,
    Eq,
    Ite,
    BoolUnary,
    BoolBinary,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Not => "bvnot",
            Op::Neg => "bvneg",
            Op::And => "bvand",
            Op::Or => "bvor",
            Op::Xor => "bvxor",
            Op::Nand => "bvnand",
            Op::Nor => "bvnor",
            Op::Xnor => "bvxnor",
            Op::Add => "bvadd",
            Op::Sub => "bvsub",
            Op::Mul => "bvmul",
            Op::UDiv => "bvudiv",
            Op::SDiv => "bvsdiv",
            Op::URem => "bvurem",
            Op::SRem => "bvsrem",
            Op::SMod => "bvsmod",
            Op::Shl => "bvshl",
            Op::LShr => "bvlshr",
            Op::AShr => "bvashr",
            Op::RotateLeft => "ext_rotate_left",
            Op::RotateRight => "ext_rotate_right",
            Op::Ult => "bvult",
            Op::Slt => "bvslt",
            Op::Ule => "bvule",
            Op::Sle => "bvsle",
            Op::Uge => "bvuge",
            Op::Sge => "bvsge",
            Op::Ugt => "bvugt",
            Op::Sgt => "bvsgt",
            Op::AddOverflow { signed: false } => "bvuaddo",
            Op::AddOverflow { signed: true } => "bvsaddo",
            Op::SubOverflow { signed: false } => "bvusubo",
            Op::SubOverflow { signed: true } => "bvssubo",
            Op::MulOverflow { signed: false } => "bvumulo",
            Op::MulOverflow { signed: true } => "bvsmulo",
            Op::SDivOverflow => "bvsdivo",
            Op::NegOverflow => "bvnego",
            Op::Concat => "concat",
            Op::Extract { .. } => "extract",
            Op::SignExtend(_) => "sign_extend",
            Op::ZeroExtend(_) => "zero_extend",
            Op::Repeat(_) => "repeat",
            Op::ToInt { signed: false } => "ubv_to_int",
            Op::ToInt { signed: true } => "sbv_to_int",
            Op::Eq => "=",
            Op::Ite => "ite",
            Op::BoolNot => "not",
            Op::BoolAnd => "and",
            Op::BoolOr => "or",
            Op::BoolXor => "xor",
            Op::Implies => "=>",
        }
    }

    fn rule(&self) -> Rule {
        match *self {
            Op::Not | Op::Neg => Rule::BvUnary,
            Op::And
            | Op::Or
            | Op::Xor
            | Op::Nand
            | Op::Nor
            | Op::Xnor
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::UDiv
            | Op::SDiv
            | Op::URem
            | Op::SRem
            | Op::SMod
            | Op::Shl
            | Op::LShr
            | Op::AShr
            | Op::RotateLeft
            | Op::RotateRight => Rule::BvBinary,
            Op::Ult
            | Op::Slt
            | Op::Ule
            | Op::Sle
            | Op::Uge
            | Op::Sge
            | Op::Ugt
            | Op::Sgt
            | Op::AddOverflow { .. }
            | Op::SubOverflow { .. }
            | Op::MulOverflow { .. }
            | Op::SDivOverflow => Rule::BvPredicate,
            Op::NegOverflow => Rule::BvUnaryPredicate,
            Op::Concat => Rule::Concat,
            Op::Extract { high, low } => Rule::Extract { high, low },
            Op::SignExtend(i) | Op::ZeroExtend(i) => Rule::Extend(i),
            Op::Repeat(i) => Rule::Repeat(i),
            Op::ToInt { .. } => Rule::ToInt,
            Op::Eq => Rule::Eq,
            Op::Ite => Rule::Ite,
            Op::BoolNot => Rule::BoolUnary,
            Op::BoolAnd | Op::BoolOr | Op::BoolXor | Op::Implies => Rule::BoolBinary,
        }
    }

    pub fn arity(&self) -> usize {
        match self.rule() {
            Rule::BvUnary
            | Rule::BvUnaryPredicate
            | Rule::Extract { .. }
            | Rule::Extend(_)
            | Rule::Repeat(_)
            | Rule::ToInt
            | Rule::BoolUnary => 1,
            Rule::Ite => 3,
            Rule::BvBinary | Rule::BvPredicate | Rule::Concat | Rule::Eq | Rule::BoolBinary => 2,
        }
    }

    /// Integer indices of an indexed operator, e.g. `(_ extract 7 0)`.
    pub fn indices(&self) -> Vec<u32> {
        match *self {
            Op::Extract { high, low } => vec![high, low],
            Op::SignExtend(i) | Op::ZeroExtend(i) | Op::Repeat(i) => vec![i],
            _ => Vec::new(),
        }
    }

    /// Computes the sort of `self` applied to operands of the given sorts,
    /// rejecting operand combinations the theory does not define.
    pub fn result_sort(&self, operands: &[Sort]) -> Result<Sort, SmtBvError> {
        if operands.len() != self.arity() {
            return Err(SmtBvError(format!(
                "{} expects {} operand(s), got {}",
                self.name(),
                self.arity(),
                operands.len()
            )));
        }
        match self.rule() {
            Rule::BvUnary => Ok(Sort::BitVec(self.bv_operand(operands, 0)?)),
            Rule::BvBinary => Ok(Sort::BitVec(self.same_width(operands)?)),
            Rule::BvPredicate => {
                self.same_width(operands)?;
                Ok(Sort::Bool)
            }
            Rule::BvUnaryPredicate => {
                self.bv_operand(operands, 0)?;
                Ok(Sort::Bool)
            }
            Rule::Concat => {
                let lhs = self.bv_operand(operands, 0)?;
                let rhs = self.bv_operand(operands, 1)?;
                let width = lhs
                    .width()
                    .checked_add(rhs.width())
                    .ok_or_else(|| self.too_wide())?;
                BvSort::new(width).map(Sort::BitVec)
            }
            Rule::Extract { high, low } => {
                let operand = self.bv_operand(operands, 0)?;
                if high < low {
                    return Err(SmtBvError(format!(
                        "extract: high bit {} is below low bit {}",
                        high, low
                    )));
                }
                if high >= operand.width() {
                    return Err(SmtBvError(format!(
                        "extract: high bit {} out of range for a {}-bit operand",
                        high,
                        operand.width()
                    )));
                }
                BvSort::new(high - low + 1).map(Sort::BitVec)
            }
            Rule::Extend(extra) => {
                let operand = self.bv_operand(operands, 0)?;
                let width = operand
                    .width()
                    .checked_add(extra)
                    .ok_or_else(|| self.too_wide())?;
                BvSort::new(width).map(Sort::BitVec)
            }
            Rule::Repeat(count) => {
                let operand = self.bv_operand(operands, 0)?;
                if count == 0 {
                    return Err(SmtBvError(
                        "repeat: count must be at least 1".to_string(),
                    ));
                }
                let width = operand
                    .width()
                    .checked_mul(count)
                    .ok_or_else(|| self.too_wide())?;
                BvSort::new(width).map(Sort::BitVec)
            }
            Rule::ToInt => {
                self.bv_operand(operands, 0)?;
                Ok(Sort::Int)
            }
            Rule::Eq => {
                if operands[0] != operands[1] {
                    return Err(SmtBvError(format!(
                        "= operands must have the same sort, got {} and {}",
                        operands[0], operands[1]
                    )));
                }
                Ok(Sort::Bool)
            }
            Rule::Ite => {
                if operands[0] != Sort::Bool {
                    return Err(SmtBvError(format!(
                        "ite condition must be Bool, got {}",
                        operands[0]
                    )));
                }
                if operands[1] != operands[2] {
                    return Err(SmtBvError(format!(
                        "ite branches must have the same sort, got {} and {}",
                        operands[1], operands[2]
                    )));
                }
                Ok(operands[1])
            }
            Rule::BoolUnary | Rule::BoolBinary => {
                if let Some(bad) = operands.iter().find(|s| **s != Sort::Bool) {
                    return Err(SmtBvError(format!(
                        "{} expects Bool operands, got {}",
                        self.name(),
                        bad
                    )));
                }
                Ok(Sort::Bool)
            }
        }
    }

    fn bv_operand(&self, operands: &[Sort], index: usize) -> Result<BvSort, SmtBvError> {
        operands[index].as_bv().ok_or_else(|| {
            SmtBvError(format!(
                "{} expects bit-vector operands, got {}",
                self.name(),
                operands[index]
            ))
        })
    }

    fn same_width(&self, operands: &[Sort]) -> Result<BvSort, SmtBvError> {
        let lhs = self.bv_operand(operands, 0)?;
        let rhs = self.bv_operand(operands, 1)?;
        if lhs != rhs {
            return Err(SmtBvError(format!(
                "{} operands must have the same width, got {} and {} bits",
                self.name(),
                lhs.width(),
                rhs.width()
            )));
        }
        Ok(lhs)
    }

    fn too_wide(&self) -> SmtBvError {
        SmtBvError(format!("{}: result width overflows u32", self.name()))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices = self.indices();
        if indices.is_empty() {
            return write!(f, "{}", self.name());
        }
        write!(f, "(_ {}", self.name())?;
        for index in indices {
            write!(f, " {}", index)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn bv(width: u32) -> Sort {
        Sort::BitVec(BvSort::new(width).unwrap())
    }

    #[test_case(Op::Add, &[bv(8), bv(8)], bv(8); "add keeps width")]
    #[test_case(Op::RotateLeft, &[bv(5), bv(5)], bv(5); "rotate keeps width")]
    #[test_case(Op::Ult, &[bv(8), bv(8)], Sort::Bool; "comparison is bool")]
    #[test_case(Op::NegOverflow, &[bv(8)], Sort::Bool; "neg overflow is bool")]
    #[test_case(Op::Concat, &[bv(3), bv(5)], bv(8); "concat sums widths")]
    #[test_case(Op::Extract { high: 7, low: 0 }, &[bv(16)], bv(8); "extract low byte")]
    #[test_case(Op::Extract { high: 0, low: 0 }, &[bv(1)], bv(1); "extract single bit")]
    #[test_case(Op::SignExtend(8), &[bv(8)], bv(16); "sign extend")]
    #[test_case(Op::ZeroExtend(0), &[bv(8)], bv(8); "zero extend by nothing")]
    #[test_case(Op::Repeat(3), &[bv(4)], bv(12); "repeat multiplies")]
    #[test_case(Op::ToInt { signed: true }, &[bv(4)], Sort::Int; "to int")]
    #[test_case(Op::Ite, &[Sort::Bool, bv(4), bv(4)], bv(4); "ite takes branch sort")]
    #[test_case(Op::Eq, &[Sort::Int, Sort::Int], Sort::Bool; "eq on ints")]
    fn test_result_sort(op: Op, operands: &[Sort], want: Sort) {
        assert_eq!(op.result_sort(operands).unwrap(), want);
    }

    #[test_case(Op::Add, &[bv(8), bv(16)], "same width"; "mismatched add")]
    #[test_case(Op::Shl, &[bv(8), bv(3)], "same width"; "shift amount narrower than shiftee")]
    #[test_case(Op::Slt, &[bv(8), Sort::Bool], "bit-vector operands"; "bool into comparison")]
    #[test_case(Op::Extract { high: 3, low: 4 }, &[bv(8)], "below low bit"; "inverted extract")]
    #[test_case(Op::Extract { high: 8, low: 0 }, &[bv(8)], "out of range"; "extract past msb")]
    #[test_case(Op::Repeat(0), &[bv(8)], "at least 1"; "repeat zero")]
    #[test_case(Op::Concat, &[bv(u32::MAX), bv(1)], "overflows"; "concat too wide")]
    #[test_case(Op::Eq, &[bv(8), bv(9)], "same sort"; "eq across widths")]
    #[test_case(Op::Ite, &[bv(1), bv(4), bv(4)], "must be Bool"; "bit-vector condition")]
    #[test_case(Op::BoolAnd, &[Sort::Bool, bv(1)], "Bool operands"; "bit-vector into and")]
    #[test_case(Op::Not, &[bv(8), bv(8)], "expects 1 operand"; "wrong arity")]
    fn test_result_sort_rejects(op: Op, operands: &[Sort], fragment: &str) {
        let err = op.result_sort(operands).expect_err("should be rejected");
        assert!(err.0.contains(fragment), "{}", err);
    }

    #[test]
    fn test_display_indexed() {
        assert_eq!(Op::Extract { high: 7, low: 0 }.to_string(), "(_ extract 7 0)");
        assert_eq!(Op::SignExtend(4).to_string(), "(_ sign_extend 4)");
        assert_eq!(Op::Add.to_string(), "bvadd");
        assert_eq!(Op::MulOverflow { signed: true }.to_string(), "bvsmulo");
    }
}
