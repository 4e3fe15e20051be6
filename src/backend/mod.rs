// SPDX-License-Identifier: Apache-2.0

//! The narrow interface the expression layer needs from an SMT engine.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;

use crate::op::Op;
use crate::smt_bv_error::SmtBvError;
use crate::sort::{BvSort, Sort};

pub mod arena;
pub mod easy_smt_backend;
pub(crate) mod eval;
pub(crate) mod symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Sat,
    Unsat,
    Unknown,
}

/// Term construction and numeral queries.
///
/// Operands passed to `apply` have already been checked against the operator
/// table, and `result` is the sort the table computed for them.
pub trait Backend: Sized {
    type Term: Clone + fmt::Debug;
    type Config;

    /// Short engine name used in log messages.
    const NAME: &'static str;

    fn new(config: &Self::Config) -> Result<Self, SmtBvError>;

    fn declare(&mut self, name: &str, sort: Sort) -> Result<Self::Term, SmtBvError>;

    /// `value` is below `2^sort.width()`.
    fn bv_numeral(&mut self, sort: BvSort, value: &BigUint) -> Result<Self::Term, SmtBvError>;

    fn bool_literal(&mut self, value: bool) -> Result<Self::Term, SmtBvError>;

    fn apply(&mut self, op: Op, args: &[Self::Term], result: Sort)
        -> Result<Self::Term, SmtBvError>;

    /// True for bit-vector and integer numerals.
    fn is_numeral_literal(&self, term: &Self::Term) -> bool;

    /// The unsigned numeral behind a bit-vector literal.
    fn numeral_big(&self, term: &Self::Term) -> Option<BigUint>;

    /// The numeral behind a bit-vector literal if it fits in 64 bits.
    fn numeral_u64(&self, term: &Self::Term) -> Option<u64> {
        self.numeral_big(term).and_then(|v| v.to_u64())
    }

    fn int_numeral(&self, term: &Self::Term) -> Option<BigInt>;

    fn bool_value(&self, term: &Self::Term) -> Option<bool>;

    /// Rewrites `term` into an equivalent, possibly smaller, term. Engines
    /// without a rewriter return the term unchanged.
    fn simplify(&mut self, term: &Self::Term, _sort: Sort) -> Result<Self::Term, SmtBvError> {
        Ok(term.clone())
    }

    fn render(&self, term: &Self::Term) -> String;
}

/// Engines that can also decide satisfiability.
pub trait SolverBackend: Backend {
    fn push(&mut self) -> Result<(), SmtBvError>;
    fn pop(&mut self) -> Result<(), SmtBvError>;
    fn assert(&mut self, term: &Self::Term) -> Result<(), SmtBvError>;
    fn check(&mut self) -> Result<Response, SmtBvError>;
    /// The value `term` takes in the model of the last satisfiable `check`,
    /// as a literal term of `sort`.
    fn model_value(&mut self, term: &Self::Term, sort: Sort) -> Result<Self::Term, SmtBvError>;
}

#[cfg(test)]
pub mod test_utils {
    use num_bigint::{BigInt, BigUint};

    use crate::backend::Backend;
    use crate::context::Context;
    use crate::literal::Narrowed;

    pub fn test_literal_round_trip<B: Backend>(ctx: &Context<B>) {
        let a = ctx.bv_from_u64(200, 8).unwrap();
        assert!(a.is_literal());
        assert_eq!(a.as_big_unsigned(), Some(BigUint::from(200u32)));
        assert_eq!(a.as_big_signed(), Some(BigInt::from(-56)));
        assert_eq!(a.as_u64(), Narrowed::Value(200));
        assert_eq!(a.as_i64(), Narrowed::Value(-56));
    }

    pub fn test_wide_literal<B: Backend>(ctx: &Context<B>) {
        let value = (BigUint::from(1u32) << 100usize) + 7u32;
        let a = ctx.bv_from_big_uint(&value, 101).unwrap();
        assert_eq!(a.as_big_unsigned(), Some(value.clone()));
        assert_eq!(a.as_big_signed(), Some(BigInt::from(value) - (BigInt::from(1) << 101usize)));
        assert_eq!(a.as_u64(), Narrowed::OutOfRange);
        assert_eq!(a.as_i64(), Narrowed::OutOfRange);
    }

    pub fn test_negative_literal<B: Backend>(ctx: &Context<B>) {
        let a = ctx.bv_from_i64(-1, 32).unwrap();
        assert_eq!(a.as_u64(), Narrowed::Value(0xFFFF_FFFF));
        assert_eq!(a.as_i64().into_parts(), (-1, true, true));
        let b = ctx.bv_from_i64(i64::MIN, 128).unwrap();
        assert_eq!(b.as_u64(), Narrowed::OutOfRange);
        assert_eq!(b.as_i64(), Narrowed::Value(i64::MIN));
    }

    pub fn test_symbolic_is_not_literal<B: Backend>(ctx: &Context<B>) {
        let x = ctx.bv_const("x", 16).unwrap();
        assert!(!x.is_literal());
        assert_eq!(x.as_big_unsigned(), None);
        assert_eq!(x.as_big_signed(), None);
        assert_eq!(x.as_u64(), Narrowed::NotLiteral);
        assert_eq!(x.as_i64(), Narrowed::NotLiteral);
        let one = ctx.bv_from_u64(1, 16).unwrap();
        let sum = x.add(&one).unwrap();
        assert_eq!(sum.as_i64(), Narrowed::NotLiteral);

        // Free variables whose names read like numerals.
        for name in ["#b1", "#x0f", "42", "odd name"] {
            let v = ctx.bv_const(name, 8).unwrap();
            assert!(!v.is_literal(), "{}", name);
            assert_eq!(v.as_u64(), Narrowed::NotLiteral, "{}", name);
        }
        assert!(ctx.bv_const("a|b", 8).is_err());
    }

    pub fn test_result_widths<B: Backend>(ctx: &Context<B>) {
        let x = ctx.bv_const("x", 16).unwrap();
        let y = ctx.bv_const("y", 8).unwrap();
        assert_eq!(x.extract(7, 0).unwrap().width(), 8);
        assert_eq!(x.concat(&y).unwrap().width(), 24);
        assert_eq!(y.sign_extend(8).unwrap().width(), 16);
        assert_eq!(y.zero_extend(56).unwrap().width(), 64);
        assert_eq!(y.repeat(4).unwrap().width(), 32);
        assert!(x.add(&y).is_err());
    }

    #[macro_export]
    macro_rules! test_backend {
        ($mod_ident:ident, $context:expr) => {
            #[cfg(test)]
            mod $mod_ident {
                use $crate::backend::test_utils;

                #[test]
                fn test_literal_round_trip() {
                    let ctx = $context;
                    test_utils::test_literal_round_trip(&ctx);
                }

                #[test]
                fn test_wide_literal() {
                    let ctx = $context;
                    test_utils::test_wide_literal(&ctx);
                }

                #[test]
                fn test_negative_literal() {
                    let ctx = $context;
                    test_utils::test_negative_literal(&ctx);
                }

                #[test]
                fn test_symbolic_is_not_literal() {
                    let ctx = $context;
                    test_utils::test_symbolic_is_not_literal(&ctx);
                }

                #[test]
                fn test_result_widths() {
                    let ctx = $context;
                    test_utils::test_result_widths(&ctx);
                }
            }
        };
    }
}
