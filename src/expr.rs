// SPDX-License-Identifier: Apache-2.0

//! Typed expression handles. Each handle pairs an engine term with its sort
//! and borrows the context that built it.

use std::fmt;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::backend::arena::ArenaBackend;
use crate::backend::Backend;
use crate::context::Context;
use crate::literal::Narrowed;
use crate::op::Op;
use crate::smt_bv_error::SmtBvError;
use crate::sort::{BvSort, Sort};

/// Operations shared by every typed handle.
pub trait Ast<'ctx, B: Backend + 'ctx>: Sized {
    fn ctx(&self) -> &'ctx Context<B>;
    fn sort(&self) -> Sort;
    fn term(&self) -> &B::Term;
    fn into_expr(self) -> Expr<'ctx, B>;
    /// Fails when `expr` has a different sort than `Self` represents.
    fn from_expr(expr: Expr<'ctx, B>) -> Result<Self, SmtBvError>;

    /// `(= self other)`. Both sides must have the same sort.
    fn equals(&self, other: &Self) -> Result<Bool<'ctx, B>, SmtBvError> {
        let ctx = self.ctx();
        ctx.check_owner(other.ctx())?;
        let (_, term) = ctx.apply(
            Op::Eq,
            &[self.sort(), other.sort()],
            &[self.term().clone(), other.term().clone()],
        )?;
        Ok(Bool::new(ctx, term))
    }

    /// Asks the engine for an equivalent, possibly smaller, expression. With
    /// the arena engine, ground sub-terms become literals.
    fn simplify(&self) -> Result<Self, SmtBvError> {
        let ctx = self.ctx();
        let sort = self.sort();
        let term = ctx.simplify_term(sort, self.term())?;
        Self::from_expr(ctx.wrap(sort, term)?)
    }

    /// SMT-LIB text of the expression.
    fn render(&self) -> String {
        self.ctx().backend().render(self.term())
    }
}

fn sort_mismatch(want: &str, got: Sort) -> SmtBvError {
    SmtBvError(format!("expected a {} expression, got sort {}", want, got))
}

pub struct BV<'ctx, B: Backend = ArenaBackend> {
    pub(crate) ctx: &'ctx Context<B>,
    pub(crate) sort: BvSort,
    pub(crate) term: B::Term,
}

pub struct Bool<'ctx, B: Backend = ArenaBackend> {
    pub(crate) ctx: &'ctx Context<B>,
    pub(crate) term: B::Term,
}

pub struct Int<'ctx, B: Backend = ArenaBackend> {
    pub(crate) ctx: &'ctx Context<B>,
    pub(crate) term: B::Term,
}

/// A handle whose sort is only known at run time.
pub enum Expr<'ctx, B: Backend = ArenaBackend> {
    Bool(Bool<'ctx, B>),
    Int(Int<'ctx, B>),
    BV(BV<'ctx, B>),
}

macro_rules! bv_binary {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self, rhs: &BV<'ctx, B>) -> Result<BV<'ctx, B>, SmtBvError> {
                self.binary($op, rhs)
            }
        )*
    };
}

macro_rules! bv_predicate {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self, rhs: &BV<'ctx, B>) -> Result<Bool<'ctx, B>, SmtBvError> {
                self.predicate($op, rhs)
            }
        )*
    };
}

impl<'ctx, B: Backend> BV<'ctx, B> {
    pub(crate) fn new(ctx: &'ctx Context<B>, sort: BvSort, term: B::Term) -> Self {
        BV { ctx, sort, term }
    }

    pub fn width(&self) -> u32 {
        self.sort.width()
    }

    pub fn bv_sort(&self) -> BvSort {
        self.sort
    }

    fn unary(&self, op: Op) -> Result<(Sort, B::Term), SmtBvError> {
        self.ctx
            .apply(op, &[Sort::BitVec(self.sort)], std::slice::from_ref(&self.term))
    }

    fn unary_bv(&self, op: Op) -> Result<BV<'ctx, B>, SmtBvError> {
        let (sort, term) = self.unary(op)?;
        let sort = sort.as_bv().ok_or_else(|| sort_mismatch("bit-vector", sort))?;
        Ok(BV::new(self.ctx, sort, term))
    }

    fn pair(&self, op: Op, rhs: &BV<'ctx, B>) -> Result<(Sort, B::Term), SmtBvError> {
        self.ctx.check_owner(rhs.ctx)?;
        self.ctx.apply(
            op,
            &[Sort::BitVec(self.sort), Sort::BitVec(rhs.sort)],
            &[self.term.clone(), rhs.term.clone()],
        )
    }

    fn binary(&self, op: Op, rhs: &BV<'ctx, B>) -> Result<BV<'ctx, B>, SmtBvError> {
        let (sort, term) = self.pair(op, rhs)?;
        let sort = sort.as_bv().ok_or_else(|| sort_mismatch("bit-vector", sort))?;
        Ok(BV::new(self.ctx, sort, term))
    }

    fn predicate(&self, op: Op, rhs: &BV<'ctx, B>) -> Result<Bool<'ctx, B>, SmtBvError> {
        let (_, term) = self.pair(op, rhs)?;
        Ok(Bool::new(self.ctx, term))
    }

    pub fn not(&self) -> Result<BV<'ctx, B>, SmtBvError> {
        self.unary_bv(Op::Not)
    }

    /// Two's complement negation.
    pub fn neg(&self) -> Result<BV<'ctx, B>, SmtBvError> {
        self.unary_bv(Op::Neg)
    }

    bv_binary! {
        and => Op::And;
        or => Op::Or;
        xor => Op::Xor;
        nand => Op::Nand;
        nor => Op::Nor;
        xnor => Op::Xnor;
        add => Op::Add;
        sub => Op::Sub;
        mul => Op::Mul;
        /// Division by zero gives all ones.
        udiv => Op::UDiv;
        sdiv => Op::SDiv;
        /// Remainder by zero gives the dividend.
        urem => Op::URem;
        /// Signed remainder; the result takes the sign of the dividend.
        srem => Op::SRem;
        /// Signed modulus; the result takes the sign of the divisor.
        smod => Op::SMod;
        /// `rhs` is read as unsigned. Shifting by the width or more gives zero.
        shl => Op::Shl;
        lshr => Op::LShr;
        /// Shifting by the width or more fills with the sign bit.
        ashr => Op::AShr;
        /// Rotation amount is taken modulo the width.
        rotate_left => Op::RotateLeft;
        rotate_right => Op::RotateRight;
    }

    bv_predicate! {
        ult => Op::Ult;
        slt => Op::Slt;
        ule => Op::Ule;
        sle => Op::Sle;
        uge => Op::Uge;
        sge => Op::Sge;
        ugt => Op::Ugt;
        sgt => Op::Sgt;
        sdiv_overflows => Op::SDivOverflow;
    }

    /// True when `self + rhs` does not fit the width, read as signed or
    /// unsigned per `signed`.
    pub fn add_overflows(&self, rhs: &BV<'ctx, B>, signed: bool) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.predicate(Op::AddOverflow { signed }, rhs)
    }

    pub fn sub_overflows(&self, rhs: &BV<'ctx, B>, signed: bool) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.predicate(Op::SubOverflow { signed }, rhs)
    }

    pub fn mul_overflows(&self, rhs: &BV<'ctx, B>, signed: bool) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.predicate(Op::MulOverflow { signed }, rhs)
    }

    /// True only for the signed minimum, whose negation is itself.
    pub fn neg_overflows(&self) -> Result<Bool<'ctx, B>, SmtBvError> {
        let (_, term) = self.unary(Op::NegOverflow)?;
        Ok(Bool::new(self.ctx, term))
    }

    /// `self` in the high bits, `rhs` in the low bits.
    pub fn concat(&self, rhs: &BV<'ctx, B>) -> Result<BV<'ctx, B>, SmtBvError> {
        self.binary(Op::Concat, rhs)
    }

    /// Bits `high` down to `low`, inclusive.
    pub fn extract(&self, high: u32, low: u32) -> Result<BV<'ctx, B>, SmtBvError> {
        self.unary_bv(Op::Extract { high, low })
    }

    /// Widens by `extra` copies of the sign bit.
    pub fn sign_extend(&self, extra: u32) -> Result<BV<'ctx, B>, SmtBvError> {
        self.unary_bv(Op::SignExtend(extra))
    }

    pub fn zero_extend(&self, extra: u32) -> Result<BV<'ctx, B>, SmtBvError> {
        self.unary_bv(Op::ZeroExtend(extra))
    }

    pub fn repeat(&self, count: u32) -> Result<BV<'ctx, B>, SmtBvError> {
        self.unary_bv(Op::Repeat(count))
    }

    pub fn s_to_int(&self) -> Result<Int<'ctx, B>, SmtBvError> {
        let (_, term) = self.unary(Op::ToInt { signed: true })?;
        Ok(Int::new(self.ctx, term))
    }

    pub fn u_to_int(&self) -> Result<Int<'ctx, B>, SmtBvError> {
        let (_, term) = self.unary(Op::ToInt { signed: false })?;
        Ok(Int::new(self.ctx, term))
    }
}

impl<'ctx, B: Backend> Bool<'ctx, B> {
    pub(crate) fn new(ctx: &'ctx Context<B>, term: B::Term) -> Self {
        Bool { ctx, term }
    }

    fn logic(&self, op: Op, rhs: Option<&Bool<'ctx, B>>) -> Result<Bool<'ctx, B>, SmtBvError> {
        let mut sorts = vec![Sort::Bool];
        let mut terms = vec![self.term.clone()];
        if let Some(rhs) = rhs {
            self.ctx.check_owner(rhs.ctx)?;
            sorts.push(Sort::Bool);
            terms.push(rhs.term.clone());
        }
        let (_, term) = self.ctx.apply(op, &sorts, &terms)?;
        Ok(Bool::new(self.ctx, term))
    }

    pub fn not(&self) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.logic(Op::BoolNot, None)
    }

    pub fn and(&self, rhs: &Bool<'ctx, B>) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.logic(Op::BoolAnd, Some(rhs))
    }

    pub fn or(&self, rhs: &Bool<'ctx, B>) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.logic(Op::BoolOr, Some(rhs))
    }

    pub fn xor(&self, rhs: &Bool<'ctx, B>) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.logic(Op::BoolXor, Some(rhs))
    }

    pub fn implies(&self, rhs: &Bool<'ctx, B>) -> Result<Bool<'ctx, B>, SmtBvError> {
        self.logic(Op::Implies, Some(rhs))
    }

    /// `then` if `self` holds, `otherwise` if not.
    pub fn ite<T: Ast<'ctx, B>>(&self, then: &T, otherwise: &T) -> Result<T, SmtBvError> {
        self.ctx.check_owner(then.ctx())?;
        self.ctx.check_owner(otherwise.ctx())?;
        let (sort, term) = self.ctx.apply(
            Op::Ite,
            &[Sort::Bool, then.sort(), otherwise.sort()],
            &[self.term.clone(), then.term().clone(), otherwise.term().clone()],
        )?;
        T::from_expr(self.ctx.wrap(sort, term)?)
    }

    /// The literal's truth value, `None` when the expression is symbolic.
    pub fn as_bool(&self) -> Option<bool> {
        self.ctx.backend().bool_value(&self.term)
    }
}

impl<'ctx, B: Backend> Int<'ctx, B> {
    pub(crate) fn new(ctx: &'ctx Context<B>, term: B::Term) -> Self {
        Int { ctx, term }
    }

    pub fn is_literal(&self) -> bool {
        self.ctx.backend().is_numeral_literal(&self.term)
    }

    pub fn as_big_int(&self) -> Option<BigInt> {
        self.ctx.backend().int_numeral(&self.term)
    }

    pub fn as_i64(&self) -> Narrowed<i64> {
        match self.as_big_int() {
            None => Narrowed::NotLiteral,
            Some(value) => match value.to_i64() {
                Some(v) => Narrowed::Value(v),
                None => Narrowed::OutOfRange,
            },
        }
    }
}

impl<'ctx, B: Backend> Expr<'ctx, B> {
    pub fn as_bv(&self) -> Option<&BV<'ctx, B>> {
        match self {
            Expr::BV(bv) => Some(bv),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&Bool<'ctx, B>> {
        match self {
            Expr::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&Int<'ctx, B>> {
        match self {
            Expr::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl<'ctx, B: Backend + 'ctx> Ast<'ctx, B> for BV<'ctx, B> {
    fn ctx(&self) -> &'ctx Context<B> {
        self.ctx
    }

    fn sort(&self) -> Sort {
        Sort::BitVec(self.sort)
    }

    fn term(&self) -> &B::Term {
        &self.term
    }

    fn into_expr(self) -> Expr<'ctx, B> {
        Expr::BV(self)
    }

    fn from_expr(expr: Expr<'ctx, B>) -> Result<Self, SmtBvError> {
        match expr {
            Expr::BV(bv) => Ok(bv),
            other => Err(sort_mismatch("bit-vector", other.sort())),
        }
    }
}

impl<'ctx, B: Backend + 'ctx> Ast<'ctx, B> for Bool<'ctx, B> {
    fn ctx(&self) -> &'ctx Context<B> {
        self.ctx
    }

    fn sort(&self) -> Sort {
        Sort::Bool
    }

    fn term(&self) -> &B::Term {
        &self.term
    }

    fn into_expr(self) -> Expr<'ctx, B> {
        Expr::Bool(self)
    }

    fn from_expr(expr: Expr<'ctx, B>) -> Result<Self, SmtBvError> {
        match expr {
            Expr::Bool(b) => Ok(b),
            other => Err(sort_mismatch("Bool", other.sort())),
        }
    }
}

impl<'ctx, B: Backend + 'ctx> Ast<'ctx, B> for Int<'ctx, B> {
    fn ctx(&self) -> &'ctx Context<B> {
        self.ctx
    }

    fn sort(&self) -> Sort {
        Sort::Int
    }

    fn term(&self) -> &B::Term {
        &self.term
    }

    fn into_expr(self) -> Expr<'ctx, B> {
        Expr::Int(self)
    }

    fn from_expr(expr: Expr<'ctx, B>) -> Result<Self, SmtBvError> {
        match expr {
            Expr::Int(i) => Ok(i),
            other => Err(sort_mismatch("Int", other.sort())),
        }
    }
}

impl<'ctx, B: Backend + 'ctx> Ast<'ctx, B> for Expr<'ctx, B> {
    fn ctx(&self) -> &'ctx Context<B> {
        match self {
            Expr::Bool(b) => b.ctx,
            Expr::Int(i) => i.ctx,
            Expr::BV(bv) => bv.ctx,
        }
    }

    fn sort(&self) -> Sort {
        match self {
            Expr::Bool(b) => b.sort(),
            Expr::Int(i) => i.sort(),
            Expr::BV(bv) => bv.sort(),
        }
    }

    fn term(&self) -> &B::Term {
        match self {
            Expr::Bool(b) => &b.term,
            Expr::Int(i) => &i.term,
            Expr::BV(bv) => &bv.term,
        }
    }

    fn into_expr(self) -> Expr<'ctx, B> {
        self
    }

    fn from_expr(expr: Expr<'ctx, B>) -> Result<Self, SmtBvError> {
        Ok(expr)
    }
}

// Handles hold a shared reference and an engine term; cloning never needs
// `B: Clone`, so these are written out instead of derived.

impl<'ctx, B: Backend> Clone for BV<'ctx, B> {
    fn clone(&self) -> Self {
        BV {
            ctx: self.ctx,
            sort: self.sort,
            term: self.term.clone(),
        }
    }
}

impl<'ctx, B: Backend> Clone for Bool<'ctx, B> {
    fn clone(&self) -> Self {
        Bool {
            ctx: self.ctx,
            term: self.term.clone(),
        }
    }
}

impl<'ctx, B: Backend> Clone for Int<'ctx, B> {
    fn clone(&self) -> Self {
        Int {
            ctx: self.ctx,
            term: self.term.clone(),
        }
    }
}

impl<'ctx, B: Backend> Clone for Expr<'ctx, B> {
    fn clone(&self) -> Self {
        match self {
            Expr::Bool(b) => Expr::Bool(b.clone()),
            Expr::Int(i) => Expr::Int(i.clone()),
            Expr::BV(bv) => Expr::BV(bv.clone()),
        }
    }
}

macro_rules! impl_text {
    ($($ty:ident),*) => {
        $(
            impl<'ctx, B: Backend + 'ctx> fmt::Display for $ty<'ctx, B> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.render())
                }
            }

            impl<'ctx, B: Backend + 'ctx> fmt::Debug for $ty<'ctx, B> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{} : {}", self.render(), self.sort())
                }
            }
        )*
    };
}

impl_text!(BV, Bool, Int, Expr);
