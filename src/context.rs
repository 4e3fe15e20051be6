// SPDX-License-Identifier: Apache-2.0

use std::cell::{Ref, RefCell};
use std::collections::HashMap;

use num_bigint::{BigInt, BigUint};

use crate::backend::arena::{ArenaBackend, ArenaConfig};
use crate::backend::{Backend, Response, SolverBackend};
use crate::expr::{Ast, Bool, Expr, Int, BV};
use crate::literal::{encode_signed, truncate_unsigned};
use crate::op::Op;
use crate::smt_bv_error::SmtBvError;
use crate::sort::{BvSort, Sort, SortKind, SortRegistry};

/// Wraps an untyped engine term of the given sort into its typed handle.
pub(crate) type Wrapper<B> = for<'ctx> fn(
    &'ctx Context<B>,
    Sort,
    <B as Backend>::Term,
) -> Result<Expr<'ctx, B>, SmtBvError>;

fn wrap_bool<'ctx, B: Backend>(
    ctx: &'ctx Context<B>,
    _sort: Sort,
    term: B::Term,
) -> Result<Expr<'ctx, B>, SmtBvError> {
    Ok(Expr::Bool(Bool::new(ctx, term)))
}

fn wrap_int<'ctx, B: Backend>(
    ctx: &'ctx Context<B>,
    _sort: Sort,
    term: B::Term,
) -> Result<Expr<'ctx, B>, SmtBvError> {
    Ok(Expr::Int(Int::new(ctx, term)))
}

fn wrap_bv<'ctx, B: Backend>(
    ctx: &'ctx Context<B>,
    sort: Sort,
    term: B::Term,
) -> Result<Expr<'ctx, B>, SmtBvError> {
    let sort = sort
        .as_bv()
        .ok_or_else(|| SmtBvError(format!("cannot wrap a term of sort {} as a bit-vector", sort)))?;
    Ok(Expr::BV(BV::new(ctx, sort, term)))
}

/// Owns an engine and everything built with it.
///
/// Expressions borrow their context, so they cannot outlive it. A context is
/// meant for one thread at a time: it may be moved across threads but not
/// shared between them. Independent contexts share no state.
pub struct Context<B: Backend = ArenaBackend> {
    backend: RefCell<B>,
    sorts: RefCell<SortRegistry>,
    wrappers: HashMap<SortKind, Wrapper<B>>,
}

impl Context<ArenaBackend> {
    /// A context over the in-process arena engine.
    pub fn new() -> Self {
        Context::from_backend(ArenaBackend::with_config(ArenaConfig::default()))
    }
}

impl Default for Context<ArenaBackend> {
    fn default() -> Self {
        Context::new()
    }
}

impl<B: Backend> Context<B> {
    pub fn with_config(config: &B::Config) -> Result<Self, SmtBvError> {
        Ok(Context::from_backend(B::new(config)?))
    }

    pub fn from_backend(backend: B) -> Self {
        let mut wrappers: HashMap<SortKind, Wrapper<B>> = HashMap::new();
        wrappers.insert(SortKind::Bool, wrap_bool::<B>);
        wrappers.insert(SortKind::Int, wrap_int::<B>);
        wrappers.insert(SortKind::BitVec, wrap_bv::<B>);
        log::debug!("created context over the {} engine", B::NAME);
        Context {
            backend: RefCell::new(backend),
            sorts: RefCell::new(SortRegistry::default()),
            wrappers,
        }
    }

    pub(crate) fn backend(&self) -> Ref<'_, B> {
        self.backend.borrow()
    }

    /// Gives the typed handle for a term of `sort`.
    pub(crate) fn wrap(&self, sort: Sort, term: B::Term) -> Result<Expr<'_, B>, SmtBvError> {
        let wrapper = self.wrappers.get(&sort.kind()).ok_or_else(|| {
            SmtBvError(format!("no wrapper registered for sort {}", sort))
        })?;
        wrapper(self, sort, term)
    }

    pub(crate) fn check_owner(&self, other: &Context<B>) -> Result<(), SmtBvError> {
        if std::ptr::eq(self, other) {
            Ok(())
        } else {
            Err(SmtBvError(
                "expressions from different contexts cannot be combined".to_string(),
            ))
        }
    }

    /// Validates operand sorts against the operator table, then builds the
    /// application in the engine.
    pub(crate) fn apply(
        &self,
        op: Op,
        sorts: &[Sort],
        terms: &[B::Term],
    ) -> Result<(Sort, B::Term), SmtBvError> {
        let result = op.result_sort(sorts)?;
        let result = self.sorts.borrow_mut().intern(result)?;
        let term = self.backend.borrow_mut().apply(op, terms, result)?;
        Ok((result, term))
    }

    pub(crate) fn simplify_term(&self, sort: Sort, term: &B::Term) -> Result<B::Term, SmtBvError> {
        self.backend.borrow_mut().simplify(term, sort)
    }

    /// The bit-vector sort of the given width, created on first use.
    pub fn bv_sort(&self, width: u32) -> Result<BvSort, SmtBvError> {
        self.sorts.borrow_mut().intern_bv(width)
    }

    /// Every bit-vector width this context has created a sort for, ascending.
    pub fn bv_widths(&self) -> Vec<u32> {
        self.sorts.borrow().bv_widths()
    }

    pub fn const_of_sort(&self, name: &str, sort: Sort) -> Result<Expr<'_, B>, SmtBvError> {
        let sort = self.sorts.borrow_mut().intern(sort)?;
        let term = self.backend.borrow_mut().declare(name, sort)?;
        self.wrap(sort, term)
    }

    pub fn bv_const(&self, name: &str, width: u32) -> Result<BV<'_, B>, SmtBvError> {
        let sort = self.bv_sort(width)?;
        let term = self.backend.borrow_mut().declare(name, Sort::BitVec(sort))?;
        Ok(BV::new(self, sort, term))
    }

    pub fn bool_const(&self, name: &str) -> Result<Bool<'_, B>, SmtBvError> {
        let term = self.backend.borrow_mut().declare(name, Sort::Bool)?;
        Ok(Bool::new(self, term))
    }

    pub fn bool_val(&self, value: bool) -> Result<Bool<'_, B>, SmtBvError> {
        let term = self.backend.borrow_mut().bool_literal(value)?;
        Ok(Bool::new(self, term))
    }

    /// `value` reduced modulo `2^width`.
    pub fn bv_from_u64(&self, value: u64, width: u32) -> Result<BV<'_, B>, SmtBvError> {
        self.bv_from_big_uint(&BigUint::from(value), width)
    }

    /// `value` in two's complement, reduced modulo `2^width`.
    pub fn bv_from_i64(&self, value: i64, width: u32) -> Result<BV<'_, B>, SmtBvError> {
        self.bv_from_big_int(&BigInt::from(value), width)
    }

    pub fn bv_from_big_uint(&self, value: &BigUint, width: u32) -> Result<BV<'_, B>, SmtBvError> {
        let sort = self.bv_sort(width)?;
        let value = truncate_unsigned(value, width);
        let term = self.backend.borrow_mut().bv_numeral(sort, &value)?;
        Ok(BV::new(self, sort, term))
    }

    pub fn bv_from_big_int(&self, value: &BigInt, width: u32) -> Result<BV<'_, B>, SmtBvError> {
        let sort = self.bv_sort(width)?;
        let value = encode_signed(value, width);
        let term = self.backend.borrow_mut().bv_numeral(sort, &value)?;
        Ok(BV::new(self, sort, term))
    }
}

impl<B: SolverBackend> Context<B> {
    pub fn push(&self) -> Result<(), SmtBvError> {
        self.backend.borrow_mut().push()
    }

    pub fn pop(&self) -> Result<(), SmtBvError> {
        self.backend.borrow_mut().pop()
    }

    pub fn assert(&self, condition: &Bool<'_, B>) -> Result<(), SmtBvError> {
        self.check_owner(condition.ctx())?;
        self.backend.borrow_mut().assert(condition.term())
    }

    pub fn check(&self) -> Result<Response, SmtBvError> {
        let response = self.backend.borrow_mut().check()?;
        log::debug!("{}: check-sat returned {:?}", B::NAME, response);
        Ok(response)
    }

    /// The value `expr` takes in the current model, as a literal of the same
    /// sort. Only meaningful after `check` returned `Response::Sat`.
    pub fn model_value<'ctx, T: Ast<'ctx, B>>(&'ctx self, expr: &T) -> Result<T, SmtBvError> {
        self.check_owner(expr.ctx())?;
        let sort = expr.sort();
        let term = self.backend.borrow_mut().model_value(expr.term(), sort)?;
        T::from_expr(self.wrap(sort, term)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Narrowed;

    #[test]
    fn test_registry_tracks_widths() {
        let ctx = Context::new();
        let x = ctx.bv_const("x", 16).unwrap();
        let y = ctx.bv_const("y", 8).unwrap();
        x.concat(&y).unwrap();
        x.extract(3, 0).unwrap();
        assert_eq!(ctx.bv_widths(), vec![4, 8, 16, 24]);
    }

    #[test]
    fn test_const_of_sort_uses_wrappers() {
        let ctx = Context::new();
        let sort = Sort::BitVec(ctx.bv_sort(12).unwrap());
        let bv = ctx.const_of_sort("v", sort).unwrap();
        assert_eq!(bv.sort(), sort);
        assert!(bv.as_bv().is_some());
        let b = ctx.const_of_sort("b", Sort::Bool).unwrap();
        assert!(b.as_bool().is_some());
        let i = ctx.const_of_sort("i", Sort::Int).unwrap();
        assert_eq!(i.sort(), Sort::Int);
    }

    #[test]
    fn test_literals_are_reduced() {
        let ctx = Context::new();
        assert_eq!(ctx.bv_from_u64(0x1FF, 8).unwrap().as_u64(), Narrowed::Value(0xFF));
        assert_eq!(ctx.bv_from_i64(-1, 4).unwrap().as_u64(), Narrowed::Value(0xF));
        let big = BigInt::from(-3) - (BigInt::from(1) << 70usize);
        assert_eq!(ctx.bv_from_big_int(&big, 8).unwrap().as_i64(), Narrowed::Value(-3));
    }

    #[test]
    fn test_zero_width_rejected() {
        let ctx = Context::new();
        assert!(ctx.bv_const("z", 0).is_err());
        assert!(ctx.bv_from_u64(0, 0).is_err());
        assert!(ctx.bv_widths().is_empty());
    }

    #[test]
    fn test_contexts_do_not_mix() {
        let a = Context::new();
        let b = Context::new();
        let x = a.bv_const("x", 8).unwrap();
        let y = b.bv_const("x", 8).unwrap();
        let err = x.add(&y).unwrap_err();
        assert!(err.0.contains("different contexts"), "{}", err);
    }
}
