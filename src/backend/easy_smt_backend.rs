// SPDX-License-Identifier: Apache-2.0

#![cfg(feature = "has-easy-smt")]

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use easy_smt::{Context as SmtContext, ContextBuilder, SExpr};
use num_bigint::{BigInt, BigUint};

use crate::backend::arena::bv_literal_text;
use crate::backend::symbol::{check_symbol, quote_symbol};
use crate::backend::{Backend, Response, SolverBackend};
use crate::op::Op;
use crate::smt_bv_error::SmtBvError;
use crate::sort::{BvSort, Sort};

#[derive(Debug, Clone)]
pub struct SolverFn {
    pub push_fn: fn(&mut SmtContext) -> io::Result<()>,
    pub pop_fn: fn(&mut SmtContext) -> io::Result<()>,
    pub check_fn: fn(&mut SmtContext) -> io::Result<easy_smt::Response>,
    pub assert_fn: fn(&mut SmtContext, SExpr) -> io::Result<()>,
}

impl Default for SolverFn {
    fn default() -> Self {
        Self {
            push_fn: SmtContext::push,
            pop_fn: SmtContext::pop,
            check_fn: SmtContext::check,
            assert_fn: SmtContext::assert,
        }
    }
}

/// Configuration for driving an external SMT-LIB2 solver process.
///
/// Every term is sent to the solver as text over stdin, so building large
/// formulas is slower than with the in-process arena; in exchange any solver
/// speaking SMT-LIB2 can be used and satisfiability can be decided.
#[derive(Clone)]
pub struct EasySmtConfig {
    pub solver_path: PathBuf,
    pub solver_args: Vec<String>,
    /// Records every command sent to the solver.
    pub replay_file: Option<PathBuf>,
    pub solver_fn: SolverFn,
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl EasySmtConfig {
    pub fn bitwuzla() -> Self {
        Self {
            solver_path: PathBuf::from("bitwuzla"),
            solver_args: args(&["--produce-models"]),
            replay_file: None,
            solver_fn: SolverFn {
                push_fn: |ctx| ctx.push_many(1),
                pop_fn: |ctx| ctx.pop_many(1),
                ..SolverFn::default()
            },
        }
    }

    pub fn boolector() -> Self {
        Self {
            solver_path: PathBuf::from("boolector"),
            solver_args: args(&[
                "--smt2",
                "-m",
                "--output-format=smt2",
                "--no-exit-codes",
                "--incremental",
            ]),
            replay_file: None,
            solver_fn: SolverFn {
                push_fn: |ctx| ctx.push_many(1),
                pop_fn: |ctx| ctx.pop_many(1),
                ..SolverFn::default()
            },
        }
    }

    pub fn z3() -> Self {
        Self {
            solver_path: PathBuf::from("z3"),
            solver_args: args(&["-nw", "-smt2", "-in"]),
            replay_file: None,
            solver_fn: SolverFn::default(),
        }
    }

    pub fn cvc5() -> Self {
        Self {
            solver_path: PathBuf::from("cvc5"),
            solver_args: args(&["--lang=smt2", "--incremental", "--produce-models"]),
            replay_file: None,
            solver_fn: SolverFn::default(),
        }
    }
}

pub struct EasySmtBackend {
    context: SmtContext,
    solver_fn: SolverFn,
    declared: HashMap<String, (Sort, SExpr)>,
    /// Widths of declared and applied bit-vector terms, which `ToInt` and the
    /// overflow expansions need for their operands. Numerals are not recorded
    /// since their text carries the width. Entries live as long as the
    /// backend, like the terms in the easy-smt arena they key.
    widths: HashMap<SExpr, u32>,
}

/// Parses `#b…` and `#x…` numerals into `(width, value)`.
pub(crate) fn parse_bv_atom(atom: &str) -> Option<(u32, BigUint)> {
    let (digits, radix, bits_per_digit) = if let Some(rest) = atom.strip_prefix("#b") {
        (rest, 2, 1)
    } else if let Some(rest) = atom.strip_prefix("#x") {
        (rest, 16, 4)
    } else {
        return None;
    };
    if digits.is_empty() {
        return None;
    }
    let width = u32::try_from(digits.len()).ok()?.checked_mul(bits_per_digit)?;
    let value = BigUint::parse_bytes(digits.as_bytes(), radix)?;
    Some((width, value))
}

/// Parses an SMT-LIB decimal numeral.
fn parse_decimal(atom: &str) -> Option<BigUint> {
    if atom.is_empty() || !atom.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(atom.as_bytes(), 10)
}

impl EasySmtBackend {
    fn width_of(&self, term: SExpr) -> Result<u32, SmtBvError> {
        if let Some(width) = self.widths.get(&term) {
            return Ok(*width);
        }
        self.bv_numeral_of(term)
            .map(|(width, _)| width)
            .ok_or_else(|| {
                SmtBvError(format!(
                    "no bit-vector width known for {}",
                    self.context.display(term)
                ))
            })
    }

    fn numeral(&self, value: u32) -> SExpr {
        self.context.numeral(value as usize)
    }

    fn indexed(&self, name: &str, indices: &[u32]) -> SExpr {
        let mut items = vec![self.context.atoms().und, self.context.atom(name)];
        items.extend(indices.iter().map(|i| self.numeral(*i)));
        self.context.list(items)
    }

    fn app(&self, head: SExpr, args: &[SExpr]) -> SExpr {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(head);
        items.extend_from_slice(args);
        self.context.list(items)
    }

    fn call(&self, name: &str, args: &[SExpr]) -> SExpr {
        self.app(self.context.atom(name), args)
    }

    fn bv_const(&self, width: u32, value: &BigUint) -> SExpr {
        self.context.atom(bv_literal_text(width, value))
    }

    fn sort_expr(&self, sort: Sort) -> SExpr {
        match sort {
            Sort::Bool => self.context.bool_sort(),
            Sort::Int => self.context.int_sort(),
            Sort::BitVec(bv) => self.context.bit_vec_sort(self.numeral(bv.width())),
        }
    }

    fn bit(&self, index: u32, e: SExpr) -> SExpr {
        self.app(self.indexed("extract", &[index, index]), &[e])
    }

    /// The `(_ bvN w)` and `#b`/`#x` forms of a bit-vector numeral.
    fn bv_numeral_of(&self, term: SExpr) -> Option<(u32, BigUint)> {
        if let Some(atom) = self.context.get_atom(term) {
            return parse_bv_atom(atom);
        }
        let items = self.context.get_list(term)?;
        if items.len() != 3 || self.context.get_atom(items[0]) != Some("_") {
            return None;
        }
        let value = self.context.get_atom(items[1])?.strip_prefix("bv")?;
        let value = parse_decimal(value)?;
        let width: u32 = self.context.get_atom(items[2])?.parse().ok()?;
        Some((width, value))
    }

    fn int_numeral_of(&self, term: SExpr) -> Option<BigInt> {
        if let Some(atom) = self.context.get_atom(term) {
            return parse_decimal(atom).map(BigInt::from);
        }
        let items = self.context.get_list(term)?;
        if items.len() != 2 || self.context.get_atom(items[0]) != Some("-") {
            return None;
        }
        let magnitude = parse_decimal(self.context.get_atom(items[1])?)?;
        Some(-BigInt::from(magnitude))
    }

    /// Rotation by a symbolic amount, which SMT-LIB only offers for constant
    /// indices.
    fn rotate(&self, left: bool, a: SExpr, b: SExpr, width: u32) -> SExpr {
        let w = self.bv_const(width, &BigUint::from(width));
        let by = self.call("bvurem", &[b, w]);
        let back = self.call("bvsub", &[w, by]);
        let (first, second) = if left {
            ("bvshl", "bvlshr")
        } else {
            ("bvlshr", "bvshl")
        };
        self.call(
            "bvor",
            &[self.call(first, &[a, by]), self.call(second, &[a, back])],
        )
    }

    fn to_int(&self, signed: bool, a: SExpr, width: u32) -> SExpr {
        let unsigned = self.call("bv2nat", &[a]);
        if !signed {
            return unsigned;
        }
        let modulus = BigUint::from(1u32) << width as usize;
        let zero = self.bv_const(width, &BigUint::from(0u32));
        let negative = self.call("bvslt", &[a, zero]);
        let shifted = self.call("-", &[unsigned, self.context.atom(modulus.to_string())]);
        self.context.ite(negative, shifted, unsigned)
    }

    /// Overflow predicates written with widening arithmetic, which every
    /// QF_BV solver accepts.
    fn overflow(&self, op: Op, a: SExpr, b: Option<SExpr>, width: u32) -> SExpr {
        let ctx = &self.context;
        let min = self.bv_const(width, &(BigUint::from(1u32) << (width - 1) as usize));
        let b = b.unwrap_or(min);
        let ext = |signed: bool, by: u32, e: SExpr| {
            let name = if signed { "sign_extend" } else { "zero_extend" };
            self.app(self.indexed(name, &[by]), &[e])
        };
        let sign_bits_differ = |sum: SExpr| {
            ctx.not(ctx.eq(self.bit(width, sum), self.bit(width - 1, sum)))
        };
        match op {
            Op::AddOverflow { signed: false } => {
                let sum = self.call("bvadd", &[ext(false, 1, a), ext(false, 1, b)]);
                ctx.eq(self.bit(width, sum), ctx.atom("#b1"))
            }
            Op::AddOverflow { signed: true } => {
                sign_bits_differ(self.call("bvadd", &[ext(true, 1, a), ext(true, 1, b)]))
            }
            Op::SubOverflow { signed: false } => self.call("bvult", &[a, b]),
            Op::SubOverflow { signed: true } => {
                sign_bits_differ(self.call("bvsub", &[ext(true, 1, a), ext(true, 1, b)]))
            }
            Op::MulOverflow { signed: false } => {
                let product = self.call("bvmul", &[ext(false, width, a), ext(false, width, b)]);
                let high = self.app(self.indexed("extract", &[2 * width - 1, width]), &[product]);
                ctx.not(ctx.eq(high, self.bv_const(width, &BigUint::from(0u32))))
            }
            Op::MulOverflow { signed: true } => {
                let product = self.call("bvmul", &[ext(true, width, a), ext(true, width, b)]);
                let low = self.app(self.indexed("extract", &[width - 1, 0]), &[product]);
                ctx.not(ctx.eq(product, ext(true, width, low)))
            }
            Op::SDivOverflow => {
                let all_ones = self.bv_const(width, &crate::literal::mask(width));
                ctx.and(ctx.eq(a, min), ctx.eq(b, all_ones))
            }
            _ => ctx.eq(a, min),
        }
    }
}

impl Backend for EasySmtBackend {
    type Term = SExpr;
    type Config = EasySmtConfig;

    const NAME: &'static str = "easy-smt";

    fn new(config: &EasySmtConfig) -> Result<Self, SmtBvError> {
        let mut builder = ContextBuilder::new();
        if let Some(ref replay_file) = config.replay_file {
            builder.replay_file(Some(std::fs::File::create(replay_file)?));
        }
        builder.solver(&config.solver_path);
        builder.solver_args(&config.solver_args);
        log::info!(
            "launching solver {} {:?}",
            config.solver_path.display(),
            config.solver_args
        );
        let context = builder.build()?;
        Ok(EasySmtBackend {
            context,
            solver_fn: config.solver_fn.clone(),
            declared: HashMap::new(),
            widths: HashMap::new(),
        })
    }

    fn declare(&mut self, name: &str, sort: Sort) -> Result<SExpr, SmtBvError> {
        check_symbol(name)?;
        if let Some((existing, term)) = self.declared.get(name) {
            if *existing != sort {
                return Err(SmtBvError(format!(
                    "{} is already declared with sort {}, not {}",
                    name, existing, sort
                )));
            }
            return Ok(*term);
        }
        log::debug!("easy-smt: declaring {} : {}", name, sort);
        let sort_expr = self.sort_expr(sort);
        let term = self.context.declare_const(quote_symbol(name), sort_expr)?;
        self.declared.insert(name.to_string(), (sort, term));
        if let Some(width) = sort.bv_width() {
            self.widths.insert(term, width);
        }
        Ok(term)
    }

    fn bv_numeral(&mut self, sort: BvSort, value: &BigUint) -> Result<SExpr, SmtBvError> {
        if value.bits() > u64::from(sort.width()) {
            return Err(SmtBvError(format!(
                "numeral {} does not fit in {} bits",
                value,
                sort.width()
            )));
        }
        Ok(self.bv_const(sort.width(), value))
    }

    fn bool_literal(&mut self, value: bool) -> Result<SExpr, SmtBvError> {
        Ok(self.context.atom(if value { "true" } else { "false" }))
    }

    fn apply(&mut self, op: Op, args: &[SExpr], result: Sort) -> Result<SExpr, SmtBvError> {
        if args.len() != op.arity() {
            return Err(SmtBvError(format!(
                "{} expects {} operand(s), got {}",
                op.name(),
                op.arity(),
                args.len()
            )));
        }
        let operand_width = || {
            result.bv_width().ok_or_else(|| {
                SmtBvError(format!("{} must produce a bit-vector", op.name()))
            })
        };
        let term = match op {
            Op::RotateLeft | Op::RotateRight => {
                self.rotate(op == Op::RotateLeft, args[0], args[1], operand_width()?)
            }
            // Bool and Int results do not carry the operand width.
            Op::ToInt { signed } => {
                let width = self.width_of(args[0])?;
                self.to_int(signed, args[0], width)
            }
            Op::AddOverflow { .. }
            | Op::SubOverflow { .. }
            | Op::MulOverflow { .. }
            | Op::SDivOverflow => {
                let width = self.width_of(args[0])?;
                self.overflow(op, args[0], Some(args[1]), width)
            }
            Op::NegOverflow => {
                let width = self.width_of(args[0])?;
                self.overflow(op, args[0], None, width)
            }
            _ if op.indices().is_empty() => self.call(op.name(), args),
            _ => self.app(self.indexed(op.name(), &op.indices()), args),
        };
        if let Some(width) = result.bv_width() {
            if self.bv_numeral_of(term).is_none() {
                self.widths.insert(term, width);
            }
        }
        Ok(term)
    }

    fn is_numeral_literal(&self, term: &SExpr) -> bool {
        self.bv_numeral_of(*term).is_some() || self.int_numeral_of(*term).is_some()
    }

    fn numeral_big(&self, term: &SExpr) -> Option<BigUint> {
        self.bv_numeral_of(*term).map(|(_, value)| value)
    }

    fn int_numeral(&self, term: &SExpr) -> Option<BigInt> {
        self.int_numeral_of(*term)
    }

    fn bool_value(&self, term: &SExpr) -> Option<bool> {
        match self.context.get_atom(*term)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    fn render(&self, term: &SExpr) -> String {
        self.context.display(*term).to_string()
    }
}

impl SolverBackend for EasySmtBackend {
    fn push(&mut self) -> Result<(), SmtBvError> {
        Ok((self.solver_fn.push_fn)(&mut self.context)?)
    }

    fn pop(&mut self) -> Result<(), SmtBvError> {
        Ok((self.solver_fn.pop_fn)(&mut self.context)?)
    }

    fn assert(&mut self, term: &SExpr) -> Result<(), SmtBvError> {
        Ok((self.solver_fn.assert_fn)(&mut self.context, *term)?)
    }

    fn check(&mut self) -> Result<Response, SmtBvError> {
        match (self.solver_fn.check_fn)(&mut self.context)? {
            easy_smt::Response::Sat => Ok(Response::Sat),
            easy_smt::Response::Unsat => Ok(Response::Unsat),
            easy_smt::Response::Unknown => Ok(Response::Unknown),
        }
    }

    fn model_value(&mut self, term: &SExpr, sort: Sort) -> Result<SExpr, SmtBvError> {
        let value = self.context.get_value(vec![*term])?[0].1;
        let literal = match sort {
            Sort::Bool => self.bool_value(&value).is_some(),
            Sort::Int => self.int_numeral_of(value).is_some(),
            Sort::BitVec(_) => self.bv_numeral_of(value).is_some(),
        };
        if !literal {
            return Err(SmtBvError(format!(
                "solver returned a non-literal model value: {}",
                self.context.display(value)
            )));
        }
        Ok(value)
    }
}


#[cfg(all(
    test,
    any(
        feature = "with-bitwuzla-binary-test",
        feature = "with-boolector-binary-test",
        feature = "with-z3-binary-test"
    )
))]
mod solver_tests {
    use num_bigint::BigUint;

    use crate::backend::SolverBackend;
    use crate::{Ast, Context, Narrowed, Response};

    /// Finds an `x` with `x + 1 == 0` at 64 bits and decodes it as -1.
    pub fn test_model_decodes<B: SolverBackend>(ctx: &Context<B>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let x = ctx.bv_const("x", 64).unwrap();
        let one = ctx.bv_from_u64(1, 64).unwrap();
        let zero = ctx.bv_from_u64(0, 64).unwrap();
        ctx.assert(&x.add(&one).unwrap().equals(&zero).unwrap())
            .unwrap();
        assert_eq!(ctx.check().unwrap(), Response::Sat);
        let value = ctx.model_value(&x).unwrap();
        assert!(value.is_literal());
        assert_eq!(value.as_u64(), Narrowed::Value(u64::MAX));
        assert_eq!(value.as_i64(), Narrowed::Value(-1));
    }

    pub fn test_model_signed_minimum<B: SolverBackend>(ctx: &Context<B>) {
        let x = ctx.bv_const("m", 64).unwrap();
        ctx.assert(&x.neg_overflows().unwrap()).unwrap();
        assert_eq!(ctx.check().unwrap(), Response::Sat);
        let value = ctx.model_value(&x).unwrap();
        assert_eq!(value.as_big_unsigned(), Some(BigUint::from(1u64 << 63)));
        assert_eq!(value.as_i64().into_parts(), (i64::MIN, true, true));
    }

    /// The rotate, overflow and to-int encodings agree with the arena
    /// evaluator on a few ground cases.
    pub fn test_expansions<B: SolverBackend>(ctx: &Context<B>) {
        let a = ctx.bv_from_u64(0x81, 8).unwrap();
        let nine = ctx.bv_from_u64(9, 8).unwrap();
        let want = ctx.bv_from_u64(0x03, 8).unwrap();
        let max = ctx.bv_from_u64(0x7F, 8).unwrap();
        let one = ctx.bv_from_u64(1, 8).unwrap();

        ctx.push().unwrap();
        let rotated = a.rotate_left(&nine).unwrap();
        ctx.assert(&rotated.equals(&want).unwrap().not().unwrap())
            .unwrap();
        assert_eq!(ctx.check().unwrap(), Response::Unsat);
        ctx.pop().unwrap();

        ctx.push().unwrap();
        let overflows = max.add_overflows(&one, true).unwrap();
        ctx.assert(&overflows.not().unwrap()).unwrap();
        assert_eq!(ctx.check().unwrap(), Response::Unsat);
        ctx.pop().unwrap();

        assert_eq!(ctx.check().unwrap(), Response::Sat);
        let signed = ctx.model_value(&a.s_to_int().unwrap()).unwrap();
        assert_eq!(signed.as_i64(), Narrowed::Value(-127));
        let unsigned = ctx.model_value(&a.u_to_int().unwrap()).unwrap();
        assert_eq!(unsigned.as_i64(), Narrowed::Value(0x81));
    }

    macro_rules! solver_suite {
        ($mod_ident:ident, $config:expr) => {
            mod $mod_ident {
                use crate::backend::easy_smt_backend::{EasySmtBackend, EasySmtConfig};
                use crate::Context;

                fn context() -> Context<EasySmtBackend> {
                    Context::with_config(&$config).unwrap()
                }

                #[test]
                fn test_model_decodes() {
                    super::test_model_decodes(&context());
                }

                #[test]
                fn test_model_signed_minimum() {
                    super::test_model_signed_minimum(&context());
                }

                #[test]
                fn test_expansions() {
                    super::test_expansions(&context());
                }
            }
        };
    }

    #[cfg(feature = "with-bitwuzla-binary-test")]
    solver_suite!(bitwuzla_tests, EasySmtConfig::bitwuzla());

    #[cfg(feature = "with-boolector-binary-test")]
    solver_suite!(boolector_tests, EasySmtConfig::boolector());

    #[cfg(feature = "with-z3-binary-test")]
    solver_suite!(z3_tests, EasySmtConfig::z3());
}

#[cfg(all(
    test,
    any(
        feature = "with-bitwuzla-binary-test",
        feature = "with-boolector-binary-test",
        feature = "with-z3-binary-test"
    )
))]
use crate::test_backend;

#[cfg(test)]
#[cfg(feature = "with-bitwuzla-binary-test")]
test_backend!(
    bitwuzla_literal_tests,
    crate::Context::<super::EasySmtBackend>::with_config(&super::EasySmtConfig::bitwuzla())
        .unwrap()
);

#[cfg(test)]
#[cfg(feature = "with-boolector-binary-test")]
test_backend!(
    boolector_literal_tests,
    crate::Context::<super::EasySmtBackend>::with_config(&super::EasySmtConfig::boolector())
        .unwrap()
);

#[cfg(test)]
#[cfg(feature = "with-z3-binary-test")]
test_backend!(
    z3_literal_tests,
    crate::Context::<super::EasySmtBackend>::with_config(&super::EasySmtConfig::z3()).unwrap()
);
