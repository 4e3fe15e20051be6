// SPDX-License-Identifier: Apache-2.0

//! In-process engine: a hash-consed term arena with a ground-term folder.
//!
//! Structurally equal terms share one `TermId`, so equality of handles is
//! equality of terms. The arena builds and rewrites terms but does not decide
//! satisfiability.

use std::collections::HashMap;
use std::fmt::Write;

use num_bigint::{BigInt, BigUint};
use num_traits::Signed;

use crate::backend::eval::{self, Value};
use crate::backend::symbol::{check_symbol, quote_symbol};
use crate::backend::Backend;
use crate::op::Op;
use crate::smt_bv_error::SmtBvError;
use crate::sort::{BvSort, Sort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Var(String),
    BvNumeral(BigUint),
    BoolLiteral(bool),
    IntNumeral(BigInt),
    App { op: Op, args: Vec<TermId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Entry {
    node: Node,
    sort: Sort,
}

#[derive(Debug, Clone, Default)]
pub struct ArenaConfig {
    /// Fold applications whose operands are all literals as they are built,
    /// instead of only on `simplify`.
    pub fold_constants: bool,
}

#[derive(Debug, Default)]
pub struct ArenaBackend {
    config: ArenaConfig,
    entries: Vec<Entry>,
    interned: HashMap<Entry, TermId>,
    vars: HashMap<String, Sort>,
}

impl ArenaBackend {
    pub fn with_config(config: ArenaConfig) -> Self {
        ArenaBackend {
            config,
            ..Default::default()
        }
    }

    /// Number of distinct terms built so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: TermId) -> &Entry {
        &self.entries[id.0 as usize]
    }

    fn intern(&mut self, node: Node, sort: Sort) -> Result<TermId, SmtBvError> {
        let entry = Entry { node, sort };
        if let Some(id) = self.interned.get(&entry) {
            return Ok(*id);
        }
        let index = u32::try_from(self.entries.len())
            .map_err(|_| SmtBvError("term arena is full".to_string()))?;
        let id = TermId(index);
        self.entries.push(entry.clone());
        self.interned.insert(entry, id);
        Ok(id)
    }

    fn value_of(&self, id: TermId) -> Option<Value> {
        let entry = self.entry(id);
        match &entry.node {
            Node::BvNumeral(value) => Some(Value::Bv {
                width: entry.sort.bv_width()?,
                value: value.clone(),
            }),
            Node::BoolLiteral(b) => Some(Value::Bool(*b)),
            Node::IntNumeral(i) => Some(Value::Int(i.clone())),
            Node::Var(_) | Node::App { .. } => None,
        }
    }

    fn literal_of(&mut self, value: Value) -> Result<TermId, SmtBvError> {
        match value {
            Value::Bv { width, value } => {
                let sort = Sort::BitVec(BvSort::new(width)?);
                self.intern(Node::BvNumeral(value), sort)
            }
            Value::Bool(b) => self.intern(Node::BoolLiteral(b), Sort::Bool),
            Value::Int(i) => self.intern(Node::IntNumeral(i), Sort::Int),
        }
    }

    /// Builds `op(args)`, folding to a literal when every operand is one, and
    /// short-circuiting an `ite` whose condition is known.
    fn fold(&mut self, op: Op, args: Vec<TermId>, sort: Sort) -> Result<TermId, SmtBvError> {
        let values: Option<Vec<Value>> = args.iter().map(|a| self.value_of(*a)).collect();
        if let Some(values) = values {
            let folded = eval::apply(op, &values)?;
            return self.literal_of(folded);
        }
        if op == Op::Ite {
            if let Some(Value::Bool(cond)) = self.value_of(args[0]) {
                return Ok(if cond { args[1] } else { args[2] });
            }
        }
        self.intern(Node::App { op, args }, sort)
    }

    /// Writes `id` as SMT-LIB text. Uses an explicit stack so that deeply
    /// nested terms do not overflow the native stack.
    fn render_into(&self, id: TermId, out: &mut String) {
        enum Step {
            Visit(TermId),
            Space,
            Close,
        }
        let mut stack = vec![Step::Visit(id)];
        while let Some(step) = stack.pop() {
            let id = match step {
                Step::Visit(id) => id,
                Step::Space => {
                    out.push(' ');
                    continue;
                }
                Step::Close => {
                    out.push(')');
                    continue;
                }
            };
            let entry = self.entry(id);
            match &entry.node {
                Node::Var(name) => out.push_str(&quote_symbol(name)),
                Node::BvNumeral(value) => {
                    let width = entry.sort.bv_width().unwrap_or(1);
                    out.push_str(&bv_literal_text(width, value));
                }
                Node::BoolLiteral(b) => out.push_str(if *b { "true" } else { "false" }),
                Node::IntNumeral(i) => {
                    if i.is_negative() {
                        let _ = write!(out, "(- {})", i.abs());
                    } else {
                        let _ = write!(out, "{}", i);
                    }
                }
                Node::App { op, args } => {
                    let _ = write!(out, "({}", op);
                    stack.push(Step::Close);
                    for arg in args.iter().rev() {
                        stack.push(Step::Visit(*arg));
                        stack.push(Step::Space);
                    }
                }
            }
        }
    }
}

/// SMT-LIB text of a `width`-bit numeral: hexadecimal when the width is a
/// multiple of four, binary otherwise.
pub(crate) fn bv_literal_text(width: u32, value: &BigUint) -> String {
    let width = width as usize;
    if width % 4 == 0 {
        format!("#x{:0>digits$}", value.to_str_radix(16), digits = width / 4)
    } else {
        format!("#b{:0>width$}", value.to_str_radix(2), width = width)
    }
}

impl Backend for ArenaBackend {
    type Term = TermId;
    type Config = ArenaConfig;

    const NAME: &'static str = "arena";

    fn new(config: &ArenaConfig) -> Result<Self, SmtBvError> {
        Ok(ArenaBackend::with_config(config.clone()))
    }

    fn declare(&mut self, name: &str, sort: Sort) -> Result<TermId, SmtBvError> {
        check_symbol(name)?;
        match self.vars.get(name) {
            Some(existing) if *existing != sort => {
                return Err(SmtBvError(format!(
                    "{} is already declared with sort {}, not {}",
                    name, existing, sort
                )));
            }
            Some(_) => {}
            None => {
                log::debug!("arena: declaring {} : {}", name, sort);
                self.vars.insert(name.to_string(), sort);
            }
        }
        self.intern(Node::Var(name.to_string()), sort)
    }

    fn bv_numeral(&mut self, sort: BvSort, value: &BigUint) -> Result<TermId, SmtBvError> {
        if value.bits() > u64::from(sort.width()) {
            return Err(SmtBvError(format!(
                "numeral {} does not fit in {} bits",
                value,
                sort.width()
            )));
        }
        self.intern(Node::BvNumeral(value.clone()), Sort::BitVec(sort))
    }

    fn bool_literal(&mut self, value: bool) -> Result<TermId, SmtBvError> {
        self.intern(Node::BoolLiteral(value), Sort::Bool)
    }

    fn apply(&mut self, op: Op, args: &[TermId], result: Sort) -> Result<TermId, SmtBvError> {
        if self.config.fold_constants {
            return self.fold(op, args.to_vec(), result);
        }
        self.intern(
            Node::App {
                op,
                args: args.to_vec(),
            },
            result,
        )
    }

    fn is_numeral_literal(&self, term: &TermId) -> bool {
        matches!(
            self.entry(*term).node,
            Node::BvNumeral(_) | Node::IntNumeral(_)
        )
    }

    fn numeral_big(&self, term: &TermId) -> Option<BigUint> {
        match &self.entry(*term).node {
            Node::BvNumeral(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn int_numeral(&self, term: &TermId) -> Option<BigInt> {
        match &self.entry(*term).node {
            Node::IntNumeral(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn bool_value(&self, term: &TermId) -> Option<bool> {
        match self.entry(*term).node {
            Node::BoolLiteral(b) => Some(b),
            _ => None,
        }
    }

    /// Folds every ground sub-term bottom-up. Uses an explicit stack so deep
    /// terms do not exhaust the call stack.
    fn simplify(&mut self, term: &TermId, _sort: Sort) -> Result<TermId, SmtBvError> {
        let mut memo: HashMap<TermId, TermId> = HashMap::new();
        let mut stack: Vec<(TermId, bool)> = vec![(*term, false)];
        while let Some((id, children_done)) = stack.pop() {
            if memo.contains_key(&id) {
                continue;
            }
            let entry = self.entry(id).clone();
            let (op, args) = match entry.node {
                Node::App { op, args } => (op, args),
                _ => {
                    memo.insert(id, id);
                    continue;
                }
            };
            if !children_done {
                stack.push((id, true));
                for arg in args.iter().rev() {
                    if !memo.contains_key(arg) {
                        stack.push((*arg, false));
                    }
                }
                continue;
            }
            let new_args: Vec<TermId> = args.iter().map(|a| memo[a]).collect();
            let simplified = self.fold(op, new_args, entry.sort)?;
            memo.insert(id, simplified);
        }
        Ok(memo[term])
    }

    fn render(&self, term: &TermId) -> String {
        let mut out = String::new();
        self.render_into(*term, &mut out);
        out
    }
}


#[cfg(test)]
use crate::test_backend;

#[cfg(test)]
test_backend!(arena_tests, crate::Context::new());

#[cfg(test)]
test_backend!(
    arena_folding_tests,
    crate::Context::<super::ArenaBackend>::with_config(&super::ArenaConfig {
        fold_constants: true
    })
    .unwrap()
);
