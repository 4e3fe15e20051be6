// SPDX-License-Identifier: Apache-2.0

//! Typed bit-vector expressions over SMT engines, with exact decoding of
//! bit-vector literals into host integers.
//!
//! ```
//! use smt_bv::{Ast, Context, Narrowed};
//!
//! let ctx = Context::new();
//! let byte = ctx.bv_from_u64(200, 8).unwrap();
//! assert_eq!(byte.as_u64(), Narrowed::Value(200));
//! assert_eq!(byte.as_i64(), Narrowed::Value(-56));
//!
//! let x = ctx.bv_const("x", 16).unwrap();
//! assert_eq!(x.extract(7, 0).unwrap().width(), 8);
//! assert_eq!(x.as_i64(), Narrowed::NotLiteral);
//!
//! let folded = byte.add(&byte).unwrap().simplify().unwrap();
//! assert_eq!(folded.as_u64(), Narrowed::Value(144));
//! ```

pub mod backend;
mod context;
mod expr;
pub mod literal;
mod op;
mod smt_bv_error;
mod sort;

pub use backend::arena::{ArenaBackend, ArenaConfig, TermId};
#[cfg(feature = "has-easy-smt")]
pub use backend::easy_smt_backend::{EasySmtBackend, EasySmtConfig, SolverFn};
pub use backend::{Backend, Response, SolverBackend};
pub use context::Context;
pub use expr::{Ast, Bool, Expr, Int, BV};
pub use literal::Narrowed;
pub use op::Op;
pub use smt_bv_error::SmtBvError;
pub use sort::{BvSort, Sort, SortKind};
