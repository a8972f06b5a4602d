//! A small expression language evaluated on top of the parallel sequence
//! evaluator.
//!
//! Programs are built directly as [`Expr`] trees and run with a [`Runtime`]:
//!
//! ```no_run
//! # async fn demo() -> Result<(), coa_lang::RunError> {
//! use coa_lang::{Builtin, Expr, Runtime};
//!
//! let program = vec![
//!     Expr::def("a", Expr::literal(1.0)),
//!     Expr::def("b", Expr::literal(2.0)),
//!     Expr::call(Builtin::Add, vec![Expr::ident("a"), Expr::ident("b")]),
//! ];
//! let outcome = Runtime::default().run(program).await?;
//! assert_eq!(outcome.value.as_number(), Some(3.0));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod builtin;
pub mod expr;
pub mod runtime;
pub mod telemetry;

pub use builtin::Builtin;
pub use expr::{Expr, ExprKind};
pub use runtime::{Outcome, RunError, Runtime};
pub use telemetry::init_tracing;
