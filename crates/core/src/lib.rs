//! Core model of the coa evaluator.
//!
//! This crate defines what the parallel scheduler needs from its
//! surroundings: the node capability model, the scope chain, the per-resource
//! lock table, the error taxonomy and the per-run evaluation context.

#![warn(missing_docs)]

// Identity and configuration
mod id;
mod config;
mod context;

// Evaluation model
mod pos;
mod names;
mod value;
mod error;
mod node;
mod scope;

// Resources and diagnostics
mod resource;
mod cost;

// Re-exports
pub use id::RunId;
pub use config::EvalConfig;
pub use context::EvalContext;

pub use pos::Pos;
pub use names::{is_argument, is_builtin, is_tracked, name_set, tracked, NameSet};
pub use value::Value;
pub use error::{EvalError, InternalError, MultipleErrors, Result};
pub use node::{Capabilities, Evaler};
pub use scope::Scope;

pub use resource::{Resource, ResourceDef, ResourceGuard, ResourcePolicy, ResourceRegistry};
pub use cost::{resource_cost, CostCache, CostEntry};
