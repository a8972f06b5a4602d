//! Execution layer: dependency analysis, strand partitioning and concurrent
//! evaluation of node sequences.
//!
//! ```text
//! check_defined → gate → analyze → partition → launch → collect
//! ```

#![warn(missing_docs)]

pub mod check;
pub mod collector;
pub mod dependency;
pub mod gate;
pub mod scheduler;
pub mod sequence;
pub mod strand;

#[cfg(test)]
mod testing;

pub use check::check_defined;
pub use collector::collect;
pub use dependency::{Dependencies, DependencyAnalyzer};
pub use gate::{decide, SequentialReason, Verdict};
pub use scheduler::{launch, NodeOutcome, StrandRun};
pub use sequence::evaluate_sequence;
pub use strand::{partition, validate, Strand, StrandIndex};
