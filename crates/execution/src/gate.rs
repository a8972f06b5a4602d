//! Purity/parallelism gate.
//!
//! Decided once per sequence evaluation, before any analysis. The gate is
//! deliberately coarse: one effectful node sends the whole sequence down the
//! sequential path.

use coa_core::{tracked, Evaler, NameSet, ResourceDef};

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Analyze and schedule concurrently
    Parallel,
    /// Evaluate strictly left to right
    Sequential(SequentialReason),
}

/// Why a sequence is evaluated sequentially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequentialReason {
    /// Parallel evaluation is switched off for this context
    Disabled,
    /// Zero or one node
    TooFew,
    /// A node declares effectful resources
    Effectful {
        /// Index of the node
        index: usize,
        /// Resources it declares
        resources: Vec<ResourceDef>,
    },
    /// A node reassigns a name owned by an enclosing scope
    OuterReassignment {
        /// Index of the node
        index: usize,
        /// Reassigned name
        name: String,
    },
}

impl std::fmt::Display for SequentialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("parallel evaluation disabled"),
            Self::TooFew => f.write_str("single node"),
            Self::Effectful { index, resources } => {
                let names: Vec<String> = resources.iter().map(ToString::to_string).collect();
                write!(f, "node {} uses {}", index, names.join(", "))
            }
            Self::OuterReassignment { index, name } => {
                write!(f, "node {} reassigns outer `{}`", index, name)
            }
        }
    }
}

/// Decide how a sequence is evaluated.
pub fn decide<N: Evaler>(allow_parallel: bool, nodes: &[N]) -> Verdict {
    if !allow_parallel {
        return Verdict::Sequential(SequentialReason::Disabled);
    }
    if nodes.len() <= 1 {
        return Verdict::Sequential(SequentialReason::TooFew);
    }

    let mut local = NameSet::new();
    for (index, node) in nodes.iter().enumerate() {
        if !node.is_pure() {
            let resources = node.declared_resources().to_vec();
            return Verdict::Sequential(SequentialReason::Effectful { index, resources });
        }
        // Writes to a name already written in this sequence are ordered by the
        // analyzer, and the escaping part is reported to the enclosing sequence.
        if let Some(name) = tracked(node.reassigned_names()).find(|n| !local.contains(*n)) {
            return Verdict::Sequential(SequentialReason::OuterReassignment { index, name: name.to_string() });
        }
        local.extend(tracked(node.written_names()).map(str::to_string));
    }
    Verdict::Parallel
}
