//! Undefined-name check run before dependency analysis.
//!
//! The analyzer treats an untracked name as a broken invariant. User programs
//! that read a name nobody defined are rejected here first, with an ordinary
//! recoverable error.

use coa_core::{tracked, EvalError, Evaler, NameSet, Result};

/// Check that every name read by `nodes` is visible from outer scopes or
/// written by an earlier node of the sequence.
///
/// A node's own writes do not satisfy its own reads.
pub fn check_defined<N: Evaler>(visible: &NameSet, nodes: &[N]) -> Result<()> {
    let mut defined: NameSet = visible.clone();
    for node in nodes {
        let missing: Vec<String> = tracked(node.used_names())
            .filter(|name| !defined.contains(*name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(EvalError::Undefined { names: missing, pos: node.pos() });
        }
        defined.extend(tracked(node.written_names()).map(str::to_string));
    }
    Ok(())
}
