//! Dataflow dependency analysis for a sequence of sibling nodes.
//!
//! Walks the nodes in order keeping, per name, its last writer (an earlier
//! node, or the enclosing scope) and the nodes that read the current value.
//! A node depends on:
//!
//! - the last writer of every name it reads (read after write);
//! - the previous writer of every name it writes (write after write);
//! - every reader of the previous value of a name it writes (write after read).
//!
//! Writers from the enclosing scope are already satisfied and produce no edge.

use coa_core::{tracked, Evaler, InternalError, NameSet};
use std::collections::{BTreeSet, HashMap};

/// Who produced the value a name currently refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Writer {
    /// Visible from an enclosing scope before the sequence started
    Outer,
    /// Written by the node at this index
    Node(usize),
}

#[derive(Debug)]
struct NameState {
    writer: Writer,
    readers: Vec<usize>,
}

/// Per-node dependency sets: `of(i)` holds the indices of earlier nodes that
/// node `i` must wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
    deps: Vec<BTreeSet<usize>>,
}

impl Dependencies {
    /// Number of analyzed nodes.
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// Whether the analyzed sequence was empty.
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Dependencies of node `index`.
    pub fn of(&self, index: usize) -> &BTreeSet<usize> {
        &self.deps[index]
    }

    /// Iterate over `(index, dependencies)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> {
        self.deps.iter().enumerate()
    }
}

/// Computes the dependency sets of a sequence.
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Analyze `nodes` given the names already visible from outer scopes.
    ///
    /// A read of a name with no tracked writer is an invariant violation: the
    /// undefined-name check must have rejected it earlier.
    pub fn analyze<N: Evaler>(
        &self,
        outer: &NameSet,
        nodes: &[N],
    ) -> Result<Dependencies, InternalError> {
        let mut names: HashMap<&str, NameState> = tracked(outer)
            .map(|name| (name, NameState { writer: Writer::Outer, readers: Vec::new() }))
            .collect();
        let mut deps = vec![BTreeSet::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            // Reads first: a node that reads and writes a name sees the previous writer.
            for name in tracked(node.used_names()) {
                let Some(state) = names.get_mut(name) else {
                    tracing::error!("node {} at {} uses untracked name `{}`", i, node.pos(), name);
                    return Err(InternalError::UntrackedName { name: name.to_string(), index: i });
                };
                if let Writer::Node(w) = state.writer {
                    deps[i].insert(w);
                }
                if state.readers.last() != Some(&i) {
                    state.readers.push(i);
                }
            }

            for name in tracked(node.written_names()) {
                let state = names
                    .entry(name)
                    .or_insert(NameState { writer: Writer::Outer, readers: Vec::new() });
                if let Writer::Node(w) = state.writer {
                    if w != i {
                        deps[i].insert(w);
                    }
                }
                deps[i].extend(state.readers.iter().copied().filter(|&r| r != i));
                state.writer = Writer::Node(i);
                state.readers.clear();
            }
        }

        Ok(Dependencies { deps })
    }
}

impl Default for DependencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
