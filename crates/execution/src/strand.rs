//! Partitioning of a dependency graph into strands.
//!
//! A strand is a chain of node indices evaluated in order by one task. A
//! strand starts once every strand in its `deps` has finished; strands with
//! no `deps` are roots and start immediately.

use crate::dependency::Dependencies;
use coa_core::InternalError;
use std::collections::BTreeSet;

/// Index of a strand within a partition.
pub type StrandIndex = usize;

/// A sequential chain of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Strand {
    /// Node indices, evaluated in this order
    pub todo: Vec<usize>,
    /// Strands that must finish before this one starts
    pub deps: Vec<StrandIndex>,
    /// Strands waiting on this one
    pub reverse_deps: Vec<StrandIndex>,
}

impl Strand {
    fn start(node: usize) -> Self {
        Self { todo: vec![node], ..Default::default() }
    }

    /// Whether this strand can start immediately.
    pub fn is_root(&self) -> bool {
        self.deps.is_empty()
    }
}

/// Group nodes into strands.
///
/// Single left-to-right pass:
///
/// - no dependency: the node starts a new root strand;
/// - one dependency: the node is appended to the strand owning it;
/// - several dependencies: the owning strands are collected; if they collapse
///   to a single strand the node is appended to it, otherwise it starts a new
///   strand waiting on all of them.
///
/// Reverse dependencies are linked once every strand exists, and the result is
/// checked so that each node is owned by exactly one strand.
pub fn partition(deps: &Dependencies) -> Result<Vec<Strand>, InternalError> {
    let mut strands: Vec<Strand> = Vec::new();
    let mut owner: Vec<Option<StrandIndex>> = vec![None; deps.len()];

    for (i, node_deps) in deps.iter() {
        let owning: BTreeSet<StrandIndex> = node_deps
            .iter()
            .map(|&d| {
                owner
                    .get(d)
                    .copied()
                    .flatten()
                    .ok_or(InternalError::UnknownDependency { index: i, dependency: d })
            })
            .collect::<Result<_, _>>()?;

        let mut owning = owning.into_iter();
        let strand = match (owning.next(), owning.len()) {
            (None, _) => {
                strands.push(Strand::start(i));
                strands.len() - 1
            }
            (Some(only), 0) => {
                strands[only].todo.push(i);
                only
            }
            (Some(first), _) => {
                let mut join = Strand::start(i);
                join.deps.push(first);
                join.deps.extend(owning);
                strands.push(join);
                strands.len() - 1
            }
        };
        owner[i] = Some(strand);
    }

    link_reverse_deps(&mut strands);
    validate(deps.len(), &strands)?;
    Ok(strands)
}

/// Fill `reverse_deps` from the final `deps` snapshot.
fn link_reverse_deps(strands: &mut [Strand]) {
    for s in strands.iter_mut() {
        s.reverse_deps.clear();
    }
    for i in 0..strands.len() {
        for d in strands[i].deps.clone() {
            strands[d].reverse_deps.push(i);
        }
    }
}

/// Every node index in `0..n` must be owned by exactly one strand.
pub fn validate(n: usize, strands: &[Strand]) -> Result<(), InternalError> {
    let mut seen = vec![0usize; n];
    let mut duplicated = Vec::new();
    for &i in strands.iter().flat_map(|s| s.todo.iter()) {
        match seen.get_mut(i) {
            Some(count) => {
                *count += 1;
                if *count == 2 {
                    duplicated.push(i);
                }
            }
            None => duplicated.push(i),
        }
    }
    let unassigned: Vec<usize> = (0..n).filter(|&i| seen[i] == 0).collect();

    if unassigned.is_empty() && duplicated.is_empty() {
        Ok(())
    } else {
        tracing::error!("strand partition check failed: unassigned {:?}, duplicated {:?}", unassigned, duplicated);
        Err(InternalError::StrandPartition { unassigned, duplicated })
    }
}
