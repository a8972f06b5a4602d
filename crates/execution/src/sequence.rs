//! Sequence evaluation: the entry point nodes use for their children.

use crate::collector::collect;
use crate::dependency::DependencyAnalyzer;
use crate::gate::{decide, Verdict};
use crate::scheduler::launch;
use crate::strand::{partition, Strand};
use crate::check::check_defined;
use coa_core::{Evaler, Result, Scope};
use std::sync::Arc;
use tracing::debug;

/// Evaluate `nodes` in `scope`, concurrently when the sequence qualifies.
///
/// `allow_parallel` is the caller's own flag; it is combined with the run's
/// configuration before the gate is consulted. Returns the replacement nodes
/// in their original order.
pub async fn evaluate_sequence<N: Evaler>(scope: &Arc<Scope>, nodes: Vec<N>, allow_parallel: bool) -> Result<Vec<N>> {
    let visible = scope.visible_names();
    check_defined(&visible, &nodes)?;

    let allow = allow_parallel && scope.context().config().allow_parallel;
    match decide(allow, &nodes) {
        Verdict::Sequential(reason) => {
            debug!("evaluating {} node(s) sequentially: {}", nodes.len(), reason);
            evaluate_series(scope, &nodes).await
        }
        Verdict::Parallel => {
            let deps = DependencyAnalyzer::new().analyze(&visible, &nodes)?;
            let strands = partition(&deps)?;
            if strands.len() == 1 {
                debug!("single strand of {} node(s), evaluating inline", nodes.len());
                return evaluate_series(scope, &nodes).await;
            }
            if scope.context().config().trace_strands {
                dump_strands(scope, &nodes, &strands);
            }
            debug!("evaluating {} node(s) over {} strands", nodes.len(), strands.len());
            collect(launch(Arc::clone(scope), nodes, strands)).await
        }
    }
}

/// Evaluate left to right, stopping at the first failure.
async fn evaluate_series<N: Evaler>(scope: &Arc<Scope>, nodes: &[N]) -> Result<Vec<N>> {
    let mut evaluated = Vec::with_capacity(nodes.len());
    for node in nodes {
        evaluated.push(node.evaluate(scope).await?);
    }
    Ok(evaluated)
}

fn dump_strands<N: Evaler>(scope: &Scope, nodes: &[N], strands: &[Strand]) {
    let costs = scope.context().costs();
    for (i, strand) in strands.iter().enumerate() {
        let cost: u64 = strand
            .todo
            .iter()
            .map(|&n| costs.estimate(&nodes[n].to_string(), nodes[n].declared_resources()))
            .sum();
        debug!(
            "strand {}: todo={:?} deps={:?} reverse_deps={:?} cost={}",
            i, strand.todo, strand.deps, strand.reverse_deps, cost
        );
    }
}
