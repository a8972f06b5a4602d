//! Concurrent strand execution.
//!
//! Root strands are spawned as tasks. When a strand finishes it releases the
//! dependency counter of every strand waiting on it. Exactly one release takes
//! a counter to zero; that release starts the dependent strand, either by
//! continuing in the current task (when it is the last dependent handled, a
//! "takeover") or by spawning a new task.
//!
//! Every node reports exactly one [`NodeOutcome`] over a channel sized to the
//! node count, so sends never wait.

use crate::strand::{Strand, StrandIndex};
use coa_core::{EvalError, Evaler, InternalError, Scope};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

type StrandFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Result of evaluating one node.
#[derive(Debug)]
pub struct NodeOutcome<N> {
    /// Position of the node in its sequence
    pub index: usize,
    /// Replacement node, or the node's error
    pub result: Result<N, EvalError>,
    /// Wall time spent evaluating
    pub elapsed: Duration,
}

/// Invariant violations observed by scheduler tasks.
pub(crate) type Violations = Arc<Mutex<Vec<InternalError>>>;

/// Handle on a launched set of strands.
///
/// Holds the receiving end only; the channel closes once every strand task
/// has finished.
#[derive(Debug)]
pub struct StrandRun<N> {
    pub(crate) results: mpsc::Receiver<NodeOutcome<N>>,
    pub(crate) violations: Violations,
    pub(crate) expected: usize,
}

impl<N> StrandRun<N> {
    /// Number of outcomes the run will produce.
    pub fn expected(&self) -> usize {
        self.expected
    }
}

struct RunState<N> {
    nodes: Vec<N>,
    strands: Vec<Strand>,
    pending: Vec<AtomicUsize>,
    scope: Arc<Scope>,
    results: mpsc::Sender<NodeOutcome<N>>,
    violations: Violations,
    track_costs: bool,
    trace_strands: bool,
}

/// Start executing `strands` over `nodes` and return the handle to collect from.
///
/// Must be called from within a Tokio runtime.
pub fn launch<N: Evaler>(scope: Arc<Scope>, nodes: Vec<N>, strands: Vec<Strand>) -> StrandRun<N> {
    let expected = nodes.len();
    let (tx, rx) = mpsc::channel(expected.max(1));
    let violations: Violations = Arc::default();
    let config = scope.context().config();

    let state = Arc::new(RunState {
        pending: strands.iter().map(|s| AtomicUsize::new(s.deps.len())).collect(),
        track_costs: config.track_costs,
        trace_strands: config.trace_strands,
        nodes,
        strands,
        scope,
        results: tx,
        violations: Arc::clone(&violations),
    });

    let roots: Vec<StrandIndex> = state
        .strands
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_root())
        .map(|(i, _)| i)
        .collect();
    debug!("launching {} root strand(s) of {}", roots.len(), state.strands.len());
    for root in roots {
        tokio::spawn(Arc::clone(&state).run_strand(root));
    }

    StrandRun { results: rx, violations, expected }
}

impl<N: Evaler> RunState<N> {
    fn run_strand(self: Arc<Self>, first: StrandIndex) -> StrandFuture {
        Box::pin(async move {
            let mut next = Some(first);
            while let Some(current) = next.take() {
                let strand = &self.strands[current];
                let started = Instant::now();
                for &index in &strand.todo {
                    self.run_node(index).await;
                }
                if self.trace_strands {
                    debug!("strand {} finished {} node(s) in {:?}", current, strand.todo.len(), started.elapsed());
                }

                let last = strand.reverse_deps.len().saturating_sub(1);
                for (k, &dependent) in strand.reverse_deps.iter().enumerate() {
                    if !self.release(dependent) {
                        continue;
                    }
                    if k == last {
                        debug!("strand {} takes over strand {}", current, dependent);
                        next = Some(dependent);
                    } else {
                        debug!("strand {} spawns strand {}", current, dependent);
                        tokio::spawn(Arc::clone(&self).run_strand(dependent));
                    }
                }
            }
        })
    }

    async fn run_node(&self, index: usize) {
        let node = &self.nodes[index];
        trace!("evaluating node {} at {}", index, node.pos());
        let started = Instant::now();
        let result = node.evaluate(&self.scope).await;
        let elapsed = started.elapsed();

        if self.track_costs {
            self.scope.context().costs().record(&node.to_string(), elapsed);
        }
        if self.results.send(NodeOutcome { index, result, elapsed }).await.is_err() {
            warn!("result receiver dropped before node {} reported", index);
        }
    }

    /// Decrement a strand's dependency counter; true for the one release that reaches zero.
    fn release(&self, strand: StrandIndex) -> bool {
        match self.pending[strand].fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1)) {
            Ok(previous) => previous == 1,
            Err(_) => {
                tracing::error!("dependency counter of strand {} released below zero", strand);
                self.violations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(InternalError::CounterUnderflow { strand });
                false
            }
        }
    }
}
