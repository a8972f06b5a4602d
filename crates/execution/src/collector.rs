//! Result collection for a launched strand run.

use crate::scheduler::{NodeOutcome, StrandRun};
use coa_core::{EvalError, Evaler, InternalError, Result};
use std::sync::PoisonError;
use tracing::{debug, error};

/// Wait for every node of `run` and assemble the replacement sequence.
///
/// All outcomes are drained before anything is reported, so a failing node
/// never leaves other strands writing into a scope the caller has moved on
/// from. Once the expected count is reached the channel is drained until it
/// closes, which happens when the last strand task exits.
///
/// Precedence: scheduler invariant violations, then fatal node errors, then
/// ordinary node errors aggregated in node order.
pub async fn collect<N: Evaler>(mut run: StrandRun<N>) -> Result<Vec<N>> {
    let expected = run.expected;
    let mut slots: Vec<Option<N>> = std::iter::repeat_with(|| None).take(expected).collect();
    let mut failures: Vec<(usize, EvalError)> = Vec::new();
    let mut received = 0;

    while let Some(NodeOutcome { index, result, elapsed }) = run.results.recv().await {
        received += 1;
        let Some(slot) = slots.get_mut(index) else {
            error!("outcome for node {} outside a {}-node sequence", index, expected);
            run.violations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(InternalError::UnknownNode { index, expected });
            continue;
        };
        match result {
            Ok(node) => {
                debug!("node {} done in {:?}", index, elapsed);
                *slot = Some(node);
            }
            Err(err) => {
                debug!("node {} failed in {:?}: {}", index, elapsed, err);
                failures.push((index, err));
            }
        }
    }

    let violations = std::mem::take(&mut *run.violations.lock().unwrap_or_else(PoisonError::into_inner));
    if let Some(violation) = violations.into_iter().next() {
        error!("scheduler invariant violated: {}", violation);
        return Err(violation.into());
    }
    if received != expected {
        error!("received {} of {} node results", received, expected);
        return Err(InternalError::ResultsLost { received, expected }.into());
    }

    failures.sort_by_key(|(index, _)| *index);
    if let Some(pos) = failures.iter().position(|(_, e)| e.is_fatal()) {
        return Err(failures.swap_remove(pos).1);
    }
    if let Some(err) = EvalError::aggregate(failures.into_iter().map(|(_, e)| e).collect()) {
        return Err(err);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or_else(|| InternalError::ResultsLost { received: index, expected }.into()))
        .collect()
}
