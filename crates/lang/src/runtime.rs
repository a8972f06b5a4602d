//! Top-level driver: one [`Runtime::run`] per program.

use crate::expr::Expr;
use coa_core::{EvalConfig, EvalContext, EvalError, InternalError, ResourcePolicy, RunId, Scope, Value};
use coa_execution::evaluate_sequence;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

/// Why a run did not produce an outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    /// The program failed with an ordinary evaluation error
    #[error("evaluation failed: {0}")]
    Failed(EvalError),

    /// The evaluator broke one of its own invariants
    #[error("fatal evaluator error: {0}")]
    Fatal(InternalError),
}

impl RunError {
    /// Whether the run aborted on a broken invariant.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<EvalError> for RunError {
    fn from(err: EvalError) -> Self {
        match fatal_cause(&err) {
            Some(internal) => Self::Fatal(internal),
            None => Self::Failed(err),
        }
    }
}

fn fatal_cause(err: &EvalError) -> Option<InternalError> {
    match err {
        EvalError::Internal(internal) => Some(internal.clone()),
        EvalError::Multiple(m) => m.errors().iter().find_map(fatal_cause),
        _ => None,
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Identifier of the run
    pub run_id: RunId,
    /// Value of the last top-level expression
    pub value: Value,
    /// Bindings left in the root scope
    pub bindings: HashMap<String, Value>,
    /// Lines written by `@print` and `@emit`, in order
    pub output: Vec<String>,
    /// Distinct node texts with recorded timings
    pub cost_entries: usize,
}

/// Evaluates programs with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    config: EvalConfig,
    policy: Option<ResourcePolicy>,
}

impl Runtime {
    /// Create a new runtime.
    pub fn new(config: EvalConfig) -> Self {
        Self { config, policy: None }
    }

    /// Restrict the resources programs may use.
    pub fn with_resource_policy(mut self, policy: ResourcePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Create a runtime configured from `COA_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(EvalConfig::from_env())
    }

    /// The configuration each run starts from.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate a program as one top-level sequence.
    ///
    /// Each run gets its own context: a fresh resource registry, cost cache
    /// and output transcript.
    pub async fn run(&self, program: Vec<Expr>) -> Result<Outcome, RunError> {
        let context = Arc::new(EvalContext::new(self.config.clone()));
        let run_id = context.run_id();
        let span = info_span!("run", run_id = %run_id);

        async move {
            let started = Instant::now();
            info!("evaluating {} top-level expression(s)", program.len());
            let root = Scope::root(Arc::clone(&context));
            let scope = match &self.policy {
                Some(policy) => root.guarded(policy.clone()),
                None => root,
            };

            let evaluated = match evaluate_sequence(&scope, program, true).await {
                Ok(evaluated) => evaluated,
                Err(err) => {
                    let err = RunError::from(err);
                    if err.is_fatal() {
                        error!("run aborted: {}", err);
                    } else {
                        info!("run failed after {:?}: {}", started.elapsed(), err);
                    }
                    return Err(err);
                }
            };

            info!("run finished in {:?}", started.elapsed());
            Ok(Outcome {
                run_id,
                value: evaluated.last().and_then(Expr::value).cloned().unwrap_or_default(),
                bindings: scope.own_bindings(),
                output: context.output(),
                cost_entries: context.costs().len(),
            })
        }
        .instrument(span)
        .await
    }
}
