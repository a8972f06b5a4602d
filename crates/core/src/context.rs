//! Per-run evaluation context.

use crate::{CostCache, EvalConfig, ResourceRegistry, RunId};
use std::sync::{Mutex, PoisonError};

/// State shared by every scope of one top-level run.
///
/// Created when a run starts and dropped when it ends; nothing in here is
/// process-global.
#[derive(Debug)]
pub struct EvalContext {
    run_id: RunId,
    config: EvalConfig,
    resources: ResourceRegistry,
    costs: CostCache,
    output: Mutex<Vec<String>>,
}

impl EvalContext {
    /// Create a context for a new run.
    pub fn new(config: EvalConfig) -> Self {
        Self {
            run_id: RunId::new(),
            config,
            resources: ResourceRegistry::new(),
            costs: CostCache::new(),
            output: Mutex::new(Vec::new()),
        }
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Run configuration.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Lock table for effectful resources.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Diagnostic cost cache.
    pub fn costs(&self) -> &CostCache {
        &self.costs
    }

    /// Append a line to the program's output transcript.
    pub fn emit(&self, line: impl Into<String>) {
        let line = line.into();
        if self.config.echo_output {
            println!("{}", line);
        }
        self.output.lock().unwrap_or_else(PoisonError::into_inner).push(line);
    }

    /// Copy of the output transcript so far.
    pub fn output(&self) -> Vec<String> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}
