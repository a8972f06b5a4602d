//! Test doubles for the scheduler.

use async_trait::async_trait;
use coa_core::{name_set, EvalConfig, EvalContext, EvalError, Evaler, NameSet, Pos, ResourceDef, Result, Scope, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Root scope over a fresh context.
pub fn root_scope(config: EvalConfig) -> Arc<Scope> {
    Scope::root(Arc::new(EvalContext::new(config)))
}

/// Records which probes were evaluated, in completion order.
#[derive(Debug, Default)]
pub struct ProbeLog {
    evaluated: Mutex<Vec<String>>,
}

impl ProbeLog {
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.evaluated.lock().unwrap().iter().filter(|l| *l == label).count()
    }

    pub fn total(&self) -> usize {
        self.evaluated.lock().unwrap().len()
    }

    pub fn order(&self) -> Vec<String> {
        self.evaluated.lock().unwrap().clone()
    }
}

/// A node with scripted capabilities.
///
/// Evaluating a probe sums the numbers bound to the names it reads plus its
/// own value, and binds that sum to every name it writes.
#[derive(Debug, Clone)]
pub struct Probe {
    label: String,
    used: NameSet,
    written: NameSet,
    reassigned: NameSet,
    resources: Vec<ResourceDef>,
    value: f64,
    fail: bool,
    delay: Option<Duration>,
    pos: Pos,
    result: Option<f64>,
    log: Arc<ProbeLog>,
}

impl Probe {
    pub fn new(label: impl Into<String>, log: &Arc<ProbeLog>) -> Self {
        Self {
            label: label.into(),
            used: NameSet::new(),
            written: NameSet::new(),
            reassigned: NameSet::new(),
            resources: Vec::new(),
            value: 0.0,
            fail: false,
            delay: None,
            pos: Pos::default(),
            result: None,
            log: Arc::clone(log),
        }
    }

    pub fn reads<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.used.extend(name_set(names));
        self
    }

    pub fn writes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.written.extend(name_set(names));
        self
    }

    pub fn reassigns<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.reassigned.extend(name_set(names));
        self
    }

    pub fn effect(mut self, resource: ResourceDef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn sleeping(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.pos = Pos::new(line, column);
        self
    }

    /// The sum computed by evaluation, if this is an evaluated replacement.
    pub fn result(&self) -> Option<f64> {
        self.result
    }
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

#[async_trait]
impl Evaler for Probe {
    fn used_names(&self) -> &NameSet {
        &self.used
    }

    fn written_names(&self) -> &NameSet {
        &self.written
    }

    fn reassigned_names(&self) -> &NameSet {
        &self.reassigned
    }

    fn declared_resources(&self) -> &[ResourceDef] {
        &self.resources
    }

    fn pos(&self) -> Pos {
        self.pos
    }

    async fn evaluate(&self, scope: &Arc<Scope>) -> Result<Self> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.evaluated.lock().unwrap().push(self.label.clone());
        if self.fail {
            return Err(EvalError::Raised { message: format!("{} failed", self.label), pos: self.pos });
        }

        let mut sum = self.value;
        for name in coa_core::tracked(&self.used) {
            sum += scope.get(name).and_then(|v| v.as_number()).unwrap_or_default();
        }
        for name in &self.written {
            if self.reassigned.contains(name) {
                scope.modify(name, Value::Number(sum));
            } else {
                scope.define(name.clone(), Value::Number(sum));
            }
        }

        let mut evaluated = self.clone();
        evaluated.result = Some(sum);
        Ok(evaluated)
    }
}
