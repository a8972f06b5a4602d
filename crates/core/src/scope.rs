//! Scope chain for variable bindings.
//!
//! Scopes are shared across the tasks evaluating one sequence, so bindings
//! sit behind a read-write lock that is never held across an await.

use crate::{EvalContext, NameSet, Resource, ResourceGuard, ResourcePolicy, Value, names};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One level of the scope chain.
#[derive(Debug)]
pub struct Scope {
    bindings: RwLock<HashMap<String, Value>>,
    outer: Option<Arc<Scope>>,
    policy: Option<ResourcePolicy>,
    context: Arc<EvalContext>,
}

impl Scope {
    /// Create the root scope of a run.
    pub fn root(context: Arc<EvalContext>) -> Arc<Self> {
        Arc::new(Self {
            bindings: RwLock::new(HashMap::new()),
            outer: None,
            policy: None,
            context,
        })
    }

    /// Create a child scope whose lookups fall back to `self`.
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            bindings: RwLock::new(HashMap::new()),
            outer: Some(Arc::clone(self)),
            policy: None,
            context: Arc::clone(&self.context),
        })
    }

    /// Create a child scope restricted to the resources `policy` allows.
    pub fn guarded(self: &Arc<Self>, policy: ResourcePolicy) -> Arc<Self> {
        Arc::new(Self {
            bindings: RwLock::new(HashMap::new()),
            outer: Some(Arc::clone(self)),
            policy: Some(policy),
            context: Arc::clone(&self.context),
        })
    }

    /// The run this scope belongs to.
    pub fn context(&self) -> &Arc<EvalContext> {
        &self.context
    }

    /// Enclosing scope, if any.
    pub fn outer(&self) -> Option<&Arc<Scope>> {
        self.outer.as_ref()
    }

    /// Bind a name in this scope, shadowing outer bindings.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value);
    }

    /// Reassign a visible name.
    ///
    /// The binding is updated in whichever enclosing scope holds it, and the
    /// name is also bound in this scope. Returns `false` when the name is not
    /// visible at all.
    pub fn modify(&self, name: &str, value: Value) -> bool {
        let mut found = false;
        let mut scope = self.outer.as_deref();
        while let Some(s) = scope {
            let mut bindings = s.bindings.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value.clone();
                found = true;
                break;
            }
            drop(bindings);
            scope = s.outer.as_deref();
        }

        let mut own = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        if found || own.contains_key(name) {
            own.insert(name.to_string(), value);
            true
        } else {
            false
        }
    }

    /// Look up a name through the chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.read().unwrap_or_else(PoisonError::into_inner).get(name) {
            return Some(value.clone());
        }
        self.outer.as_ref().and_then(|o| o.get(name))
    }

    /// Whether a name resolves anywhere in the chain.
    pub fn is_name_visible(&self, name: &str) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
            || self.outer.as_ref().is_some_and(|o| o.is_name_visible(name))
    }

    /// Every tracked name visible from this scope.
    pub fn visible_names(&self) -> NameSet {
        let mut names = self.outer.as_ref().map(|o| o.visible_names()).unwrap_or_default();
        names.extend(
            self.bindings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .filter(|k| names::is_tracked(k))
                .cloned(),
        );
        names
    }

    /// Names bound directly in this scope.
    pub fn own_bindings(&self) -> HashMap<String, Value> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Indices of the `resources` some policy on the chain refuses.
    pub fn denied_resources(&self, resources: &[Resource]) -> Vec<usize> {
        let chain: Vec<&ResourcePolicy> = std::iter::successors(Some(self), |s| s.outer().map(|o| o.as_ref()))
            .filter_map(|s| s.policy.as_ref())
            .collect();
        resources
            .iter()
            .enumerate()
            .filter(|(_, r)| chain.iter().any(|p| !p.allows(r)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Acquire resource locks for an effect; released when the guard drops.
    pub async fn lock(&self, resources: &[Resource]) -> ResourceGuard {
        self.context.resources().lock(resources).await
    }
}
