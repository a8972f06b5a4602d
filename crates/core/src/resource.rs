//! Effectful resources and the per-resource lock table.
//!
//! A node that performs I/O, reads a clock or otherwise touches the world
//! declares [`ResourceDef`]s. Declarations do two things: they disqualify the
//! enclosing sequence from parallel evaluation, and, once the node's arguments
//! are known, they resolve to [`Resource`] keys that are locked for the
//! duration of the effect.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A declared resource: a name plus the index of the argument that selects
/// the instance (`None` when the resource is global).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Resource name, e.g. `io.stdout`
    pub name: String,
    /// Argument index selecting the instance
    pub arg: Option<usize>,
}

impl ResourceDef {
    /// A resource with a single global instance.
    pub fn global(name: impl Into<String>) -> Self {
        Self { name: name.into(), arg: None }
    }

    /// A resource keyed by one of the call's arguments.
    pub fn keyed(name: impl Into<String>, arg: usize) -> Self {
        Self { name: name.into(), arg: Some(arg) }
    }

    /// Resolve against rendered argument values.
    pub fn resolve(&self, args: &[String]) -> Resource {
        let arg = match self.arg {
            None => String::new(),
            Some(i) => args.get(i).cloned().unwrap_or_else(|| "?".to_string()),
        };
        Resource { name: self.name.clone(), arg }
    }
}

impl std::fmt::Display for ResourceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.arg {
            Some(i) => write!(f, "{}({})", self.name, i),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A concrete resource instance, the key of a mutual-exclusion lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name
    pub name: String,
    /// Rendered argument selecting the instance (empty for global resources)
    pub arg: String,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arg)
    }
}

/// Which resources a scope lets its expressions use.
///
/// Attached to a scope, a policy applies to everything evaluated in that
/// scope and its children. Nested policies only narrow: a resource must be
/// allowed by every policy on the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePolicy {
    /// No effectful resource is allowed
    Pure,
    /// Only the listed resources are allowed
    Allow(HashSet<Resource>),
}

impl ResourcePolicy {
    /// A policy allowing exactly `resources`.
    pub fn allow(resources: impl IntoIterator<Item = Resource>) -> Self {
        Self::Allow(resources.into_iter().collect())
    }

    /// Whether `resource` may be used.
    pub fn allows(&self, resource: &Resource) -> bool {
        match self {
            Self::Pure => false,
            Self::Allow(allowed) => allowed.contains(resource),
        }
    }
}

/// Lock table keyed by resource identity.
///
/// Locks are created on first use and live as long as the registry, which is
/// owned by one top-level run. Acquisition is not re-entrant.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    locks: DashMap<Resource, Arc<Mutex<()>>>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every resource, waiting as needed.
    ///
    /// Keys are deduplicated and taken in sorted order so two nodes locking
    /// overlapping sets cannot deadlock. All locks are released when the
    /// returned guard drops.
    pub async fn lock(&self, resources: &[Resource]) -> ResourceGuard {
        let mut keys: Vec<Resource> = resources.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = self.entry(&key);
            tracing::trace!("locking resource {}", key);
            guards.push((key, lock.lock_owned().await));
        }
        ResourceGuard { guards }
    }

    /// Number of distinct resources seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no resource has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn entry(&self, key: &Resource) -> Arc<Mutex<()>> {
        // The shard lock is released before awaiting the resource lock.
        self.locks.entry(key.clone()).or_default().value().clone()
    }
}

/// Held resource locks; dropping it releases them all.
#[derive(Debug)]
pub struct ResourceGuard {
    guards: Vec<(Resource, OwnedMutexGuard<()>)>,
}

impl ResourceGuard {
    /// The resources held by this guard, in acquisition order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.guards.iter().map(|(r, _)| r)
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        for (key, _) in self.guards.iter().rev() {
            tracing::trace!("releasing resource {}", key);
        }
    }
}
